//! Flat HTTP directory repository backend
//!
//! Specs are treated as paths relative to each base URI. Optional regex
//! patterns with capture groups recover the short name and the version
//! segment of a spec, which is what makes upgrades and ignore-version
//! comparisons possible against an unstructured directory.

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use airship_core::{AirshipError, AirshipResult};

use crate::repository::Repository;

/// Repository backend over flat HTTP directories
#[derive(Debug)]
pub struct HttpRepository {
    base_uris: Vec<String>,
    config_short_name_pattern: Option<Regex>,
    config_version_pattern: Option<Regex>,
    binary_version_pattern: Option<Regex>,
    client: reqwest::Client,
}

impl HttpRepository {
    pub fn new(
        base_uris: impl IntoIterator<Item = String>,
        config_short_name_pattern: Option<&str>,
        config_version_pattern: Option<&str>,
        binary_version_pattern: Option<&str>,
    ) -> AirshipResult<HttpRepository> {
        let base_uris = base_uris
            .into_iter()
            .map(|base| {
                if base.ends_with('/') {
                    base
                } else {
                    format!("{base}/")
                }
            })
            .collect();
        Ok(HttpRepository {
            base_uris,
            config_short_name_pattern: compile_pattern(config_short_name_pattern, 1)?,
            config_version_pattern: compile_pattern(config_version_pattern, 1)?,
            binary_version_pattern: compile_pattern(binary_version_pattern, 1)?,
            client: reqwest::Client::new(),
        })
    }

    async fn locate(&self, path: &str) -> Option<String> {
        for base in &self.base_uris {
            let uri = format!("{base}{path}");
            if self.artifact_exists(&uri).await {
                return Some(uri);
            }
            debug!("no artifact at {uri}");
        }
        None
    }

    async fn artifact_exists(&self, uri: &str) -> bool {
        match self.client.head(uri).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) if response.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED => self
                .client
                .get(uri)
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Substitute the version capture of `spec` with `version`
    fn replace_version(spec: &str, version: &str, pattern: Option<&Regex>) -> Option<String> {
        let captures = pattern?.captures(spec)?;
        let group = captures.get(1)?;
        let mut replaced = String::with_capacity(spec.len());
        replaced.push_str(&spec[..group.start()]);
        replaced.push_str(version);
        replaced.push_str(&spec[group.end()..]);
        Some(replaced)
    }

    /// Blank the version capture, for ignore-version comparison
    fn blank_version(spec: &str, pattern: Option<&Regex>) -> Option<String> {
        Self::replace_version(spec, "", pattern)
    }
}

fn compile_pattern(pattern: Option<&str>, capture_groups: usize) -> AirshipResult<Option<Regex>> {
    let Some(pattern) = pattern else {
        return Ok(None);
    };
    let regex = Regex::new(pattern)
        .map_err(|e| AirshipError::invalid_spec(format!("invalid repository pattern: {e}")))?;
    if regex.captures_len() <= capture_groups {
        return Err(AirshipError::invalid_spec(format!(
            "repository pattern must have at least {capture_groups} capturing group(s): {pattern}"
        )));
    }
    Ok(Some(regex))
}

#[async_trait]
impl Repository for HttpRepository {
    async fn config_short_name(&self, config: &str) -> Option<String> {
        let pattern = self.config_short_name_pattern.as_ref()?;
        pattern
            .captures(config)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    async fn config_relativize(&self, _config: &str) -> Option<String> {
        // flat directories have no shorter form
        None
    }

    async fn config_resolve(&self, config: &str) -> AirshipResult<Option<String>> {
        let Some(path) = config.strip_prefix('@') else {
            return Ok(None);
        };
        Ok(self.locate(path).await.map(|_| config.to_string()))
    }

    async fn config_upgrade(&self, config: &str, version: &str) -> AirshipResult<Option<String>> {
        let Some(path) = config.strip_prefix('@') else {
            return Ok(None);
        };
        let Some(upgraded) =
            Self::replace_version(path, version, self.config_version_pattern.as_ref())
        else {
            return Ok(None);
        };
        Ok(self.locate(&upgraded).await.map(|_| format!("@{upgraded}")))
    }

    async fn config_equals_ignore_version(&self, config1: &str, config2: &str) -> bool {
        if !config1.starts_with('@') || !config2.starts_with('@') {
            return false;
        }
        let pattern = self.config_version_pattern.as_ref();
        match (
            Self::blank_version(config1, pattern),
            Self::blank_version(config2, pattern),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    async fn config_to_http_uri(&self, config: &str) -> AirshipResult<Option<String>> {
        let Some(path) = config.strip_prefix('@') else {
            return Ok(None);
        };
        Ok(self.locate(path).await)
    }

    async fn binary_relativize(&self, _binary: &str) -> Option<String> {
        None
    }

    async fn binary_resolve(&self, binary: &str) -> AirshipResult<Option<String>> {
        Ok(self.locate(binary).await.map(|_| binary.to_string()))
    }

    async fn binary_upgrade(&self, binary: &str, version: &str) -> AirshipResult<Option<String>> {
        let Some(upgraded) =
            Self::replace_version(binary, version, self.binary_version_pattern.as_ref())
        else {
            return Ok(None);
        };
        Ok(self.locate(&upgraded).await.map(|_| upgraded))
    }

    async fn binary_equals_ignore_version(&self, binary1: &str, binary2: &str) -> bool {
        let pattern = self.binary_version_pattern.as_ref();
        match (
            Self::blank_version(binary1, pattern),
            Self::blank_version(binary2, pattern),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    async fn binary_to_http_uri(&self, binary: &str) -> AirshipResult<Option<String>> {
        Ok(self.locate(binary).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> HttpRepository {
        HttpRepository::new(
            vec!["http://repo.example.com/artifacts".to_string()],
            Some(r"^.*/([^/]+?)-[0-9][0-9.]*\.config$"),
            Some(r"^.*-([0-9][0-9.]*)\.config$"),
            Some(r"^.*-([0-9][0-9.]*)\.tar\.gz$"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_short_name_capture() {
        let repo = repo();
        assert_eq!(
            repo.config_short_name("@web/apple-1.0.config").await,
            Some("apple".to_string())
        );
        assert_eq!(repo.config_short_name("@no-match").await, None);
    }

    #[test]
    fn test_replace_version() {
        let pattern = Regex::new(r"^.*-([0-9][0-9.]*)\.tar\.gz$").unwrap();
        assert_eq!(
            HttpRepository::replace_version("web/apple-1.0.tar.gz", "2.0", Some(&pattern)),
            Some("web/apple-2.0.tar.gz".to_string())
        );
        assert_eq!(
            HttpRepository::replace_version("web/apple.zip", "2.0", Some(&pattern)),
            None
        );
    }

    #[tokio::test]
    async fn test_equals_ignore_version() {
        let repo = repo();
        assert!(
            repo.binary_equals_ignore_version("web/apple-1.0.tar.gz", "web/apple-2.0.tar.gz")
                .await
        );
        assert!(
            !repo
                .binary_equals_ignore_version("web/apple-1.0.tar.gz", "web/banana-1.0.tar.gz")
                .await
        );
    }

    #[test]
    fn test_pattern_requires_capture_group() {
        let err = HttpRepository::new(
            vec!["http://repo.example.com/".to_string()],
            Some("no-capture-group"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AirshipError::InvalidSpec(_)));
    }
}
