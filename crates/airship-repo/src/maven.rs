//! Maven-layout repository backend
//!
//! Artifacts live in the standard Maven directory layout under one or
//! more base URIs. Specs without a group id are resolved by probing each
//! configured default group id; more than one default group id claiming
//! the same artifact is an ambiguity failure.

use async_trait::async_trait;
use tracing::debug;

use airship_core::{AirshipError, AirshipResult, MavenCoordinates};

use crate::repository::Repository;

/// Repository backend over one or more Maven-layout base URIs
pub struct MavenRepository {
    default_group_ids: Vec<String>,
    repository_bases: Vec<String>,
    client: reqwest::Client,
}

impl MavenRepository {
    pub fn new(
        default_group_ids: impl IntoIterator<Item = String>,
        repository_bases: impl IntoIterator<Item = String>,
    ) -> MavenRepository {
        let repository_bases = repository_bases
            .into_iter()
            .map(|base| {
                if base.ends_with('/') {
                    base
                } else {
                    format!("{base}/")
                }
            })
            .collect();
        MavenRepository {
            default_group_ids: default_group_ids.into_iter().collect(),
            repository_bases,
            client: reqwest::Client::new(),
        }
    }

    /// Standard Maven layout path for a coordinate
    pub fn artifact_path(coordinates: &MavenCoordinates) -> Option<String> {
        let group_id = coordinates.group_id.as_ref()?;
        let mut path = String::new();
        path.push_str(&group_id.replace('.', "/"));
        path.push('/');
        path.push_str(&coordinates.artifact_id);
        path.push('/');
        path.push_str(&coordinates.version);
        path.push('/');
        path.push_str(&coordinates.artifact_id);
        path.push('-');
        path.push_str(coordinates.file_version());
        if let Some(classifier) = &coordinates.classifier {
            path.push('-');
            path.push_str(classifier);
        }
        path.push('.');
        path.push_str(&coordinates.packaging);
        Some(path)
    }

    /// Probe each base URI for the coordinate, returning the first hit
    async fn locate(&self, coordinates: &MavenCoordinates) -> Option<String> {
        let path = Self::artifact_path(coordinates)?;
        for base in &self.repository_bases {
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
            // some servers reject HEAD; retry with GET before giving up
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

    /// Pin a coordinate to a concrete repository entry
    ///
    /// Already-resolved coordinates pass through. Otherwise each candidate
    /// group id (the explicit one, or every configured default) is probed;
    /// exactly one may match.
    pub async fn resolve(
        &self,
        coordinates: &MavenCoordinates,
    ) -> AirshipResult<Option<MavenCoordinates>> {
        if coordinates.is_resolved() {
            return Ok(Some(coordinates.clone()));
        }

        let group_ids: Vec<String> = match &coordinates.group_id {
            Some(group_id) => vec![group_id.clone()],
            None => self.default_group_ids.clone(),
        };

        let mut matched = Vec::new();
        for group_id in group_ids {
            let candidate = MavenCoordinates::new(
                Some(group_id),
                coordinates.artifact_id.clone(),
                coordinates.version.clone(),
                coordinates.packaging.clone(),
                coordinates.classifier.clone(),
                Some(coordinates.file_version().to_string()),
            );
            if self.locate(&candidate).await.is_some() {
                matched.push(candidate);
            }
        }

        match matched.len() {
            0 => Ok(None),
            1 => Ok(matched.pop()),
            _ => Err(AirshipError::AmbiguousResolution {
                kind: "spec",
                spec: coordinates.to_gav(),
                candidates: matched.iter().map(|c| c.to_gav()).collect(),
            }),
        }
    }

    fn relativize(&self, coordinates: &MavenCoordinates) -> Option<MavenCoordinates> {
        let group_id = coordinates.group_id.as_ref()?;
        if !self.default_group_ids.contains(group_id) {
            return None;
        }
        Some(MavenCoordinates::new(
            None,
            coordinates.artifact_id.clone(),
            coordinates.version.clone(),
            coordinates.packaging.clone(),
            coordinates.classifier.clone(),
            coordinates.file_version.clone(),
        ))
    }
}

#[async_trait]
impl Repository for MavenRepository {
    async fn config_short_name(&self, config: &str) -> Option<String> {
        MavenCoordinates::from_config_gav(config).map(|c| c.artifact_id)
    }

    async fn config_relativize(&self, config: &str) -> Option<String> {
        let coordinates = MavenCoordinates::from_config_gav(config)?;
        self.relativize(&coordinates)
            .map(|c| MavenCoordinates::to_config_gav(&c))
    }

    async fn config_resolve(&self, config: &str) -> AirshipResult<Option<String>> {
        let Some(coordinates) = MavenCoordinates::from_config_gav(config) else {
            return Ok(None);
        };
        Ok(self
            .resolve(&coordinates)
            .await?
            .map(|c| MavenCoordinates::to_config_gav(&c)))
    }

    async fn config_upgrade(&self, config: &str, version: &str) -> AirshipResult<Option<String>> {
        let Some(coordinates) = MavenCoordinates::from_config_gav(config) else {
            return Ok(None);
        };
        Ok(self
            .resolve(&coordinates.with_version(version))
            .await?
            .map(|c| MavenCoordinates::to_config_gav(&c)))
    }

    async fn config_equals_ignore_version(&self, config1: &str, config2: &str) -> bool {
        match (
            MavenCoordinates::from_config_gav(config1),
            MavenCoordinates::from_config_gav(config2),
        ) {
            (Some(a), Some(b)) => a.equals_ignore_version(&b),
            _ => false,
        }
    }

    async fn config_to_http_uri(&self, config: &str) -> AirshipResult<Option<String>> {
        let Some(coordinates) = MavenCoordinates::from_config_gav(config) else {
            return Ok(None);
        };
        let Some(resolved) = self.resolve(&coordinates).await? else {
            return Ok(None);
        };
        Ok(self.locate(&resolved).await)
    }

    async fn binary_relativize(&self, binary: &str) -> Option<String> {
        let coordinates = MavenCoordinates::from_binary_gav(binary)?;
        self.relativize(&coordinates)
            .map(|c| MavenCoordinates::to_binary_gav(&c))
    }

    async fn binary_resolve(&self, binary: &str) -> AirshipResult<Option<String>> {
        let Some(coordinates) = MavenCoordinates::from_binary_gav(binary) else {
            return Ok(None);
        };
        Ok(self
            .resolve(&coordinates)
            .await?
            .map(|c| MavenCoordinates::to_binary_gav(&c)))
    }

    async fn binary_upgrade(&self, binary: &str, version: &str) -> AirshipResult<Option<String>> {
        let Some(coordinates) = MavenCoordinates::from_binary_gav(binary) else {
            return Ok(None);
        };
        Ok(self
            .resolve(&coordinates.with_version(version))
            .await?
            .map(|c| MavenCoordinates::to_binary_gav(&c)))
    }

    async fn binary_equals_ignore_version(&self, binary1: &str, binary2: &str) -> bool {
        match (
            MavenCoordinates::from_binary_gav(binary1),
            MavenCoordinates::from_binary_gav(binary2),
        ) {
            (Some(a), Some(b)) => a.equals_ignore_version(&b),
            _ => false,
        }
    }

    async fn binary_to_http_uri(&self, binary: &str) -> AirshipResult<Option<String>> {
        let Some(coordinates) = MavenCoordinates::from_binary_gav(binary) else {
            return Ok(None);
        };
        let Some(resolved) = self.resolve(&coordinates).await? else {
            return Ok(None);
        };
        Ok(self.locate(&resolved).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_layout() {
        let coordinates = MavenCoordinates::from_binary_gav("food.fruit:apple:1.0").unwrap();
        let coordinates = MavenCoordinates::new(
            coordinates.group_id,
            coordinates.artifact_id,
            coordinates.version,
            coordinates.packaging,
            None,
            None,
        );
        assert_eq!(
            MavenRepository::artifact_path(&coordinates).unwrap(),
            "food/fruit/apple/1.0/apple-1.0.tar.gz"
        );
    }

    #[test]
    fn test_artifact_path_with_classifier() {
        let coordinates =
            MavenCoordinates::from_binary_gav("food.fruit:apple:zip:distribution:2.0").unwrap();
        assert_eq!(
            MavenRepository::artifact_path(&coordinates).unwrap(),
            "food/fruit/apple/2.0/apple-2.0-distribution.zip"
        );
    }

    #[test]
    fn test_artifact_path_requires_group() {
        let coordinates = MavenCoordinates::from_binary_gav("apple:1.0").unwrap();
        assert!(MavenRepository::artifact_path(&coordinates).is_none());
    }

    #[test]
    fn test_base_uris_normalized_with_trailing_slash() {
        let repo = MavenRepository::new(
            vec!["food.fruit".to_string()],
            vec!["http://repo.example.com/maven2".to_string()],
        );
        assert_eq!(repo.repository_bases[0], "http://repo.example.com/maven2/");
    }

    #[test]
    fn test_relativize_drops_default_group() {
        let repo = MavenRepository::new(
            vec!["food.fruit".to_string()],
            vec!["http://repo.example.com/".to_string()],
        );
        let coordinates = MavenCoordinates::from_binary_gav("food.fruit:apple:1.0").unwrap();
        let relative = repo.relativize(&coordinates).unwrap();
        assert_eq!(MavenCoordinates::to_binary_gav(&relative), "apple:1.0");

        let other = MavenCoordinates::from_binary_gav("veg.root:carrot:1.0").unwrap();
        assert!(repo.relativize(&other).is_none());
    }
}
