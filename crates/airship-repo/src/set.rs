//! Composite repository resolution
//!
//! Fans each operation out over every backend and deduplicates the
//! answers. One distinct answer wins; two distinct answers fail hard.
//! Silent first-match selection across heterogeneous backends could
//! deploy the wrong artifact, so disagreement is never auto-resolved.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use airship_core::{AirshipError, AirshipResult};

use crate::repository::Repository;

/// Composite over N repository backends
pub struct RepositorySet {
    repositories: Vec<Arc<dyn Repository>>,
}

impl RepositorySet {
    pub fn new(repositories: Vec<Arc<dyn Repository>>) -> RepositorySet {
        RepositorySet { repositories }
    }

    /// Collect distinct non-null answers and apply the 0/1/many rule
    fn decide(
        kind: &'static str,
        spec: &str,
        answers: BTreeSet<String>,
    ) -> AirshipResult<Option<String>> {
        match answers.len() {
            0 => Ok(None),
            1 => Ok(answers.into_iter().next()),
            _ => Err(AirshipError::AmbiguousResolution {
                kind,
                spec: spec.to_string(),
                candidates: answers.into_iter().collect(),
            }),
        }
    }
}

#[async_trait]
impl Repository for RepositorySet {
    async fn config_short_name(&self, config: &str) -> Option<String> {
        let Some(no_at_sign) = config.strip_prefix('@') else {
            return None;
        };
        for repository in &self.repositories {
            if let Some(short_name) = repository.config_short_name(config).await {
                if short_name != config {
                    return Some(short_name);
                }
            }
        }
        // no backend claims it: synthesize a filesystem-safe label
        Some(
            no_at_sign
                .chars()
                .map(|c| match c {
                    ':' | '%' | '/' | ' ' | '!' | '$' => '_',
                    other => other,
                })
                .collect(),
        )
    }

    async fn config_relativize(&self, config: &str) -> Option<String> {
        let mut relative = BTreeSet::new();
        for repository in &self.repositories {
            if let Some(r) = repository.config_relativize(config).await {
                relative.insert(r);
            }
        }
        // more than one relative form is no form at all
        if relative.len() == 1 {
            relative.into_iter().next()
        } else {
            Some(config.to_string())
        }
    }

    async fn config_resolve(&self, config: &str) -> AirshipResult<Option<String>> {
        let mut answers = BTreeSet::new();
        for repository in &self.repositories {
            if let Some(resolved) = repository.config_resolve(config).await? {
                answers.insert(resolved);
            }
        }
        Self::decide("config", config, answers)
    }

    async fn config_upgrade(&self, config: &str, version: &str) -> AirshipResult<Option<String>> {
        let mut answers = BTreeSet::new();
        for repository in &self.repositories {
            if let Some(upgraded) = repository.config_upgrade(config, version).await? {
                answers.insert(upgraded);
            }
        }
        Self::decide("config upgrade", config, answers)
    }

    async fn config_equals_ignore_version(&self, config1: &str, config2: &str) -> bool {
        for repository in &self.repositories {
            if repository
                .config_equals_ignore_version(config1, config2)
                .await
            {
                return true;
            }
        }
        false
    }

    async fn config_to_http_uri(&self, config: &str) -> AirshipResult<Option<String>> {
        let mut answers = BTreeSet::new();
        for repository in &self.repositories {
            if let Some(uri) = repository.config_to_http_uri(config).await? {
                answers.insert(uri);
            }
        }
        Self::decide("config", config, answers)
    }

    async fn binary_relativize(&self, binary: &str) -> Option<String> {
        let mut relative = BTreeSet::new();
        for repository in &self.repositories {
            if let Some(r) = repository.binary_relativize(binary).await {
                relative.insert(r);
            }
        }
        if relative.len() == 1 {
            relative.into_iter().next()
        } else {
            Some(binary.to_string())
        }
    }

    async fn binary_resolve(&self, binary: &str) -> AirshipResult<Option<String>> {
        let mut answers = BTreeSet::new();
        for repository in &self.repositories {
            if let Some(resolved) = repository.binary_resolve(binary).await? {
                answers.insert(resolved);
            }
        }
        Self::decide("binary", binary, answers)
    }

    async fn binary_upgrade(&self, binary: &str, version: &str) -> AirshipResult<Option<String>> {
        let mut answers = BTreeSet::new();
        for repository in &self.repositories {
            if let Some(upgraded) = repository.binary_upgrade(binary, version).await? {
                answers.insert(upgraded);
            }
        }
        Self::decide("binary upgrade", binary, answers)
    }

    async fn binary_equals_ignore_version(&self, binary1: &str, binary2: &str) -> bool {
        for repository in &self.repositories {
            if repository
                .binary_equals_ignore_version(binary1, binary2)
                .await
            {
                return true;
            }
        }
        false
    }

    async fn binary_to_http_uri(&self, binary: &str) -> AirshipResult<Option<String>> {
        let mut answers = BTreeSet::new();
        for repository in &self.repositories {
            if let Some(uri) = repository.binary_to_http_uri(binary).await? {
                answers.insert(uri);
            }
        }
        Self::decide("binary", binary, answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Backend answering from a fixed table
    #[derive(Default)]
    struct TableRepository {
        binaries: HashMap<String, String>,
        configs: HashMap<String, String>,
    }

    impl TableRepository {
        fn with_binary(mut self, spec: &str, uri: &str) -> Self {
            self.binaries.insert(spec.to_string(), uri.to_string());
            self
        }

        fn with_config(mut self, spec: &str, uri: &str) -> Self {
            self.configs.insert(spec.to_string(), uri.to_string());
            self
        }
    }

    #[async_trait]
    impl Repository for TableRepository {
        async fn config_short_name(&self, _config: &str) -> Option<String> {
            None
        }

        async fn config_relativize(&self, _config: &str) -> Option<String> {
            None
        }

        async fn config_resolve(&self, config: &str) -> AirshipResult<Option<String>> {
            Ok(self.configs.contains_key(config).then(|| config.to_string()))
        }

        async fn config_upgrade(
            &self,
            _config: &str,
            _version: &str,
        ) -> AirshipResult<Option<String>> {
            Ok(None)
        }

        async fn config_equals_ignore_version(&self, config1: &str, config2: &str) -> bool {
            config1 == config2
        }

        async fn config_to_http_uri(&self, config: &str) -> AirshipResult<Option<String>> {
            Ok(self.configs.get(config).cloned())
        }

        async fn binary_relativize(&self, _binary: &str) -> Option<String> {
            None
        }

        async fn binary_resolve(&self, binary: &str) -> AirshipResult<Option<String>> {
            Ok(self
                .binaries
                .contains_key(binary)
                .then(|| binary.to_string()))
        }

        async fn binary_upgrade(
            &self,
            _binary: &str,
            _version: &str,
        ) -> AirshipResult<Option<String>> {
            Ok(None)
        }

        async fn binary_equals_ignore_version(&self, binary1: &str, binary2: &str) -> bool {
            binary1 == binary2
        }

        async fn binary_to_http_uri(&self, binary: &str) -> AirshipResult<Option<String>> {
            Ok(self.binaries.get(binary).cloned())
        }
    }

    fn set(backends: Vec<TableRepository>) -> RepositorySet {
        RepositorySet::new(
            backends
                .into_iter()
                .map(|b| Arc::new(b) as Arc<dyn Repository>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_zero_backends_resolve_to_none() {
        let set = set(vec![TableRepository::default()]);
        assert!(set
            .binary_to_http_uri("food.fruit:apple:1.0")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_single_answer_wins() {
        let set = set(vec![
            TableRepository::default()
                .with_binary("food.fruit:apple:1.0", "http://a/apple-1.0.tar.gz"),
            TableRepository::default(),
        ]);
        assert_eq!(
            set.binary_to_http_uri("food.fruit:apple:1.0").await.unwrap(),
            Some("http://a/apple-1.0.tar.gz".to_string())
        );
    }

    #[tokio::test]
    async fn test_agreeing_backends_resolve() {
        let set = set(vec![
            TableRepository::default()
                .with_binary("food.fruit:apple:1.0", "http://a/apple-1.0.tar.gz"),
            TableRepository::default()
                .with_binary("food.fruit:apple:1.0", "http://a/apple-1.0.tar.gz"),
        ]);
        assert_eq!(
            set.binary_to_http_uri("food.fruit:apple:1.0").await.unwrap(),
            Some("http://a/apple-1.0.tar.gz".to_string())
        );
    }

    #[tokio::test]
    async fn test_disagreeing_backends_are_ambiguous() {
        let set = set(vec![
            TableRepository::default()
                .with_binary("food.fruit:apple:1.0", "http://a/apple-1.0.tar.gz"),
            TableRepository::default()
                .with_binary("food.fruit:apple:1.0", "http://b/apple-1.0.tar.gz"),
        ]);
        let err = set
            .binary_to_http_uri("food.fruit:apple:1.0")
            .await
            .unwrap_err();
        match err {
            AirshipError::AmbiguousResolution { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_config_ambiguity() {
        let set = set(vec![
            TableRepository::default().with_config("@prod:apple:1.0", "http://a/apple.config"),
            TableRepository::default().with_config("@prod:apple:1.0", "http://b/apple.config"),
        ]);
        assert!(set.config_to_http_uri("@prod:apple:1.0").await.is_err());
        // resolve agrees on the spec itself, so it still succeeds
        assert!(set.config_resolve("@prod:apple:1.0").await.is_ok());
    }

    #[tokio::test]
    async fn test_short_name_fallback_sanitizes() {
        let set = set(vec![TableRepository::default()]);
        assert_eq!(
            set.config_short_name("@prod:apple:1.0").await,
            Some("prod_apple_1.0".to_string())
        );
        assert_eq!(set.config_short_name("no-at-sign").await, None);
    }
}
