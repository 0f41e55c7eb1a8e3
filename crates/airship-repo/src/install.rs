//! Assignment resolution and installation construction
//!
//! Turns a symbolic Assignment into an Installation: both coordinates
//! resolved, fetchable URIs located, and the resources the deployment
//! declares read out of the config bundle.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::warn;

use airship_core::{
    AgentStatus, AirshipError, AirshipResult, Assignment, Installation, UpgradeVersions,
};

use crate::repository::Repository;

/// Properties entry inside a config bundle declaring required resources
pub const RESOURCES_ENTRY_NAME: &str = "airship-resources.properties";

/// Byte access into config bundles; consumed, not implemented, by the
/// resolution core
#[async_trait]
pub trait ConfigEntryReader: Send + Sync {
    /// Contents of a named entry in the config bundle, or None when the
    /// bundle has no such entry
    async fn open_config_entry(
        &self,
        config: &str,
        entry_name: &str,
    ) -> AirshipResult<Option<Vec<u8>>>;
}

/// Entry reader treating the config bundle location as a directory
/// beneath the config's resolved HTTP URI
pub struct HttpConfigEntryReader {
    repository: std::sync::Arc<dyn Repository>,
    client: reqwest::Client,
}

impl HttpConfigEntryReader {
    pub fn new(repository: std::sync::Arc<dyn Repository>) -> HttpConfigEntryReader {
        HttpConfigEntryReader {
            repository,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_entry(&self, config_uri: &str, entry_name: &str) -> Option<Vec<u8>> {
        let uri = format!("{}/{}", config_uri.trim_end_matches('/'), entry_name);
        let response = self.client.get(&uri).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.bytes().await.ok().map(|b| b.to_vec())
    }
}

#[async_trait]
impl ConfigEntryReader for HttpConfigEntryReader {
    async fn open_config_entry(
        &self,
        config: &str,
        entry_name: &str,
    ) -> AirshipResult<Option<Vec<u8>>> {
        let Some(config_uri) = self.repository.config_to_http_uri(config).await? else {
            return Ok(None);
        };
        Ok(self.fetch_entry(&config_uri, entry_name).await)
    }
}

/// Resolve both halves of an assignment or fail
pub async fn resolve_assignment(
    repository: &dyn Repository,
    assignment: &Assignment,
) -> AirshipResult<Assignment> {
    let binary = repository
        .binary_resolve(&assignment.binary)
        .await?
        .ok_or_else(|| AirshipError::UnresolvableArtifact {
            kind: "binary",
            spec: assignment.binary.clone(),
        })?;
    let config = repository
        .config_resolve(&assignment.config)
        .await?
        .ok_or_else(|| AirshipError::UnresolvableArtifact {
            kind: "config",
            spec: assignment.config.clone(),
        })?;
    Assignment::new(binary, config)
}

/// Resolve an assignment into an installable unit
pub async fn to_installation(
    repository: &dyn Repository,
    entry_reader: Option<&dyn ConfigEntryReader>,
    assignment: &Assignment,
) -> AirshipResult<Installation> {
    let assignment = resolve_assignment(repository, assignment).await?;

    let binary_uri = repository
        .binary_to_http_uri(&assignment.binary)
        .await?
        .ok_or_else(|| AirshipError::UnresolvableArtifact {
            kind: "binary",
            spec: assignment.binary.clone(),
        })?;
    let config_uri = repository
        .config_to_http_uri(&assignment.config)
        .await?
        .ok_or_else(|| AirshipError::UnresolvableArtifact {
            kind: "config",
            spec: assignment.config.clone(),
        })?;

    let resources = match entry_reader {
        Some(reader) => {
            match reader
                .open_config_entry(&assignment.config, RESOURCES_ENTRY_NAME)
                .await
            {
                Ok(Some(bytes)) => parse_properties(&bytes),
                Ok(None) => BTreeMap::new(),
                Err(e) => {
                    warn!("failed to read resources for {}: {e}", assignment.config);
                    BTreeMap::new()
                }
            }
        }
        None => BTreeMap::new(),
    };

    let short_name = repository
        .config_short_name(&assignment.config)
        .await
        .unwrap_or_else(|| assignment.config.clone());

    Ok(Installation::new(
        short_name,
        assignment,
        binary_uri,
        config_uri,
        resources,
    ))
}

/// Resolve the assignment a slot upgrades to
///
/// Each side is upgraded when a target version was requested, and
/// otherwise verified to still resolve - upgrading one half of a vanished
/// deployment would strand the other.
pub async fn upgrade_assignment(
    repository: &dyn Repository,
    versions: &UpgradeVersions,
    assignment: &Assignment,
) -> AirshipResult<Assignment> {
    let binary = match &versions.binary_version {
        Some(version) => repository
            .binary_upgrade(&assignment.binary, version)
            .await?
            .ok_or_else(|| AirshipError::UnresolvableArtifact {
                kind: "binary",
                spec: format!("{} -> {version}", assignment.binary),
            })?,
        None => {
            if repository
                .binary_to_http_uri(&assignment.binary)
                .await?
                .is_none()
            {
                return Err(AirshipError::UnresolvableArtifact {
                    kind: "binary",
                    spec: assignment.binary.clone(),
                });
            }
            assignment.binary.clone()
        }
    };

    let config = match &versions.config_version {
        Some(version) => repository
            .config_upgrade(&assignment.config, version)
            .await?
            .ok_or_else(|| AirshipError::UnresolvableArtifact {
                kind: "config",
                spec: format!("{} -> {version}", assignment.config),
            })?,
        None => {
            if repository
                .config_to_http_uri(&assignment.config)
                .await?
                .is_none()
            {
                return Err(AirshipError::UnresolvableArtifact {
                    kind: "config",
                    spec: assignment.config.clone(),
                });
            }
            assignment.config.clone()
        }
    };

    Assignment::new(binary, config)
}

/// Parse a Java-style properties file into a resource map
///
/// Unparseable values are skipped with a warning rather than failing the
/// whole installation.
pub fn parse_properties(bytes: &[u8]) -> BTreeMap<String, i64> {
    let text = String::from_utf8_lossy(bytes);
    let mut properties = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once(['=', ':']) else {
            continue;
        };
        let key = key.trim();
        match value.trim().parse::<i64>() {
            Ok(value) => {
                properties.insert(key.to_string(), value);
            }
            Err(_) => {
                warn!("skipping non-numeric resource property {key}");
            }
        }
    }
    properties
}

/// Resources an agent still has free: declared totals minus the sum
/// committed by its current slots
pub fn available_resources(agent: &AgentStatus) -> BTreeMap<String, i64> {
    let mut available = agent.resources.clone();
    for slot in agent.slot_statuses() {
        for (resource, amount) in &slot.resources {
            *available.entry(resource.clone()).or_insert(0) -= amount;
        }
    }
    available
}

/// True when every required resource is available
pub fn resources_are_available(
    available: &BTreeMap<String, i64>,
    required: &BTreeMap<String, i64>,
) -> bool {
    required
        .iter()
        .all(|(resource, amount)| available.get(resource).copied().unwrap_or(0) >= *amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airship_core::{AgentLifecycleState, SlotLifecycleState, SlotStatus};
    use uuid::Uuid;

    #[test]
    fn test_parse_properties() {
        let text = b"# resources required by this deployment\ncpu=1\nmemory = 512\n\n! comment\nbogus\nweird=abc\n";
        let properties = parse_properties(text);
        assert_eq!(properties.get("cpu"), Some(&1));
        assert_eq!(properties.get("memory"), Some(&512));
        assert_eq!(properties.len(), 2);
    }

    fn slot_with_resources(cpu: i64) -> SlotStatus {
        SlotStatus::new(
            Uuid::new_v4(),
            None,
            None,
            None,
            "/east/a/apple1",
            SlotLifecycleState::Running,
            Some(Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap()),
            None,
            BTreeMap::from([("cpu".to_string(), cpu)]),
        )
        .unwrap()
    }

    #[test]
    fn test_available_resources() {
        let agent = AgentStatus::new(
            Some("agent-1".to_string()),
            AgentLifecycleState::Online,
            "i-1",
            None,
            None,
            None,
            None,
            vec![slot_with_resources(2), slot_with_resources(3)],
            BTreeMap::from([("cpu".to_string(), 8), ("memory".to_string(), 1024)]),
        )
        .unwrap();

        let available = available_resources(&agent);
        assert_eq!(available.get("cpu"), Some(&3));
        assert_eq!(available.get("memory"), Some(&1024));
    }

    #[test]
    fn test_resources_are_available() {
        let available = BTreeMap::from([("cpu".to_string(), 2)]);
        assert!(resources_are_available(
            &available,
            &BTreeMap::from([("cpu".to_string(), 2)])
        ));
        assert!(!resources_are_available(
            &available,
            &BTreeMap::from([("cpu".to_string(), 3)])
        ));
        // undeclared resources count as zero
        assert!(!resources_are_available(
            &available,
            &BTreeMap::from([("gpu".to_string(), 1)])
        ));
        // no requirements always fit
        assert!(resources_are_available(&available, &BTreeMap::new()));
    }
}
