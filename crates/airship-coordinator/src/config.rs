//! Coordinator configuration (YAML)

use serde::{Deserialize, Serialize};

use airship_core::{AirshipError, AirshipResult};

use crate::provision::Instance;

/// Top-level coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    /// Environment name, e.g. "production"
    pub environment: String,

    /// HTTP bind address for the coordinator API
    #[serde(default = "default_http_bind")]
    pub http_bind: String,

    /// Seconds between directory refreshes; also the staleness bound on
    /// cached agent status
    #[serde(default = "default_status_expiration_secs")]
    pub status_expiration_secs: u64,

    /// Per-remote-call timeout in seconds
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,

    /// Allow the same binary+config twice on one agent
    #[serde(default)]
    pub allow_duplicate_installations_on_an_agent: bool,

    /// Directory holding expected-state records; in-memory when unset
    #[serde(default)]
    pub state_directory: Option<String>,

    #[serde(default)]
    pub repositories: RepositoriesConfig,

    #[serde(default)]
    pub provisioner: ProvisionerConfig,
}

fn default_http_bind() -> String {
    "127.0.0.1:64000".to_string()
}

fn default_status_expiration_secs() -> u64 {
    30
}

fn default_remote_timeout_secs() -> u64 {
    15
}

/// Repository backends to compose
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoriesConfig {
    #[serde(default)]
    pub maven: Option<MavenRepositoryConfig>,

    #[serde(default)]
    pub http: Option<HttpRepositoryConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenRepositoryConfig {
    #[serde(default)]
    pub default_group_ids: Vec<String>,

    pub bases: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRepositoryConfig {
    pub bases: Vec<String>,

    #[serde(default)]
    pub config_short_name_pattern: Option<String>,

    #[serde(default)]
    pub config_version_pattern: Option<String>,

    #[serde(default)]
    pub binary_version_pattern: Option<String>,
}

/// Static infrastructure inventory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionerConfig {
    #[serde(default)]
    pub agents: Vec<Instance>,

    #[serde(default)]
    pub coordinators: Vec<Instance>,
}

impl CoordinatorConfig {
    pub fn from_yaml(yaml: &str) -> AirshipResult<CoordinatorConfig> {
        serde_yaml::from_str(yaml)
            .map_err(|e| AirshipError::config(format!("failed to parse coordinator config: {e}")))
    }

    pub fn from_file(path: &str) -> AirshipResult<CoordinatorConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AirshipError::config(format!("failed to read coordinator config {path}: {e}"))
        })?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> AirshipResult<()> {
        if self.environment.is_empty() {
            return Err(AirshipError::config("environment name is empty"));
        }
        let has_repository = self
            .repositories
            .maven
            .as_ref()
            .map_or(false, |m| !m.bases.is_empty())
            || self
                .repositories
                .http
                .as_ref()
                .map_or(false, |h| !h.bases.is_empty());
        if !has_repository {
            return Err(AirshipError::config(
                "at least one repository base must be configured",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
environment: production
httpBind: 0.0.0.0:64000
statusExpirationSecs: 15
remoteTimeoutSecs: 10
stateDirectory: /var/lib/airship/expected-state
repositories:
  maven:
    defaultGroupIds:
      - food.fruit
    bases:
      - https://repo.example.com/maven2
  http:
    bases:
      - https://artifacts.example.com
    configVersionPattern: '.*-([0-9.]+)\.config'
provisioner:
  agents:
    - instanceId: i-001
      instanceType: m1.large
      location: /east/a/i-001/agent
      internalUri: http://10.0.0.1:9999
  coordinators: []
"#;
        let config = CoordinatorConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.environment, "production");
        assert_eq!(config.http_bind, "0.0.0.0:64000");
        assert_eq!(config.status_expiration_secs, 15);
        assert_eq!(config.provisioner.agents.len(), 1);
        assert_eq!(
            config.repositories.maven.unwrap().default_group_ids,
            vec!["food.fruit"]
        );
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
environment: dev
repositories:
  maven:
    bases: [http://repo/]
"#;
        let config = CoordinatorConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.status_expiration_secs, 30);
        assert_eq!(config.remote_timeout_secs, 15);
        assert!(!config.allow_duplicate_installations_on_an_agent);
        assert!(config.state_directory.is_none());
    }

    #[test]
    fn test_rejects_missing_repositories() {
        let config = CoordinatorConfig::from_yaml("environment: dev\n").unwrap();
        assert!(config.validate().is_err());
    }
}
