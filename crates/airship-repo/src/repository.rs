//! Repository abstraction
//!
//! A repository resolves symbolic artifact specs to concrete fetchable
//! locations. `Ok(None)` means "this backend does not know the spec";
//! errors are reserved for infrastructure faults and ambiguity.

use async_trait::async_trait;

use airship_core::AirshipResult;

/// A single artifact repository backend
#[async_trait]
pub trait Repository: Send + Sync {
    /// Human label for a config spec, used to name installations
    async fn config_short_name(&self, config: &str) -> Option<String>;

    /// Shortest display form of a config spec this backend can still
    /// resolve (e.g. with a default group id dropped)
    async fn config_relativize(&self, config: &str) -> Option<String>;

    /// Resolve a symbolic config spec to a concrete one
    async fn config_resolve(&self, config: &str) -> AirshipResult<Option<String>>;

    /// Resolve the spec that `config` upgrades to at `version`
    async fn config_upgrade(&self, config: &str, version: &str) -> AirshipResult<Option<String>>;

    /// True when both specs name the same logical config
    async fn config_equals_ignore_version(&self, config1: &str, config2: &str) -> bool;

    /// Concrete downloadable location for a config spec
    async fn config_to_http_uri(&self, config: &str) -> AirshipResult<Option<String>>;

    /// Shortest display form of a binary spec
    async fn binary_relativize(&self, binary: &str) -> Option<String>;

    /// Resolve a symbolic binary spec to a concrete one
    async fn binary_resolve(&self, binary: &str) -> AirshipResult<Option<String>>;

    /// Resolve the spec that `binary` upgrades to at `version`
    async fn binary_upgrade(&self, binary: &str, version: &str) -> AirshipResult<Option<String>>;

    /// True when both specs name the same logical binary
    async fn binary_equals_ignore_version(&self, binary1: &str, binary2: &str) -> bool;

    /// Concrete downloadable location for a binary spec
    async fn binary_to_http_uri(&self, binary: &str) -> AirshipResult<Option<String>>;
}
