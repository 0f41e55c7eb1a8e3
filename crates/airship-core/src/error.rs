//! Error taxonomy for Airship operations
//!
//! Every failure class a caller may want to branch on gets its own
//! variant: a version conflict is retryable after re-fetching state, an
//! ambiguous resolution never is.

use thiserror::Error;

/// Result type for Airship operations
pub type AirshipResult<T> = Result<T, AirshipError>;

/// Errors produced by the Airship core, repository, and coordinator layers
#[derive(Debug, Error)]
pub enum AirshipError {
    /// Malformed artifact spec, glob, or filter expression
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// No repository backend knows the requested artifact
    #[error("unknown {kind} {spec}")]
    UnresolvableArtifact { kind: &'static str, spec: String },

    /// Multiple repository backends returned distinct answers
    #[error("ambiguous {kind} {spec} matched {candidates:?}")]
    AmbiguousResolution {
        kind: &'static str,
        spec: String,
        candidates: Vec<String>,
    },

    /// Optimistic concurrency check failed; `version` is the current value
    #[error("version conflict for {header} (current version {version})")]
    VersionConflict { header: &'static str, version: String },

    /// Not enough eligible agents to satisfy an install request
    #[error("insufficient capacity: requested {requested} agents, {available} available")]
    InsufficientCapacity { requested: usize, available: usize },

    /// A remote call did not complete within its deadline
    #[error("command timed out after {timeout_ms}ms: {operation}")]
    CommandTimeout { operation: String, timeout_ms: u64 },

    /// A remote agent could not be reached
    #[error("remote unreachable: {0}")]
    RemoteUnreachable(String),

    /// Operation not valid in the entity's current lifecycle state
    #[error("illegal state transition: {0}")]
    IllegalStateTransition(String),

    /// Configuration loading or validation failure
    #[error("config error: {0}")]
    Config(String),

    /// IO failure (state files, config bundles)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure on the wire or in state files
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AirshipError {
    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        AirshipError::InvalidSpec(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AirshipError::Config(msg.into())
    }

    /// True for failures a caller may retry after refreshing its view
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AirshipError::VersionConflict { .. }
                | AirshipError::CommandTimeout { .. }
                | AirshipError::RemoteUnreachable(_)
        )
    }
}

impl From<serde_json::Error> for AirshipError {
    fn from(err: serde_json::Error) -> Self {
        AirshipError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AirshipError::VersionConflict {
            header: "x-airship-slots-version",
            version: "abc".to_string(),
        }
        .is_retryable());

        assert!(!AirshipError::AmbiguousResolution {
            kind: "binary",
            spec: "food.fruit:apple:1.0".to_string(),
            candidates: vec![],
        }
        .is_retryable());

        assert!(!AirshipError::InvalidSpec("bad".to_string()).is_retryable());
    }
}
