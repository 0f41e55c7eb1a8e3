//! Assignment and Installation values
//!
//! An Assignment names *what* should run in a slot (a binary spec and a
//! config spec). An Installation is an Assignment resolved against a
//! repository into concrete fetchable locations plus the resources the
//! deployment declares.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AirshipError, AirshipResult};

/// The (binary, config) coordinate pair for a slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Assignment {
    /// Binary spec, e.g. `food.fruit:apple:1.0`
    pub binary: String,
    /// Config spec, always `@`-prefixed, e.g. `@prod:apple:1.0`
    pub config: String,
}

impl Assignment {
    pub fn new(binary: impl Into<String>, config: impl Into<String>) -> AirshipResult<Assignment> {
        let binary = binary.into();
        let config = config.into();
        if binary.is_empty() {
            return Err(AirshipError::invalid_spec("binary spec is empty"));
        }
        if config.is_empty() {
            return Err(AirshipError::invalid_spec("config spec is empty"));
        }
        if !config.starts_with('@') {
            return Err(AirshipError::invalid_spec(format!(
                "config spec must start with '@': {config}"
            )));
        }
        Ok(Assignment { binary, config })
    }
}

impl std::fmt::Display for Assignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.binary, self.config)
    }
}

/// An assignment resolved to concrete artifact locations
///
/// Equality is by assignment alone: two installations of the same
/// assignment are the same logical deployment even if fetched through
/// different mirrors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    /// Human label derived from the config spec
    pub short_name: String,
    pub assignment: Assignment,
    /// Fetchable binary location
    pub binary_file: String,
    /// Fetchable config bundle location
    pub config_file: String,
    /// Resources the deployment will commit on its agent
    pub resources: BTreeMap<String, i64>,
}

impl Installation {
    pub fn new(
        short_name: impl Into<String>,
        assignment: Assignment,
        binary_file: impl Into<String>,
        config_file: impl Into<String>,
        resources: BTreeMap<String, i64>,
    ) -> Installation {
        Installation {
            short_name: short_name.into(),
            assignment,
            binary_file: binary_file.into(),
            config_file: config_file.into(),
            resources,
        }
    }
}

impl PartialEq for Installation {
    fn eq(&self, other: &Self) -> bool {
        self.assignment == other.assignment
    }
}

impl Eq for Installation {}

impl std::hash::Hash for Installation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.assignment.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_validation() {
        assert!(Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").is_ok());
        assert!(Assignment::new("", "@prod:apple:1.0").is_err());
        assert!(Assignment::new("food.fruit:apple:1.0", "").is_err());
        assert!(Assignment::new("food.fruit:apple:1.0", "prod:apple:1.0").is_err());
    }

    #[test]
    fn test_installation_equality_by_assignment() {
        let assignment = Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap();
        let a = Installation::new(
            "apple",
            assignment.clone(),
            "http://repo-a/apple-1.0.tar.gz",
            "http://repo-a/apple-1.0.config",
            BTreeMap::new(),
        );
        let b = Installation::new(
            "apple",
            assignment,
            "http://mirror-b/apple-1.0.tar.gz",
            "http://mirror-b/apple-1.0.config",
            BTreeMap::from([("cpu".to_string(), 1)]),
        );
        assert_eq!(a, b);
    }
}
