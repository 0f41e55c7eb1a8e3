//! Maven-style artifact coordinates
//!
//! Binaries and configs are addressed by GAV-style specs
//! (`group:artifact[:packaging[:classifier]]:version`). Config specs carry
//! a leading `@` and fixed `config` packaging; binary specs default to
//! `tar.gz`. A coordinate is "resolved" once repository resolution has
//! filled in both the group id and the concrete file version.

use serde::{Deserialize, Serialize};

/// Packaging applied to binary specs when the spec does not name one
pub const DEFAULT_BINARY_PACKAGING: &str = "tar.gz";

/// Packaging of config bundles (never overridden)
pub const DEFAULT_CONFIG_PACKAGING: &str = "config";

/// Parsed artifact coordinates
///
/// Immutable: parsing and repository resolution construct new values,
/// nothing mutates in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MavenCoordinates {
    pub group_id: Option<String>,
    pub artifact_id: String,
    pub version: String,
    pub packaging: String,
    pub classifier: Option<String>,
    /// Concrete artifact version as stored in the repository (e.g. a
    /// timestamped snapshot); set by resolution
    pub file_version: Option<String>,
}

impl MavenCoordinates {
    pub fn new(
        group_id: Option<String>,
        artifact_id: String,
        version: String,
        packaging: String,
        classifier: Option<String>,
        file_version: Option<String>,
    ) -> Self {
        MavenCoordinates {
            group_id,
            artifact_id,
            version,
            packaging,
            classifier,
            file_version,
        }
    }

    /// Parse a 4- or 5-segment coordinate with explicit packaging
    pub fn from_gav(coordinates: &str) -> Option<MavenCoordinates> {
        Self::parse(coordinates, None)
    }

    /// Parse a binary spec (2-5 segments, packaging defaults to `tar.gz`)
    pub fn from_binary_gav(spec: &str) -> Option<MavenCoordinates> {
        Self::parse(spec, Some(DEFAULT_BINARY_PACKAGING))
    }

    /// Parse a config spec: leading `@` required, packaging is `config`
    pub fn from_config_gav(spec: &str) -> Option<MavenCoordinates> {
        let stripped = spec.strip_prefix('@')?;
        Self::parse(stripped, Some(DEFAULT_CONFIG_PACKAGING))
    }

    fn parse(coordinates: &str, default_packaging: Option<&str>) -> Option<MavenCoordinates> {
        let parts: Vec<&str> = coordinates.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        match (parts.len(), default_packaging) {
            // group:artifact:packaging:classifier:version
            (5, _) => Some(MavenCoordinates::new(
                Some(parts[0].to_string()),
                parts[1].to_string(),
                parts[4].to_string(),
                parts[2].to_string(),
                Some(parts[3].to_string()),
                None,
            )),
            // group:artifact:packaging:version
            (4, _) => Some(MavenCoordinates::new(
                Some(parts[0].to_string()),
                parts[1].to_string(),
                parts[3].to_string(),
                parts[2].to_string(),
                None,
                None,
            )),
            // group:artifact:version
            (3, Some(packaging)) => Some(MavenCoordinates::new(
                Some(parts[0].to_string()),
                parts[1].to_string(),
                parts[2].to_string(),
                packaging.to_string(),
                None,
                None,
            )),
            // artifact:version - group left for repository resolution
            (2, Some(packaging)) => Some(MavenCoordinates::new(
                None,
                parts[0].to_string(),
                parts[1].to_string(),
                packaging.to_string(),
                None,
                None,
            )),
            _ => None,
        }
    }

    /// Serialize the config form of `spec`, re-applying the `@` prefix
    pub fn to_config_gav(spec: &MavenCoordinates) -> String {
        format!("@{}", spec.to_gav_with(Some(DEFAULT_CONFIG_PACKAGING), false))
    }

    /// Serialize the binary form of `spec`
    pub fn to_binary_gav(spec: &MavenCoordinates) -> String {
        spec.to_gav_with(Some(DEFAULT_BINARY_PACKAGING), false)
    }

    /// Symbolic serialization with explicit packaging
    pub fn to_gav(&self) -> String {
        self.to_gav_with(None, false)
    }

    /// Serialize, omitting packaging/classifier when they match the
    /// type's default
    ///
    /// With `show_full_version` the symbolic version is rendered followed
    /// by the resolved file version in parentheses (diagnostic form);
    /// otherwise the file version, when known, replaces the symbolic one.
    pub fn to_gav_with(&self, default_packaging: Option<&str>, show_full_version: bool) -> String {
        let mut out = String::new();
        if let Some(group_id) = &self.group_id {
            out.push_str(group_id);
            out.push(':');
        }
        out.push_str(&self.artifact_id);
        out.push(':');
        if Some(self.packaging.as_str()) != default_packaging || self.classifier.is_some() {
            out.push_str(&self.packaging);
            out.push(':');
        }
        if let Some(classifier) = &self.classifier {
            out.push_str(classifier);
            out.push(':');
        }

        if show_full_version {
            out.push_str(&self.version);
            if let Some(file_version) = &self.file_version {
                out.push('(');
                out.push_str(file_version);
                out.push(')');
            }
        } else {
            out.push_str(self.file_version.as_deref().unwrap_or(&self.version));
        }

        out
    }

    /// Concrete repository file version, falling back to the symbolic one
    pub fn file_version(&self) -> &str {
        self.file_version.as_deref().unwrap_or(&self.version)
    }

    /// A coordinate is resolved once it is pinned to a concrete
    /// repository entry
    pub fn is_resolved(&self) -> bool {
        self.group_id.is_some() && self.file_version.is_some()
    }

    /// Same logical artifact, possibly different version
    pub fn equals_ignore_version(&self, other: &MavenCoordinates) -> bool {
        self.artifact_id == other.artifact_id
            && self.packaging == other.packaging
            && self.classifier == other.classifier
            && self.group_id == other.group_id
    }

    /// Copy with a new symbolic version and the resolution cleared
    pub fn with_version(&self, version: &str) -> MavenCoordinates {
        MavenCoordinates::new(
            self.group_id.clone(),
            self.artifact_id.clone(),
            version.to_string(),
            self.packaging.clone(),
            self.classifier.clone(),
            None,
        )
    }
}

impl std::fmt::Display for MavenCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_gav_with(None, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binary_two_segments() {
        let coords = MavenCoordinates::from_binary_gav("apple:1.0").unwrap();
        assert_eq!(coords.group_id, None);
        assert_eq!(coords.artifact_id, "apple");
        assert_eq!(coords.version, "1.0");
        assert_eq!(coords.packaging, DEFAULT_BINARY_PACKAGING);
        assert!(!coords.is_resolved());
    }

    #[test]
    fn test_parse_binary_three_segments() {
        let coords = MavenCoordinates::from_binary_gav("food.fruit:apple:1.0").unwrap();
        assert_eq!(coords.group_id.as_deref(), Some("food.fruit"));
        assert_eq!(coords.artifact_id, "apple");
        assert_eq!(coords.version, "1.0");
        assert_eq!(coords.packaging, DEFAULT_BINARY_PACKAGING);
    }

    #[test]
    fn test_parse_five_segments() {
        let coords =
            MavenCoordinates::from_binary_gav("food.fruit:apple:zip:distribution:1.0").unwrap();
        assert_eq!(coords.packaging, "zip");
        assert_eq!(coords.classifier.as_deref(), Some("distribution"));
        assert_eq!(coords.version, "1.0");
    }

    #[test]
    fn test_parse_config_requires_at_prefix() {
        assert!(MavenCoordinates::from_config_gav("prod:apple:1.0").is_none());
        let coords = MavenCoordinates::from_config_gav("@prod:apple:1.0").unwrap();
        assert_eq!(coords.packaging, DEFAULT_CONFIG_PACKAGING);
        assert_eq!(coords.group_id.as_deref(), Some("prod"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(MavenCoordinates::from_binary_gav("apple").is_none());
        assert!(MavenCoordinates::from_binary_gav("a:b:c:d:e:f").is_none());
        assert!(MavenCoordinates::from_binary_gav("a::1.0").is_none());
        assert!(MavenCoordinates::from_gav("apple:1.0").is_none());
    }

    #[test]
    fn test_round_trip_binary() {
        for spec in ["apple:1.0", "food.fruit:apple:1.0", "food.fruit:apple:zip:1.0"] {
            let coords = MavenCoordinates::from_binary_gav(spec).unwrap();
            assert_eq!(MavenCoordinates::to_binary_gav(&coords), spec);
        }
    }

    #[test]
    fn test_round_trip_config() {
        for spec in ["@apple:1.0", "@prod:apple:1.0"] {
            let coords = MavenCoordinates::from_config_gav(spec).unwrap();
            assert_eq!(MavenCoordinates::to_config_gav(&coords), spec);
        }
    }

    #[test]
    fn test_resolved_serialization_prefers_file_version() {
        let mut coords = MavenCoordinates::from_binary_gav("food.fruit:apple:2.0-SNAPSHOT").unwrap();
        coords.file_version = Some("2.0-20260101.120000-1".to_string());
        assert_eq!(
            MavenCoordinates::to_binary_gav(&coords),
            "food.fruit:apple:2.0-20260101.120000-1"
        );
        assert_eq!(
            coords.to_gav_with(Some(DEFAULT_BINARY_PACKAGING), true),
            "food.fruit:apple:2.0-SNAPSHOT(2.0-20260101.120000-1)"
        );
    }

    #[test]
    fn test_equals_ignore_version() {
        let a = MavenCoordinates::from_binary_gav("food.fruit:apple:1.0").unwrap();
        let b = MavenCoordinates::from_binary_gav("food.fruit:apple:2.0").unwrap();
        let c = MavenCoordinates::from_binary_gav("food.fruit:banana:1.0").unwrap();
        assert!(a.equals_ignore_version(&b));
        assert!(!a.equals_ignore_version(&c));
    }

    #[test]
    fn test_with_version_clears_resolution() {
        let mut coords = MavenCoordinates::from_binary_gav("food.fruit:apple:1.0").unwrap();
        coords.file_version = Some("1.0".to_string());
        let upgraded = coords.with_version("2.0");
        assert_eq!(upgraded.version, "2.0");
        assert!(upgraded.file_version.is_none());
        assert!(!upgraded.is_resolved());
    }
}
