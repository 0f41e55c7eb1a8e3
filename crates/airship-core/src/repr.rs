//! Wire representations
//!
//! JSON shapes exchanged between the coordinator, agents, and the CLI.
//! They mirror the status model almost field-for-field and add derived
//! convenience fields: short ids truncated at the population's shortest
//! unique prefix, short locations with the common prefix trimmed, and
//! internal IPs resolved through DNS.

use std::collections::BTreeMap;
use std::net::ToSocketAddrs;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::AgentStatus;
use crate::assignment::{Assignment, Installation};
use crate::coordinator::CoordinatorStatus;
use crate::slot::SlotStatus;
use crate::strings::{
    common_prefix_segments, safe_truncate, shortest_unique_prefix, trim_leading_segments,
};

/// Floor for truncated UUID prefixes; anything shorter reads badly
pub const MIN_PREFIX_SIZE: usize = 4;

/// Number of distinguishing location segments that always survive trimming
pub const MIN_LOCATION_SEGMENTS: usize = 2;

const UUID_STRING_LENGTH: usize = 36;

/// Wire form of an Assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRepresentation {
    pub binary: String,
    pub config: String,
}

impl AssignmentRepresentation {
    pub fn from_assignment(assignment: &Assignment) -> Self {
        AssignmentRepresentation {
            binary: assignment.binary.clone(),
            config: assignment.config.clone(),
        }
    }

    pub fn to_assignment(&self) -> crate::error::AirshipResult<Assignment> {
        Assignment::new(self.binary.clone(), self.config.clone())
    }
}

/// Wire form of an Installation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationRepresentation {
    pub short_name: String,
    pub assignment: AssignmentRepresentation,
    pub binary_file: String,
    pub config_file: String,
    #[serde(default)]
    pub resources: BTreeMap<String, i64>,
}

impl InstallationRepresentation {
    pub fn from_installation(installation: &Installation) -> Self {
        InstallationRepresentation {
            short_name: installation.short_name.clone(),
            assignment: AssignmentRepresentation::from_assignment(&installation.assignment),
            binary_file: installation.binary_file.clone(),
            config_file: installation.config_file.clone(),
            resources: installation.resources.clone(),
        }
    }

    pub fn to_installation(&self) -> crate::error::AirshipResult<Installation> {
        Ok(Installation::new(
            self.short_name.clone(),
            self.assignment.to_assignment()?,
            self.binary_file.clone(),
            self.config_file.clone(),
            self.resources.clone(),
        ))
    }
}

/// Target versions for a bulk upgrade; either side may be absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeVersions {
    pub binary_version: Option<String>,
    pub config_version: Option<String>,
}

/// Wire form of a SlotStatus with derived display fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatusRepresentation {
    pub id: Uuid,
    pub short_id: String,
    #[serde(rename = "self")]
    pub self_uri: Option<String>,
    pub external_uri: Option<String>,
    pub instance_id: Option<String>,
    pub location: String,
    pub short_location: String,
    pub binary: Option<String>,
    pub config: Option<String>,
    pub status: String,
    pub version: String,
    pub status_message: Option<String>,
    pub install_path: Option<String>,
    #[serde(default)]
    pub resources: BTreeMap<String, i64>,
    pub expected_binary: Option<String>,
    pub expected_config: Option<String>,
    pub expected_status: Option<String>,
}

/// Stamps representations with population-wide prefix sizes computed once
#[derive(Debug, Clone, Copy)]
pub struct SlotRepresentationFactory {
    short_id_prefix_size: usize,
    common_location_parts: usize,
}

impl Default for SlotRepresentationFactory {
    fn default() -> Self {
        // full ids, untrimmed locations
        SlotRepresentationFactory {
            short_id_prefix_size: UUID_STRING_LENGTH,
            common_location_parts: 0,
        }
    }
}

impl SlotRepresentationFactory {
    pub fn from_population<'a>(slots: impl IntoIterator<Item = &'a SlotStatus> + Clone) -> Self {
        let ids: Vec<String> = slots.clone().into_iter().map(|s| s.id.to_string()).collect();
        let short_id_prefix_size =
            shortest_unique_prefix(ids.iter().map(|s| s.as_str()), MIN_PREFIX_SIZE)
                .unwrap_or(UUID_STRING_LENGTH);
        let common_location_parts = common_prefix_segments(
            '/',
            slots.into_iter().map(|s| s.location.as_str()),
            MIN_LOCATION_SEGMENTS,
        )
        .unwrap_or(0);
        SlotRepresentationFactory {
            short_id_prefix_size,
            common_location_parts,
        }
    }

    pub fn create(&self, status: &SlotStatus) -> SlotStatusRepresentation {
        SlotStatusRepresentation {
            id: status.id,
            short_id: safe_truncate(&status.id.to_string(), self.short_id_prefix_size),
            self_uri: status.self_uri.clone(),
            external_uri: status.external_uri.clone(),
            instance_id: status.instance_id.clone(),
            location: status.location.clone(),
            short_location: trim_leading_segments(
                &status.location,
                '/',
                self.common_location_parts,
            ),
            binary: status.assignment.as_ref().map(|a| a.binary.clone()),
            config: status.assignment.as_ref().map(|a| a.config.clone()),
            status: status.state.to_string(),
            version: status.version.clone(),
            status_message: status.status_message.clone(),
            install_path: status.install_path.clone(),
            resources: status.resources.clone(),
            expected_binary: status
                .expected_assignment
                .as_ref()
                .map(|a| a.binary.clone()),
            expected_config: status
                .expected_assignment
                .as_ref()
                .map(|a| a.config.clone()),
            expected_status: status.expected_state.map(|s| s.to_string()),
        }
    }
}

impl SlotStatusRepresentation {
    pub fn from_slot_status(status: &SlotStatus) -> Self {
        SlotRepresentationFactory::default().create(status)
    }
}

/// Wire form of an AgentStatus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusRepresentation {
    pub agent_id: Option<String>,
    pub short_agent_id: Option<String>,
    pub instance_id: String,
    pub state: String,
    pub internal_uri: Option<String>,
    pub internal_host: Option<String>,
    pub internal_ip: Option<String>,
    pub external_uri: Option<String>,
    pub external_host: Option<String>,
    pub location: Option<String>,
    pub short_location: Option<String>,
    pub instance_type: Option<String>,
    #[serde(default)]
    pub slots: Vec<SlotStatusRepresentation>,
    #[serde(default)]
    pub resources: BTreeMap<String, i64>,
    pub version: String,
}

/// Prefix sizes for a population of agents
#[derive(Debug, Clone, Copy)]
pub struct AgentRepresentationFactory {
    short_id_prefix_size: usize,
    common_location_parts: usize,
    slot_factory: SlotRepresentationFactory,
}

impl Default for AgentRepresentationFactory {
    fn default() -> Self {
        AgentRepresentationFactory {
            short_id_prefix_size: UUID_STRING_LENGTH,
            common_location_parts: 0,
            slot_factory: SlotRepresentationFactory::default(),
        }
    }
}

impl AgentRepresentationFactory {
    pub fn from_population<'a>(agents: impl IntoIterator<Item = &'a AgentStatus> + Clone) -> Self {
        let ids: Vec<String> = agents
            .clone()
            .into_iter()
            .filter_map(|a| a.agent_id.clone())
            .collect();
        let short_id_prefix_size =
            shortest_unique_prefix(ids.iter().map(|s| s.as_str()), MIN_PREFIX_SIZE)
                .unwrap_or(UUID_STRING_LENGTH);
        let locations: Vec<&str> = agents
            .clone()
            .into_iter()
            .filter_map(|a| a.location.as_deref())
            .collect();
        let common_location_parts =
            common_prefix_segments('/', locations.iter().copied(), MIN_LOCATION_SEGMENTS)
                .unwrap_or(0);
        let slots: Vec<SlotStatus> = agents
            .into_iter()
            .flat_map(|a| a.slot_statuses().cloned())
            .collect();
        AgentRepresentationFactory {
            short_id_prefix_size,
            common_location_parts,
            slot_factory: SlotRepresentationFactory::from_population(slots.iter()),
        }
    }

    pub fn create(&self, status: &AgentStatus) -> AgentStatusRepresentation {
        AgentStatusRepresentation {
            agent_id: status.agent_id.clone(),
            short_agent_id: status
                .agent_id
                .as_ref()
                .map(|id| safe_truncate(id, self.short_id_prefix_size)),
            instance_id: status.instance_id.clone(),
            state: status.state.to_string(),
            internal_uri: status.internal_uri.clone(),
            internal_host: status.internal_uri.as_deref().and_then(uri_host),
            internal_ip: status
                .internal_uri
                .as_deref()
                .and_then(uri_host)
                .map(|host| resolve_host(&host)),
            external_uri: status.external_uri.clone(),
            external_host: status.external_uri.as_deref().and_then(uri_host),
            location: status.location.clone(),
            short_location: status
                .location
                .as_deref()
                .map(|l| trim_leading_segments(l, '/', self.common_location_parts)),
            instance_type: status.instance_type.clone(),
            slots: status
                .slot_statuses()
                .map(|slot| self.slot_factory.create(slot))
                .collect(),
            resources: status.resources.clone(),
            version: status.version.clone(),
        }
    }
}

impl AgentStatusRepresentation {
    pub fn from_agent_status(status: &AgentStatus) -> Self {
        AgentRepresentationFactory::default().create(status)
    }
}

/// Wire form of a CoordinatorStatus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorStatusRepresentation {
    pub coordinator_id: Option<String>,
    pub short_coordinator_id: Option<String>,
    pub instance_id: String,
    pub state: String,
    pub internal_uri: Option<String>,
    pub internal_host: Option<String>,
    pub internal_ip: Option<String>,
    pub external_uri: Option<String>,
    pub external_host: Option<String>,
    pub location: Option<String>,
    pub short_location: Option<String>,
    pub instance_type: Option<String>,
    pub version: String,
}

impl CoordinatorStatusRepresentation {
    pub fn from_coordinator_status(status: &CoordinatorStatus) -> Self {
        Self::with_prefix_sizes(status, UUID_STRING_LENGTH, 0)
    }

    pub fn from_population<'a>(
        coordinators: impl IntoIterator<Item = &'a CoordinatorStatus> + Clone,
    ) -> Vec<Self> {
        let ids: Vec<String> = coordinators
            .clone()
            .into_iter()
            .filter_map(|c| c.coordinator_id.clone())
            .collect();
        let prefix_size = shortest_unique_prefix(ids.iter().map(|s| s.as_str()), MIN_PREFIX_SIZE)
            .unwrap_or(UUID_STRING_LENGTH);
        let locations: Vec<&str> = coordinators
            .clone()
            .into_iter()
            .filter_map(|c| c.location.as_deref())
            .collect();
        let location_parts =
            common_prefix_segments('/', locations.iter().copied(), MIN_LOCATION_SEGMENTS)
                .unwrap_or(0);
        coordinators
            .into_iter()
            .map(|c| Self::with_prefix_sizes(c, prefix_size, location_parts))
            .collect()
    }

    fn with_prefix_sizes(
        status: &CoordinatorStatus,
        prefix_size: usize,
        location_parts: usize,
    ) -> Self {
        CoordinatorStatusRepresentation {
            coordinator_id: status.coordinator_id.clone(),
            short_coordinator_id: status
                .coordinator_id
                .as_ref()
                .map(|id| safe_truncate(id, prefix_size)),
            instance_id: status.instance_id.clone(),
            state: status.state.to_string(),
            internal_uri: status.internal_uri.clone(),
            internal_host: status.internal_uri.as_deref().and_then(uri_host),
            internal_ip: status
                .internal_uri
                .as_deref()
                .and_then(uri_host)
                .map(|host| resolve_host(&host)),
            external_uri: status.external_uri.clone(),
            external_host: status.external_uri.as_deref().and_then(uri_host),
            location: status.location.clone(),
            short_location: status
                .location
                .as_deref()
                .map(|l| trim_leading_segments(l, '/', location_parts)),
            instance_type: status.instance_type.clone(),
            version: status.version.clone(),
        }
    }
}

/// Host component of a URI string, without pulling in a full URL parser
pub fn uri_host(uri: &str) -> Option<String> {
    let rest = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Resolve a host to an IP for display
///
/// `localhost` is special-cased; resolution failure renders as the
/// literal string `"unknown"` rather than an error.
fn resolve_host(host: &str) -> String {
    if host == "localhost" {
        return "127.0.0.1".to_string();
    }
    if host.parse::<std::net::IpAddr>().is_ok() {
        return host.to_string();
    }
    match (host, 0u16).to_socket_addrs() {
        Ok(mut addrs) => addrs
            .next()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        Err(_) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::Assignment;
    use crate::lifecycle::SlotLifecycleState;

    fn slot(location: &str) -> SlotStatus {
        SlotStatus::new(
            Uuid::new_v4(),
            Some("http://10.0.0.1:9999/v1/slot/1".to_string()),
            None,
            Some("i-1".to_string()),
            location,
            SlotLifecycleState::Running,
            Some(Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap()),
            None,
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_uri_host() {
        assert_eq!(uri_host("http://agent1.example.com:9999/v1"), Some("agent1.example.com".to_string()));
        assert_eq!(uri_host("http://10.0.0.1:9999"), Some("10.0.0.1".to_string()));
        assert_eq!(uri_host("https://localhost"), Some("localhost".to_string()));
        assert_eq!(uri_host(""), None);
    }

    #[test]
    fn test_resolve_localhost() {
        assert_eq!(resolve_host("localhost"), "127.0.0.1");
        assert_eq!(resolve_host("10.1.2.3"), "10.1.2.3");
    }

    #[test]
    fn test_short_ids_are_population_unique() {
        let slots: Vec<SlotStatus> = (0..4).map(|_| slot("/east/a/apple1")).collect();
        let factory = SlotRepresentationFactory::from_population(slots.iter());
        let short_ids: std::collections::BTreeSet<String> = slots
            .iter()
            .map(|s| factory.create(s).short_id)
            .collect();
        assert_eq!(short_ids.len(), slots.len());
        for id in &short_ids {
            assert!(id.len() >= MIN_PREFIX_SIZE);
        }
    }

    #[test]
    fn test_short_location_trims_common_prefix() {
        let slots = vec![
            slot("/ec2/us-east/a/apple1"),
            slot("/ec2/us-east/b/apple2"),
        ];
        let factory = SlotRepresentationFactory::from_population(slots.iter());
        let repr = factory.create(&slots[0]);
        // shared "/ec2/us-east" is trimmed; two distinguishing segments remain
        assert_eq!(repr.short_location, "/a/apple1");
        assert_eq!(repr.location, "/ec2/us-east/a/apple1");
    }

    #[test]
    fn test_single_slot_keeps_min_prefix() {
        let slots = vec![slot("/east/a/apple1")];
        let factory = SlotRepresentationFactory::from_population(slots.iter());
        let repr = factory.create(&slots[0]);
        assert_eq!(repr.short_id.len(), MIN_PREFIX_SIZE);
    }

    #[test]
    fn test_representation_round_trip() {
        let status = slot("/east/a/apple1");
        let repr = SlotStatusRepresentation::from_slot_status(&status);
        let json = serde_json::to_string(&repr).unwrap();
        let back: SlotStatusRepresentation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, status.id);
        assert_eq!(back.version, status.version);
        assert_eq!(back.binary.as_deref(), Some("food.fruit:apple:1.0"));
    }
}
