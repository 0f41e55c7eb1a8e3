//! Version fingerprinting for optimistic concurrency control
//!
//! Every stateful entity carries a version string derived from its
//! observable state: parts are joined with a separator unlikely to appear
//! in real data, absent parts are replaced by a sentinel, and the result
//! is digested to lowercase hex. Composite versions (a whole fleet of
//! slots or agents) canonicalize their children by sorting on a stable
//! key first, so the fingerprint is invariant to iteration order.
//!
//! The fingerprint is an anti-corruption token, not a security control.
//! Recomputation happens inside every status constructor; a new version
//! is always published together with the state it describes.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::agent::AgentStatus;
use crate::assignment::Assignment;
use crate::error::{AirshipError, AirshipResult};
use crate::lifecycle::{CoordinatorLifecycleState, SlotLifecycleState};
use crate::slot::SlotStatus;

pub const AIRSHIP_SLOT_VERSION_HEADER: &str = "x-airship-slot-version";
pub const AIRSHIP_SLOTS_VERSION_HEADER: &str = "x-airship-slots-version";
pub const AIRSHIP_AGENT_VERSION_HEADER: &str = "x-airship-agent-version";
pub const AIRSHIP_AGENTS_VERSION_HEADER: &str = "x-airship-agents-version";
pub const AIRSHIP_COORDINATOR_VERSION_HEADER: &str = "x-airship-coordinator-version";
pub const AIRSHIP_FORCE_HEADER: &str = "x-airship-force";

const SEPARATOR: &str = "||";
const NULL_SENTINEL: &str = "--NULL--";

fn digest(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Join parts with the separator, substituting the sentinel for absent
/// parts, and digest the result
pub fn fingerprint<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    let joined: Vec<&str> = parts
        .into_iter()
        .map(|part| part.unwrap_or(NULL_SENTINEL))
        .collect();
    digest(&joined.join(SEPARATOR))
}

fn assignment_part(assignment: Option<&Assignment>) -> Option<String> {
    assignment.map(|a| format!("{} {}", a.binary, a.config))
}

/// Version of a single slot, derived from its id, state, and assignment
pub fn create_slot_version(
    id: Uuid,
    state: SlotLifecycleState,
    assignment: Option<&Assignment>,
) -> String {
    let id = id.to_string();
    let state = state.to_string();
    let assignment = assignment_part(assignment);
    fingerprint([Some(id.as_str()), Some(state.as_str()), assignment.as_deref()])
}

/// Composite version of a set of slots, invariant to iteration order
pub fn create_slots_version<'a>(slots: impl IntoIterator<Item = &'a SlotStatus>) -> String {
    // canonicalize slot order
    let versions: BTreeMap<Uuid, &str> = slots
        .into_iter()
        .map(|slot| (slot.id, slot.version.as_str()))
        .collect();
    fingerprint(versions.values().map(|v| Some(*v)))
}

/// Version of an agent, derived from its identity, state, the sorted
/// versions of its slots, and its sorted resource declarations
pub fn create_agent_version<'a>(
    agent_id: Option<&str>,
    state: crate::lifecycle::AgentLifecycleState,
    slots: impl IntoIterator<Item = &'a SlotStatus>,
    resources: &BTreeMap<String, i64>,
) -> String {
    let state = state.to_string();
    let slot_versions: BTreeMap<Uuid, String> = slots
        .into_iter()
        .map(|slot| (slot.id, slot.version.clone()))
        .collect();
    let resources = resources
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("--");

    let mut parts: Vec<Option<&str>> = vec![agent_id, Some(state.as_str())];
    parts.extend(slot_versions.values().map(|v| Some(v.as_str())));
    parts.push(Some(resources.as_str()));
    fingerprint(parts)
}

/// Composite version of a set of agents, invariant to iteration order
pub fn create_agents_version<'a>(agents: impl IntoIterator<Item = &'a AgentStatus>) -> String {
    // canonicalize agent order by id + instance id
    let versions: BTreeMap<String, &str> = agents
        .into_iter()
        .map(|agent| {
            let key = format!(
                "{}{}",
                agent.agent_id.as_deref().unwrap_or(""),
                agent.instance_id
            );
            (key, agent.version.as_str())
        })
        .collect();
    fingerprint(versions.values().map(|v| Some(*v)))
}

/// Version of a coordinator, derived from its identity and state
pub fn create_coordinator_version(
    coordinator_id: Option<&str>,
    state: CoordinatorLifecycleState,
) -> String {
    let state = state.to_string();
    fingerprint([coordinator_id, Some(state.as_str())])
}

fn check(
    expected: Option<&str>,
    actual: &str,
    header: &'static str,
    force: bool,
) -> AirshipResult<()> {
    match expected {
        Some(expected) if !force && expected != actual => Err(AirshipError::VersionConflict {
            header,
            version: actual.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Fail with a conflict unless the expected slot version matches (or the
/// check is forced)
pub fn check_slot_version(
    slot: &SlotStatus,
    expected: Option<&str>,
    force: bool,
) -> AirshipResult<()> {
    check(expected, &slot.version, AIRSHIP_SLOT_VERSION_HEADER, force)
}

pub fn check_slots_version<'a>(
    slots: impl IntoIterator<Item = &'a SlotStatus>,
    expected: Option<&str>,
    force: bool,
) -> AirshipResult<()> {
    let actual = create_slots_version(slots);
    check(expected, &actual, AIRSHIP_SLOTS_VERSION_HEADER, force)
}

pub fn check_agent_version(
    agent: &AgentStatus,
    expected: Option<&str>,
    force: bool,
) -> AirshipResult<()> {
    check(expected, &agent.version, AIRSHIP_AGENT_VERSION_HEADER, force)
}

pub fn check_agents_version<'a>(
    agents: impl IntoIterator<Item = &'a AgentStatus>,
    expected: Option<&str>,
    force: bool,
) -> AirshipResult<()> {
    let actual = create_agents_version(agents);
    check(expected, &actual, AIRSHIP_AGENTS_VERSION_HEADER, force)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::AgentLifecycleState;

    fn assignment() -> Assignment {
        Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap()
    }

    fn slot(state: SlotLifecycleState) -> SlotStatus {
        let assignment = match state {
            SlotLifecycleState::Terminated | SlotLifecycleState::Unknown => None,
            _ => Some(assignment()),
        };
        SlotStatus::new(
            Uuid::new_v4(),
            None,
            None,
            None,
            "/test/slot",
            state,
            assignment,
            None,
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_slot_version_is_deterministic() {
        let id = Uuid::new_v4();
        let a = create_slot_version(id, SlotLifecycleState::Running, Some(&assignment()));
        let b = create_slot_version(id, SlotLifecycleState::Running, Some(&assignment()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_slot_version_changes_with_state() {
        let id = Uuid::new_v4();
        let running = create_slot_version(id, SlotLifecycleState::Running, Some(&assignment()));
        let stopped = create_slot_version(id, SlotLifecycleState::Stopped, Some(&assignment()));
        assert_ne!(running, stopped);
    }

    #[test]
    fn test_missing_assignment_uses_sentinel() {
        let id = Uuid::new_v4();
        let with = create_slot_version(id, SlotLifecycleState::Terminated, Some(&assignment()));
        let without = create_slot_version(id, SlotLifecycleState::Terminated, None);
        assert_ne!(with, without);
    }

    #[test]
    fn test_slots_version_order_invariant() {
        let s1 = slot(SlotLifecycleState::Running);
        let s2 = slot(SlotLifecycleState::Stopped);
        assert_eq!(
            create_slots_version([&s1, &s2]),
            create_slots_version([&s2, &s1])
        );
    }

    #[test]
    fn test_agent_version_resource_order_invariant() {
        let mut forward = BTreeMap::new();
        forward.insert("cpu".to_string(), 8);
        forward.insert("memory".to_string(), 1024);

        let a = create_agent_version(Some("agent-1"), AgentLifecycleState::Online, [], &forward);
        let b = create_agent_version(Some("agent-1"), AgentLifecycleState::Online, [], &forward);
        assert_eq!(a, b);

        let mut changed = forward.clone();
        changed.insert("cpu".to_string(), 16);
        let c = create_agent_version(Some("agent-1"), AgentLifecycleState::Online, [], &changed);
        assert_ne!(a, c);
    }

    #[test]
    fn test_check_passes_without_expectation() {
        let slot = slot(SlotLifecycleState::Running);
        check_slot_version(&slot, None, false).unwrap();
    }

    #[test]
    fn test_check_conflict_carries_current_version() {
        let slot = slot(SlotLifecycleState::Running);
        let err = check_slot_version(&slot, Some("stale"), false).unwrap_err();
        match err {
            AirshipError::VersionConflict { header, version } => {
                assert_eq!(header, AIRSHIP_SLOT_VERSION_HEADER);
                assert_eq!(version, slot.version);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_force_bypasses_check() {
        let slot = slot(SlotLifecycleState::Running);
        check_slot_version(&slot, Some("stale"), true).unwrap();
        check_slots_version([&slot], Some("stale"), true).unwrap();
    }
}
