//! Agent status - the observed state of an agent node and its slots

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AirshipResult;
use crate::lifecycle::{AgentLifecycleState, SlotLifecycleState};
use crate::slot::SlotStatus;
use crate::version::create_agent_version;

/// Observed state of an agent node
///
/// Identity is the agent id alone; everything else is observation. The
/// version fingerprint covers the agent's own state plus the canonicalized
/// versions of its slots and resources, so it changes exactly when some
/// observable state changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Self-reported agent identity; absent until the agent first announces
    pub agent_id: Option<String>,
    pub state: AgentLifecycleState,
    pub instance_id: String,
    pub internal_uri: Option<String>,
    pub external_uri: Option<String>,
    pub location: Option<String>,
    pub instance_type: Option<String>,
    pub slots: BTreeMap<Uuid, SlotStatus>,
    pub resources: BTreeMap<String, i64>,
    pub version: String,
}

impl AgentStatus {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: Option<String>,
        state: AgentLifecycleState,
        instance_id: impl Into<String>,
        internal_uri: Option<String>,
        external_uri: Option<String>,
        location: Option<String>,
        instance_type: Option<String>,
        slots: impl IntoIterator<Item = SlotStatus>,
        resources: BTreeMap<String, i64>,
    ) -> AirshipResult<AgentStatus> {
        let instance_id = instance_id.into();

        // every contained slot is forced onto this agent's instance
        let mut slot_map = BTreeMap::new();
        for slot in slots {
            let slot = if slot.instance_id.as_deref() != Some(instance_id.as_str()) {
                slot.change_instance_id(Some(instance_id.clone()))?
            } else {
                slot
            };
            slot_map.insert(slot.id, slot);
        }

        let version =
            create_agent_version(agent_id.as_deref(), state, slot_map.values(), &resources);

        Ok(AgentStatus {
            agent_id,
            state,
            instance_id,
            internal_uri,
            external_uri,
            location,
            instance_type,
            slots: slot_map,
            resources,
            version,
        })
    }

    pub fn slot(&self, id: Uuid) -> Option<&SlotStatus> {
        self.slots.get(&id)
    }

    pub fn slot_statuses(&self) -> impl Iterator<Item = &SlotStatus> {
        self.slots.values()
    }

    /// New status in a different lifecycle state
    pub fn change_state(&self, state: AgentLifecycleState) -> AirshipResult<AgentStatus> {
        self.rebuild(state, self.slots.values().cloned(), self.internal_uri.clone())
    }

    /// New status with one slot replaced; a terminated slot drops out of
    /// the map entirely
    pub fn change_slot_status(&self, slot_status: SlotStatus) -> AirshipResult<AgentStatus> {
        let mut slots = self.slots.clone();
        if slot_status.state == SlotLifecycleState::Terminated {
            slots.remove(&slot_status.id);
        } else {
            slots.insert(slot_status.id, slot_status);
        }
        self.rebuild(self.state, slots.into_values(), self.internal_uri.clone())
    }

    /// New status with every slot forced into `slot_state` (e.g. UNKNOWN
    /// after losing contact)
    pub fn change_all_slots_state(
        &self,
        slot_state: SlotLifecycleState,
    ) -> AirshipResult<AgentStatus> {
        let slots = self
            .slots
            .values()
            .map(|slot| slot.change_state(slot_state))
            .collect::<AirshipResult<Vec<_>>>()?;
        self.rebuild(self.state, slots, self.internal_uri.clone())
    }

    pub fn change_internal_uri(&self, internal_uri: Option<String>) -> AirshipResult<AgentStatus> {
        self.rebuild(self.state, self.slots.values().cloned(), internal_uri)
    }

    fn rebuild(
        &self,
        state: AgentLifecycleState,
        slots: impl IntoIterator<Item = SlotStatus>,
        internal_uri: Option<String>,
    ) -> AirshipResult<AgentStatus> {
        AgentStatus::new(
            self.agent_id.clone(),
            state,
            self.instance_id.clone(),
            internal_uri,
            self.external_uri.clone(),
            self.location.clone(),
            self.instance_type.clone(),
            slots,
            self.resources.clone(),
        )
    }
}

impl PartialEq for AgentStatus {
    fn eq(&self, other: &Self) -> bool {
        self.agent_id == other.agent_id
    }
}

impl Eq for AgentStatus {}

impl std::hash::Hash for AgentStatus {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.agent_id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::Assignment;

    fn slot(instance_id: Option<&str>) -> SlotStatus {
        SlotStatus::new(
            Uuid::new_v4(),
            None,
            None,
            instance_id.map(|s| s.to_string()),
            "/east/a/apple1",
            SlotLifecycleState::Running,
            Some(Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap()),
            None,
            BTreeMap::new(),
        )
        .unwrap()
    }

    fn agent(slots: Vec<SlotStatus>) -> AgentStatus {
        AgentStatus::new(
            Some("agent-1".to_string()),
            AgentLifecycleState::Online,
            "i-12345",
            Some("http://10.0.0.1:9999".to_string()),
            Some("http://agent1.example.com:9999".to_string()),
            Some("/east/a".to_string()),
            Some("m1.large".to_string()),
            slots,
            BTreeMap::from([("cpu".to_string(), 8), ("memory".to_string(), 1024)]),
        )
        .unwrap()
    }

    #[test]
    fn test_slots_coerced_to_agent_instance() {
        let status = agent(vec![slot(Some("i-other")), slot(None)]);
        for slot in status.slot_statuses() {
            assert_eq!(slot.instance_id.as_deref(), Some("i-12345"));
        }
    }

    #[test]
    fn test_version_invariant_to_slot_order() {
        let s1 = slot(None);
        let s2 = slot(None);
        let a = agent(vec![s1.clone(), s2.clone()]);
        let b = agent(vec![s2, s1]);
        assert_eq!(a.version, b.version);
    }

    #[test]
    fn test_version_changes_with_slot_state() {
        let s = slot(None);
        let before = agent(vec![s.clone()]);
        let stopped = s.change_state(SlotLifecycleState::Stopped).unwrap();
        let after = before.change_slot_status(stopped).unwrap();
        assert_ne!(before.version, after.version);
    }

    #[test]
    fn test_terminated_slot_removed_from_map() {
        let s = slot(None);
        let status = agent(vec![s.clone()]);
        let terminated = s.change_state(SlotLifecycleState::Terminated).unwrap();
        let after = status.change_slot_status(terminated).unwrap();
        assert!(after.slots.is_empty());
    }

    #[test]
    fn test_equality_by_agent_id_only() {
        let a = agent(vec![]);
        let b = agent(vec![slot(None)]);
        assert_eq!(a, b);
        assert_ne!(a.version, b.version);
    }

    #[test]
    fn test_change_all_slots_state() {
        let status = agent(vec![slot(None), slot(None)]);
        let unknown = status
            .change_all_slots_state(SlotLifecycleState::Unknown)
            .unwrap();
        assert!(unknown
            .slot_statuses()
            .all(|s| s.state == SlotLifecycleState::Unknown));
    }
}
