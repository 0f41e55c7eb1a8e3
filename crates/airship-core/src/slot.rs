//! Slot status - the observed state of a single deployment slot
//!
//! SlotStatus is an immutable value: every "mutation" goes through a
//! `change_*` method that builds a fresh instance, and the version
//! fingerprint is recomputed inside construction so a new version is
//! always published together with the state it describes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assignment::Assignment;
use crate::error::{AirshipError, AirshipResult};
use crate::lifecycle::SlotLifecycleState;
use crate::version::create_slot_version;

/// Observed state of a deployment slot, as reported by its agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub id: Uuid,
    /// Internal URI of the slot on its agent
    pub self_uri: Option<String>,
    pub external_uri: Option<String>,
    pub instance_id: Option<String>,
    /// Hierarchical location, always starting with `/`
    pub location: String,
    pub assignment: Option<Assignment>,
    pub state: SlotLifecycleState,
    /// Fingerprint of (id, state, assignment); recomputed on every change
    pub version: String,
    pub expected_state: Option<SlotLifecycleState>,
    pub expected_assignment: Option<Assignment>,
    pub status_message: Option<String>,
    pub install_path: Option<String>,
    pub resources: BTreeMap<String, i64>,
}

impl SlotStatus {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        self_uri: Option<String>,
        external_uri: Option<String>,
        instance_id: Option<String>,
        location: impl Into<String>,
        state: SlotLifecycleState,
        assignment: Option<Assignment>,
        install_path: Option<String>,
        resources: BTreeMap<String, i64>,
    ) -> AirshipResult<SlotStatus> {
        Self::with_expected_state(
            id,
            self_uri,
            external_uri,
            instance_id,
            location,
            state,
            assignment,
            install_path,
            resources,
            None,
            None,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_expected_state(
        id: Uuid,
        self_uri: Option<String>,
        external_uri: Option<String>,
        instance_id: Option<String>,
        location: impl Into<String>,
        state: SlotLifecycleState,
        assignment: Option<Assignment>,
        install_path: Option<String>,
        resources: BTreeMap<String, i64>,
        expected_state: Option<SlotLifecycleState>,
        expected_assignment: Option<Assignment>,
        status_message: Option<String>,
    ) -> AirshipResult<SlotStatus> {
        let location = location.into();
        if !location.starts_with('/') {
            return Err(AirshipError::invalid_spec(format!(
                "slot location must start with '/': {location}"
            )));
        }
        let terminal = matches!(
            state,
            SlotLifecycleState::Terminated | SlotLifecycleState::Unknown
        );
        if assignment.is_none() && !terminal {
            return Err(AirshipError::invalid_spec(format!(
                "slot {id} in state {state} requires an assignment"
            )));
        }

        // a terminated slot holds nothing
        let (assignment, install_path, resources) = if state == SlotLifecycleState::Terminated {
            (None, None, BTreeMap::new())
        } else {
            (assignment, install_path, resources)
        };

        let version = create_slot_version(id, state, assignment.as_ref());
        Ok(SlotStatus {
            id,
            self_uri,
            external_uri,
            instance_id,
            location,
            assignment,
            state,
            version,
            expected_state,
            expected_assignment,
            status_message,
            install_path,
            resources,
        })
    }

    /// New status in a different lifecycle state
    pub fn change_state(&self, state: SlotLifecycleState) -> AirshipResult<SlotStatus> {
        Self::with_expected_state(
            self.id,
            self.self_uri.clone(),
            self.external_uri.clone(),
            self.instance_id.clone(),
            self.location.clone(),
            state,
            self.assignment.clone(),
            self.install_path.clone(),
            self.resources.clone(),
            self.expected_state,
            self.expected_assignment.clone(),
            self.status_message.clone(),
        )
    }

    /// New status owned by a different agent instance
    pub fn change_instance_id(&self, instance_id: Option<String>) -> AirshipResult<SlotStatus> {
        Self::with_expected_state(
            self.id,
            self.self_uri.clone(),
            self.external_uri.clone(),
            instance_id,
            self.location.clone(),
            self.state,
            self.assignment.clone(),
            self.install_path.clone(),
            self.resources.clone(),
            self.expected_state,
            self.expected_assignment.clone(),
            self.status_message.clone(),
        )
    }

    /// New status with a replaced assignment (install/upgrade)
    pub fn change_assignment(
        &self,
        state: SlotLifecycleState,
        assignment: Assignment,
        resources: BTreeMap<String, i64>,
    ) -> AirshipResult<SlotStatus> {
        Self::with_expected_state(
            self.id,
            self.self_uri.clone(),
            self.external_uri.clone(),
            self.instance_id.clone(),
            self.location.clone(),
            state,
            Some(assignment),
            self.install_path.clone(),
            resources,
            self.expected_state,
            self.expected_assignment.clone(),
            self.status_message.clone(),
        )
    }

    /// New status with a different desired state attached
    pub fn change_expected_state(
        &self,
        expected_state: Option<SlotLifecycleState>,
        expected_assignment: Option<Assignment>,
    ) -> AirshipResult<SlotStatus> {
        Self::with_expected_state(
            self.id,
            self.self_uri.clone(),
            self.external_uri.clone(),
            self.instance_id.clone(),
            self.location.clone(),
            self.state,
            self.assignment.clone(),
            self.install_path.clone(),
            self.resources.clone(),
            expected_state,
            expected_assignment,
            self.status_message.clone(),
        )
    }

    /// New status carrying an operator-facing message
    pub fn change_status_message(&self, message: Option<String>) -> AirshipResult<SlotStatus> {
        Self::with_expected_state(
            self.id,
            self.self_uri.clone(),
            self.external_uri.clone(),
            self.instance_id.clone(),
            self.location.clone(),
            self.state,
            self.assignment.clone(),
            self.install_path.clone(),
            self.resources.clone(),
            self.expected_state,
            self.expected_assignment.clone(),
            message,
        )
    }
}
