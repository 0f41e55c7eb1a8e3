//! Coordinator status

use serde::{Deserialize, Serialize};

use crate::error::{AirshipError, AirshipResult};
use crate::lifecycle::CoordinatorLifecycleState;
use crate::version::create_coordinator_version;

/// Observed state of a coordinator process
///
/// Identity is the coordinator id; the version fingerprint covers id and
/// state only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub coordinator_id: Option<String>,
    pub state: CoordinatorLifecycleState,
    pub instance_id: String,
    pub internal_uri: Option<String>,
    pub external_uri: Option<String>,
    pub location: Option<String>,
    pub instance_type: Option<String>,
    pub version: String,
}

impl CoordinatorStatus {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        coordinator_id: Option<String>,
        state: CoordinatorLifecycleState,
        instance_id: impl Into<String>,
        internal_uri: Option<String>,
        external_uri: Option<String>,
        location: Option<String>,
        instance_type: Option<String>,
    ) -> AirshipResult<CoordinatorStatus> {
        let instance_id = instance_id.into();
        if instance_id.is_empty() {
            return Err(AirshipError::invalid_spec("coordinator instanceId is empty"));
        }
        let version = create_coordinator_version(coordinator_id.as_deref(), state);
        Ok(CoordinatorStatus {
            coordinator_id,
            state,
            instance_id,
            internal_uri,
            external_uri,
            location,
            instance_type,
            version,
        })
    }

    pub fn change_state(&self, state: CoordinatorLifecycleState) -> CoordinatorStatus {
        CoordinatorStatus {
            state,
            version: create_coordinator_version(self.coordinator_id.as_deref(), state),
            ..self.clone()
        }
    }
}

impl PartialEq for CoordinatorStatus {
    fn eq(&self, other: &Self) -> bool {
        self.coordinator_id == other.coordinator_id
    }
}

impl Eq for CoordinatorStatus {}
