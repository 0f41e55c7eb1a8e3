//! Remote agent proxies
//!
//! Each agent in the directory is reached through a RemoteAgent proxy
//! holding a locally cached AgentStatus. Remote calls are independently
//! failing and independently latent: every call carries its own timeout,
//! a timeout is a normal retryable outcome, and one slow agent never
//! blocks commands against its siblings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use airship_core::{
    AgentLifecycleState, AgentStatus, AirshipError, AirshipResult, AgentStatusRepresentation,
    Installation, InstallationRepresentation, SlotLifecycleState, SlotStatus,
    SlotStatusRepresentation,
};

use crate::provision::Instance;

/// Proxy for one agent process
#[async_trait]
pub trait RemoteAgent: Send + Sync {
    /// Latest locally cached status; eventually consistent with ground
    /// truth, bounded by the poll interval
    fn status(&self) -> AgentStatus;

    fn set_internal_uri(&self, internal_uri: Option<String>);

    fn set_external_uri(&self, external_uri: Option<String>);

    /// Refresh the cached status from the agent itself
    async fn update_status(&self) -> AirshipResult<()>;

    /// Create a new slot on the agent and install into it
    async fn install(&self, installation: &Installation) -> AirshipResult<SlotStatus>;

    /// Proxies for the agent's current slots
    fn slots(&self) -> Vec<Arc<dyn RemoteSlot>>;
}

/// Proxy for one slot on a remote agent
#[async_trait]
pub trait RemoteSlot: Send + Sync {
    fn id(&self) -> Uuid;

    fn status(&self) -> SlotStatus;

    async fn assign(&self, installation: &Installation) -> AirshipResult<SlotStatus>;

    async fn start(&self) -> AirshipResult<SlotStatus>;

    async fn stop(&self) -> AirshipResult<SlotStatus>;

    async fn restart(&self) -> AirshipResult<SlotStatus>;

    async fn terminate(&self) -> AirshipResult<SlotStatus>;
}

/// Creates remote agent proxies for provisioned instances
pub trait RemoteAgentFactory: Send + Sync {
    fn create_remote_agent(
        &self,
        instance: &Instance,
        state: AgentLifecycleState,
    ) -> Arc<dyn RemoteAgent>;
}

/// Shared mutable view of an agent, updated by the proxy and its slots
struct AgentCache {
    status: Mutex<AgentStatus>,
}

impl AgentCache {
    fn apply_slot_status(&self, slot_status: &SlotStatus) {
        let mut status = self.status.lock();
        match status.change_slot_status(slot_status.clone()) {
            Ok(next) => *status = next,
            Err(e) => warn!("failed to fold slot status into agent cache: {e}"),
        }
    }
}

/// HTTP implementation of RemoteAgent
pub struct HttpRemoteAgent {
    cache: Arc<AgentCache>,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpRemoteAgent {
    pub fn new(instance: &Instance, state: AgentLifecycleState, timeout: Duration) -> HttpRemoteAgent {
        let status = AgentStatus::new(
            None,
            state,
            instance.instance_id.clone(),
            instance.internal_uri.clone(),
            instance.external_uri.clone(),
            instance.location.clone(),
            instance.instance_type.clone(),
            [],
            Default::default(),
        )
        .expect("agent status from instance inventory is always well formed");
        HttpRemoteAgent {
            cache: Arc::new(AgentCache {
                status: Mutex::new(status),
            }),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn base_uri(&self) -> Option<String> {
        self.cache.status.lock().internal_uri.clone()
    }

    async fn fetch_status(&self, base_uri: &str) -> AirshipResult<AgentStatus> {
        let uri = format!("{}/v1/agent", base_uri.trim_end_matches('/'));
        let representation: AgentStatusRepresentation =
            request_json(self.client.get(&uri), self.timeout, &uri).await?;
        agent_status_from_representation(&representation)
    }
}

#[async_trait]
impl RemoteAgent for HttpRemoteAgent {
    fn status(&self) -> AgentStatus {
        self.cache.status.lock().clone()
    }

    fn set_internal_uri(&self, internal_uri: Option<String>) {
        let mut status = self.cache.status.lock();
        if let Ok(next) = status.change_internal_uri(internal_uri) {
            *status = next;
        }
    }

    fn set_external_uri(&self, external_uri: Option<String>) {
        let mut status = self.cache.status.lock();
        let mut next = status.clone();
        next.external_uri = external_uri;
        *status = next;
    }

    async fn update_status(&self) -> AirshipResult<()> {
        let Some(base_uri) = self.base_uri() else {
            // nothing to poll yet; the instance has no address
            return Ok(());
        };
        match self.fetch_status(&base_uri).await {
            Ok(status) => {
                debug!(
                    "updated status of agent {} ({})",
                    status.agent_id.as_deref().unwrap_or("-"),
                    status.instance_id
                );
                *self.cache.status.lock() = status;
                Ok(())
            }
            Err(e) => {
                // lost contact: keep the slots but mark them unknown
                let mut status = self.cache.status.lock();
                let offline = status
                    .change_state(AgentLifecycleState::Offline)
                    .and_then(|s| s.change_all_slots_state(SlotLifecycleState::Unknown));
                if let Ok(offline) = offline {
                    *status = offline;
                }
                Err(e)
            }
        }
    }

    async fn install(&self, installation: &Installation) -> AirshipResult<SlotStatus> {
        let base_uri = self
            .base_uri()
            .ok_or_else(|| AirshipError::RemoteUnreachable("agent has no internal uri".into()))?;
        let uri = format!("{}/v1/agent/slot", base_uri.trim_end_matches('/'));
        let body = InstallationRepresentation::from_installation(installation);
        let representation: SlotStatusRepresentation =
            request_json(self.client.post(&uri).json(&body), self.timeout, &uri).await?;
        let slot_status = slot_status_from_representation(&representation)?;
        self.cache.apply_slot_status(&slot_status);
        Ok(slot_status)
    }

    fn slots(&self) -> Vec<Arc<dyn RemoteSlot>> {
        let status = self.cache.status.lock();
        status
            .slot_statuses()
            .map(|slot| {
                Arc::new(HttpRemoteSlot {
                    id: slot.id,
                    cache: self.cache.clone(),
                    client: self.client.clone(),
                    timeout: self.timeout,
                }) as Arc<dyn RemoteSlot>
            })
            .collect()
    }
}

/// HTTP implementation of RemoteSlot
pub struct HttpRemoteSlot {
    id: Uuid,
    cache: Arc<AgentCache>,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpRemoteSlot {
    fn self_uri(&self) -> AirshipResult<String> {
        self.status()
            .self_uri
            .ok_or_else(|| AirshipError::RemoteUnreachable(format!("slot {} has no uri", self.id)))
    }

    async fn lifecycle(&self, action: &str) -> AirshipResult<SlotStatus> {
        let uri = format!("{}/lifecycle", self.self_uri()?.trim_end_matches('/'));
        let representation: SlotStatusRepresentation =
            request_json(self.client.put(&uri).body(action.to_string()), self.timeout, &uri)
                .await?;
        let slot_status = slot_status_from_representation(&representation)?;
        self.cache.apply_slot_status(&slot_status);
        Ok(slot_status)
    }
}

#[async_trait]
impl RemoteSlot for HttpRemoteSlot {
    fn id(&self) -> Uuid {
        self.id
    }

    fn status(&self) -> SlotStatus {
        let status = self.cache.status.lock();
        status.slot(self.id).cloned().unwrap_or_else(|| {
            // the slot vanished from the cache between selection and use
            SlotStatus::new(
                self.id,
                None,
                None,
                Some(status.instance_id.clone()),
                "/unknown",
                SlotLifecycleState::Unknown,
                None,
                None,
                Default::default(),
            )
            .expect("unknown slot status is always well formed")
        })
    }

    async fn assign(&self, installation: &Installation) -> AirshipResult<SlotStatus> {
        let uri = format!("{}/assignment", self.self_uri()?.trim_end_matches('/'));
        let body = InstallationRepresentation::from_installation(installation);
        let representation: SlotStatusRepresentation =
            request_json(self.client.put(&uri).json(&body), self.timeout, &uri).await?;
        let slot_status = slot_status_from_representation(&representation)?;
        self.cache.apply_slot_status(&slot_status);
        Ok(slot_status)
    }

    async fn start(&self) -> AirshipResult<SlotStatus> {
        self.lifecycle("running").await
    }

    async fn stop(&self) -> AirshipResult<SlotStatus> {
        self.lifecycle("stopped").await
    }

    async fn restart(&self) -> AirshipResult<SlotStatus> {
        self.lifecycle("restarting").await
    }

    async fn terminate(&self) -> AirshipResult<SlotStatus> {
        let uri = self.self_uri()?;
        let representation: SlotStatusRepresentation =
            request_json(self.client.delete(&uri), self.timeout, &uri).await?;
        let slot_status = slot_status_from_representation(&representation)?;
        self.cache.apply_slot_status(&slot_status);
        Ok(slot_status)
    }
}

/// Factory producing HTTP proxies with a shared call timeout
pub struct HttpRemoteAgentFactory {
    timeout: Duration,
}

impl HttpRemoteAgentFactory {
    pub fn new(timeout: Duration) -> HttpRemoteAgentFactory {
        HttpRemoteAgentFactory { timeout }
    }
}

impl RemoteAgentFactory for HttpRemoteAgentFactory {
    fn create_remote_agent(
        &self,
        instance: &Instance,
        state: AgentLifecycleState,
    ) -> Arc<dyn RemoteAgent> {
        Arc::new(HttpRemoteAgent::new(instance, state, self.timeout))
    }
}

/// Issue a request with a deadline, mapping the failure modes onto the
/// error taxonomy
async fn request_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    timeout: Duration,
    uri: &str,
) -> AirshipResult<T> {
    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| AirshipError::CommandTimeout {
            operation: uri.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?
        .map_err(|e| AirshipError::RemoteUnreachable(format!("{uri}: {e}")))?;

    if !response.status().is_success() {
        return Err(AirshipError::RemoteUnreachable(format!(
            "{uri}: HTTP {}",
            response.status()
        )));
    }

    tokio::time::timeout(timeout, response.json::<T>())
        .await
        .map_err(|_| AirshipError::CommandTimeout {
            operation: uri.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?
        .map_err(|e| AirshipError::Serialization(format!("{uri}: {e}")))
}

/// Rebuild a SlotStatus from its wire form
pub fn slot_status_from_representation(
    representation: &SlotStatusRepresentation,
) -> AirshipResult<SlotStatus> {
    let state = SlotLifecycleState::lookup(&representation.status).ok_or_else(|| {
        AirshipError::invalid_spec(format!("unknown slot state {}", representation.status))
    })?;
    let assignment = match (&representation.binary, &representation.config) {
        (Some(binary), Some(config)) => {
            Some(airship_core::Assignment::new(binary.clone(), config.clone())?)
        }
        _ => None,
    };
    let expected_state = representation
        .expected_status
        .as_deref()
        .and_then(SlotLifecycleState::lookup);
    let expected_assignment = match (
        &representation.expected_binary,
        &representation.expected_config,
    ) {
        (Some(binary), Some(config)) => {
            Some(airship_core::Assignment::new(binary.clone(), config.clone())?)
        }
        _ => None,
    };
    SlotStatus::with_expected_state(
        representation.id,
        representation.self_uri.clone(),
        representation.external_uri.clone(),
        representation.instance_id.clone(),
        representation.location.clone(),
        state,
        assignment,
        representation.install_path.clone(),
        representation.resources.clone(),
        expected_state,
        expected_assignment,
        representation.status_message.clone(),
    )
}

/// Rebuild an AgentStatus from its wire form
pub fn agent_status_from_representation(
    representation: &AgentStatusRepresentation,
) -> AirshipResult<AgentStatus> {
    let state = AgentLifecycleState::lookup(&representation.state).ok_or_else(|| {
        AirshipError::invalid_spec(format!("unknown agent state {}", representation.state))
    })?;
    let slots = representation
        .slots
        .iter()
        .map(slot_status_from_representation)
        .collect::<AirshipResult<Vec<_>>>()?;
    AgentStatus::new(
        representation.agent_id.clone(),
        state,
        representation.instance_id.clone(),
        representation.internal_uri.clone(),
        representation.external_uri.clone(),
        representation.location.clone(),
        representation.instance_type.clone(),
        slots,
        representation.resources.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use airship_core::SlotRepresentationFactory;
    use std::collections::BTreeMap;

    #[test]
    fn test_slot_status_round_trips_through_representation() {
        let status = SlotStatus::new(
            Uuid::new_v4(),
            Some("http://10.0.0.1:9999/v1/slot/1".to_string()),
            None,
            Some("i-1".to_string()),
            "/east/a/apple1",
            SlotLifecycleState::Running,
            Some(airship_core::Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap()),
            Some("/var/airship/slots/1".to_string()),
            BTreeMap::from([("cpu".to_string(), 1)]),
        )
        .unwrap();

        let representation = SlotRepresentationFactory::default().create(&status);
        let back = slot_status_from_representation(&representation).unwrap();
        assert_eq!(back, status);
        assert_eq!(back.version, status.version);
    }

    #[test]
    fn test_unknown_state_rejected() {
        let status = SlotStatus::new(
            Uuid::new_v4(),
            None,
            None,
            None,
            "/east/a/apple1",
            SlotLifecycleState::Unknown,
            None,
            None,
            BTreeMap::new(),
        )
        .unwrap();
        let mut representation = SlotRepresentationFactory::default().create(&status);
        representation.status = "NOT_A_STATE".to_string();
        assert!(slot_status_from_representation(&representation).is_err());
    }
}
