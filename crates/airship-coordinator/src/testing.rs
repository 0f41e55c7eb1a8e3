//! In-process fakes for tests and local experimentation
//!
//! MockRemoteSlot implements the real slot lifecycle rules - assignment
//! before start, idempotent start/stop, restart as stop-then-start,
//! terminal TERMINATED - so coordinator behavior can be exercised
//! without agent processes or a network.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use airship_core::{
    AgentLifecycleState, AgentStatus, AirshipError, AirshipResult, Assignment, Installation,
    SlotLifecycleState, SlotStatus,
};

use crate::provision::Instance;
use crate::remote::{RemoteAgent, RemoteAgentFactory, RemoteSlot};

struct MockAgentInner {
    status: AgentStatus,
    slots: Vec<Arc<MockRemoteSlot>>,
}

/// In-process RemoteAgent
pub struct MockRemoteAgent {
    inner: Arc<Mutex<MockAgentInner>>,
}

impl MockRemoteAgent {
    pub fn new(agent_id: &str, instance: &Instance, state: AgentLifecycleState) -> MockRemoteAgent {
        Self::with_resources(agent_id, instance, state, BTreeMap::new())
    }

    pub fn with_resources(
        agent_id: &str,
        instance: &Instance,
        state: AgentLifecycleState,
        resources: BTreeMap<String, i64>,
    ) -> MockRemoteAgent {
        let status = AgentStatus::new(
            Some(agent_id.to_string()),
            state,
            instance.instance_id.clone(),
            instance.internal_uri.clone(),
            instance.external_uri.clone(),
            instance.location.clone(),
            instance.instance_type.clone(),
            [],
            resources,
        )
        .expect("mock agent status is well formed");
        MockRemoteAgent {
            inner: Arc::new(Mutex::new(MockAgentInner {
                status,
                slots: Vec::new(),
            })),
        }
    }

    /// Concrete slot handles, for failure injection in tests
    pub fn mock_slots(&self) -> Vec<Arc<MockRemoteSlot>> {
        self.inner.lock().slots.clone()
    }

    fn refresh_status(inner: &mut MockAgentInner) {
        let slot_statuses: Vec<SlotStatus> =
            inner.slots.iter().map(|slot| slot.status()).collect();
        let previous = &inner.status;
        inner.status = AgentStatus::new(
            previous.agent_id.clone(),
            previous.state,
            previous.instance_id.clone(),
            previous.internal_uri.clone(),
            previous.external_uri.clone(),
            previous.location.clone(),
            previous.instance_type.clone(),
            slot_statuses,
            previous.resources.clone(),
        )
        .expect("mock agent status is well formed");
        // drop terminated slot proxies like a real agent would
        inner
            .slots
            .retain(|slot| slot.status().state != SlotLifecycleState::Terminated);
    }
}

#[async_trait]
impl RemoteAgent for MockRemoteAgent {
    fn status(&self) -> AgentStatus {
        self.inner.lock().status.clone()
    }

    fn set_internal_uri(&self, internal_uri: Option<String>) {
        let mut inner = self.inner.lock();
        if let Ok(next) = inner.status.change_internal_uri(internal_uri) {
            inner.status = next;
        }
    }

    fn set_external_uri(&self, external_uri: Option<String>) {
        let mut inner = self.inner.lock();
        inner.status.external_uri = external_uri;
    }

    async fn update_status(&self) -> AirshipResult<()> {
        let mut inner = self.inner.lock();
        Self::refresh_status(&mut inner);
        Ok(())
    }

    async fn install(&self, installation: &Installation) -> AirshipResult<SlotStatus> {
        let mut inner = self.inner.lock();
        if inner.status.state != AgentLifecycleState::Online {
            return Err(AirshipError::RemoteUnreachable(format!(
                "agent {} is not online",
                inner.status.instance_id
            )));
        }
        let slot_number = inner.slots.len() + 1;
        let location = format!(
            "{}/slot{slot_number}",
            inner.status.location.as_deref().unwrap_or("/mock")
        );
        let slot = Arc::new(MockRemoteSlot::installed(
            Uuid::new_v4(),
            &location,
            inner.status.instance_id.clone(),
            installation,
        ));
        let status = slot.status();
        inner.slots.push(slot);
        Self::refresh_status(&mut inner);
        Ok(status)
    }

    fn slots(&self) -> Vec<Arc<dyn RemoteSlot>> {
        self.inner
            .lock()
            .slots
            .iter()
            .map(|slot| slot.clone() as Arc<dyn RemoteSlot>)
            .collect()
    }
}

struct MockSlotInner {
    assignment: Option<Assignment>,
    state: SlotLifecycleState,
    resources: BTreeMap<String, i64>,
    fail_next: Option<AirshipError>,
}

/// In-process RemoteSlot implementing the slot lifecycle state machine
pub struct MockRemoteSlot {
    id: Uuid,
    location: String,
    instance_id: String,
    inner: Mutex<MockSlotInner>,
}

impl MockRemoteSlot {
    fn installed(
        id: Uuid,
        location: &str,
        instance_id: String,
        installation: &Installation,
    ) -> MockRemoteSlot {
        MockRemoteSlot {
            id,
            location: location.to_string(),
            instance_id,
            inner: Mutex::new(MockSlotInner {
                assignment: Some(installation.assignment.clone()),
                state: SlotLifecycleState::Stopped,
                resources: installation.resources.clone(),
                fail_next: None,
            }),
        }
    }

    /// Unassigned slot; lifecycle operations fail until assign()
    pub fn unassigned(id: Uuid, location: &str, instance_id: &str) -> MockRemoteSlot {
        MockRemoteSlot {
            id,
            location: location.to_string(),
            instance_id: instance_id.to_string(),
            inner: Mutex::new(MockSlotInner {
                assignment: None,
                state: SlotLifecycleState::Unknown,
                resources: BTreeMap::new(),
                fail_next: None,
            }),
        }
    }

    /// Make the next remote operation fail, as an unreachable agent would
    pub fn fail_next_operation(&self, error: AirshipError) {
        self.inner.lock().fail_next = Some(error);
    }

    fn build_status(&self, inner: &MockSlotInner) -> SlotStatus {
        SlotStatus::new(
            self.id,
            Some(format!("mock://{}{}", self.instance_id, self.location)),
            None,
            Some(self.instance_id.clone()),
            self.location.clone(),
            inner.state,
            inner.assignment.clone(),
            None,
            inner.resources.clone(),
        )
        .expect("mock slot status is well formed")
    }

    fn take_failure(inner: &mut MockSlotInner) -> AirshipResult<()> {
        match inner.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteSlot for MockRemoteSlot {
    fn id(&self) -> Uuid {
        self.id
    }

    fn status(&self) -> SlotStatus {
        let inner = self.inner.lock();
        self.build_status(&inner)
    }

    async fn assign(&self, installation: &Installation) -> AirshipResult<SlotStatus> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner)?;
        if inner.state == SlotLifecycleState::Terminated {
            return Err(AirshipError::IllegalStateTransition(format!(
                "slot {} has been terminated",
                self.id
            )));
        }
        // a running slot restarts on its new assignment
        let was_running = matches!(
            inner.state,
            SlotLifecycleState::Running | SlotLifecycleState::Restarting
        );
        inner.assignment = Some(installation.assignment.clone());
        inner.resources = installation.resources.clone();
        inner.state = if was_running {
            SlotLifecycleState::Running
        } else {
            SlotLifecycleState::Stopped
        };
        Ok(self.build_status(&inner))
    }

    async fn start(&self) -> AirshipResult<SlotStatus> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner)?;
        if inner.assignment.is_none() {
            return Err(AirshipError::IllegalStateTransition(format!(
                "cannot start slot {} before it is assigned",
                self.id
            )));
        }
        if inner.state == SlotLifecycleState::Terminated {
            return Err(AirshipError::IllegalStateTransition(format!(
                "slot {} has been terminated",
                self.id
            )));
        }
        inner.state = SlotLifecycleState::Running;
        Ok(self.build_status(&inner))
    }

    async fn stop(&self) -> AirshipResult<SlotStatus> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner)?;
        if inner.assignment.is_none() {
            return Err(AirshipError::IllegalStateTransition(format!(
                "cannot stop slot {} before it is assigned",
                self.id
            )));
        }
        if inner.state == SlotLifecycleState::Terminated {
            return Err(AirshipError::IllegalStateTransition(format!(
                "slot {} has been terminated",
                self.id
            )));
        }
        inner.state = SlotLifecycleState::Stopped;
        Ok(self.build_status(&inner))
    }

    async fn restart(&self) -> AirshipResult<SlotStatus> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner)?;
        if inner.assignment.is_none() {
            return Err(AirshipError::IllegalStateTransition(format!(
                "cannot restart slot {} before it is assigned",
                self.id
            )));
        }
        if inner.state == SlotLifecycleState::Terminated {
            return Err(AirshipError::IllegalStateTransition(format!(
                "slot {} has been terminated",
                self.id
            )));
        }
        // stop-then-start, atomic from the caller's perspective
        inner.state = SlotLifecycleState::Running;
        Ok(self.build_status(&inner))
    }

    async fn terminate(&self) -> AirshipResult<SlotStatus> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner)?;
        inner.state = SlotLifecycleState::Terminated;
        inner.assignment = None;
        inner.resources = BTreeMap::new();
        Ok(self.build_status(&inner))
    }
}

/// Factory handing out pre-registered mock agents
pub struct MockRemoteAgentFactory {
    agents: Mutex<BTreeMap<String, Arc<dyn RemoteAgent>>>,
}

impl MockRemoteAgentFactory {
    pub fn new() -> MockRemoteAgentFactory {
        MockRemoteAgentFactory {
            agents: Mutex::new(BTreeMap::new()),
        }
    }

    /// Pre-register the agent to hand out for an instance id
    pub fn register(&self, instance_id: &str, agent: Arc<dyn RemoteAgent>) {
        self.agents.lock().insert(instance_id.to_string(), agent);
    }
}

impl Default for MockRemoteAgentFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteAgentFactory for MockRemoteAgentFactory {
    fn create_remote_agent(
        &self,
        instance: &Instance,
        state: AgentLifecycleState,
    ) -> Arc<dyn RemoteAgent> {
        if let Some(agent) = self.agents.lock().get(&instance.instance_id) {
            return agent.clone();
        }
        Arc::new(MockRemoteAgent::new(
            &format!("agent-{}", instance.instance_id),
            instance,
            state,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installation() -> Installation {
        Installation::new(
            "apple",
            Assignment::new("food.fruit:apple:1.0", "@prod:apple:1.0").unwrap(),
            "http://repo/apple-1.0.tar.gz",
            "http://repo/apple-1.0.config",
            BTreeMap::new(),
        )
    }

    #[tokio::test]
    async fn test_lifecycle_sequence() {
        let slot = MockRemoteSlot::unassigned(Uuid::new_v4(), "/mock/slot1", "i-1");

        let assigned = slot.assign(&installation()).await.unwrap();
        assert_eq!(assigned.state, SlotLifecycleState::Stopped);

        // assign -> start -> start -> stop -> stop -> restart -> restart
        let expected = [
            SlotLifecycleState::Running,
            SlotLifecycleState::Running,
            SlotLifecycleState::Stopped,
            SlotLifecycleState::Stopped,
            SlotLifecycleState::Running,
            SlotLifecycleState::Running,
        ];
        let mut observed = Vec::new();
        observed.push(slot.start().await.unwrap().state);
        observed.push(slot.start().await.unwrap().state);
        observed.push(slot.stop().await.unwrap().state);
        observed.push(slot.stop().await.unwrap().state);
        observed.push(slot.restart().await.unwrap().state);
        observed.push(slot.restart().await.unwrap().state);
        assert_eq!(observed, expected);
    }

    #[tokio::test]
    async fn test_idempotent_start_preserves_identity() {
        let slot = MockRemoteSlot::unassigned(Uuid::new_v4(), "/mock/slot1", "i-1");
        slot.assign(&installation()).await.unwrap();

        let first = slot.start().await.unwrap();
        let second = slot.start().await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.assignment, second.assignment);
        assert_eq!(first.location, second.location);
        assert_eq!(first.version, second.version);
    }

    #[tokio::test]
    async fn test_start_before_assign_fails() {
        let slot = MockRemoteSlot::unassigned(Uuid::new_v4(), "/mock/slot1", "i-1");
        let err = slot.start().await.unwrap_err();
        assert!(matches!(err, AirshipError::IllegalStateTransition(_)));
    }

    #[tokio::test]
    async fn test_assign_while_running_keeps_running() {
        let slot = MockRemoteSlot::unassigned(Uuid::new_v4(), "/mock/slot1", "i-1");
        slot.assign(&installation()).await.unwrap();
        slot.start().await.unwrap();

        let upgraded = Installation::new(
            "apple",
            Assignment::new("food.fruit:apple:2.0", "@prod:apple:2.0").unwrap(),
            "http://repo/apple-2.0.tar.gz",
            "http://repo/apple-2.0.config",
            BTreeMap::new(),
        );
        let status = slot.assign(&upgraded).await.unwrap();
        assert_eq!(status.state, SlotLifecycleState::Running);
        assert_eq!(status.assignment, Some(upgraded.assignment.clone()));
    }

    #[tokio::test]
    async fn test_terminate_is_terminal() {
        let slot = MockRemoteSlot::unassigned(Uuid::new_v4(), "/mock/slot1", "i-1");
        slot.assign(&installation()).await.unwrap();
        let status = slot.terminate().await.unwrap();
        assert_eq!(status.state, SlotLifecycleState::Terminated);
        assert!(status.assignment.is_none());

        assert!(slot.start().await.is_err());
        assert!(slot.assign(&installation()).await.is_err());
    }

    #[tokio::test]
    async fn test_agent_install_creates_stopped_slot() {
        let instance = Instance::new(
            "i-1",
            None,
            Some("/east/a/i-1/agent".to_string()),
            Some("http://10.0.0.1:9999".to_string()),
            None,
        );
        let agent = MockRemoteAgent::new("agent-1", &instance, AgentLifecycleState::Online);
        let status = agent.install(&installation()).await.unwrap();
        assert_eq!(status.state, SlotLifecycleState::Stopped);
        assert_eq!(agent.slots().len(), 1);
        assert_eq!(agent.status().slots.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_agent_refuses_install() {
        let instance = Instance::new("i-1", None, None, None, None);
        let agent = MockRemoteAgent::new("agent-1", &instance, AgentLifecycleState::Offline);
        assert!(agent.install(&installation()).await.is_err());
    }
}
