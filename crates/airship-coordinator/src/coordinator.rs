//! The orchestration core
//!
//! The Coordinator owns the authoritative in-memory directory of agents,
//! slots, and peer coordinators. Reads snapshot the directory; mutating
//! commands serialize through a command lock so that predicate
//! evaluation, the optimistic version check, and the mutation fan-out of
//! one command are never interleaved with another command's mutations.
//! Within a command, per-agent remote calls run concurrently with
//! bounded parallelism and collect per-target failures instead of
//! aborting siblings.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use airship_core::{
    check_agents_version, check_slots_version, create_slots_version, AgentLifecycleState,
    AgentStatus, AirshipError,
    AirshipResult, Assignment, CoordinatorLifecycleState, CoordinatorStatus, ExpectedSlotStatus,
    Installation, SlotLifecycleState, SlotStatus, UpgradeVersions,
};
use airship_repo::{
    available_resources, resources_are_available, to_installation, upgrade_assignment,
    ConfigEntryReader, Repository,
};

use crate::filter::{AgentPredicate, CoordinatorPredicate, SlotPredicate};
use crate::provision::{Provisioner, ProvisioningRequest};
use crate::remote::{RemoteAgent, RemoteAgentFactory, RemoteSlot};
use crate::state::StateManager;

/// Upper bound on concurrent remote calls within one command
pub const MAX_PARALLEL_REMOTE_CALLS: usize = 10;

/// One target that failed during a bulk command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFailure {
    /// Slot UUID or agent instance id
    pub target: String,
    pub error: String,
}

/// Outcome of a bulk command: successes plus per-target failures
///
/// Zero matching targets is a successful empty result, so scripts can
/// compose filters without special-casing "nothing matched".
#[derive(Debug, Default)]
pub struct BulkResult {
    pub slots: Vec<SlotStatus>,
    pub failures: Vec<TargetFailure>,
}

pub struct Coordinator {
    environment: String,
    status: CoordinatorStatus,
    coordinators: RwLock<HashMap<String, CoordinatorStatus>>,
    agents: RwLock<HashMap<String, Arc<dyn RemoteAgent>>>,
    repository: Arc<dyn Repository>,
    entry_reader: Option<Arc<dyn ConfigEntryReader>>,
    provisioner: Arc<dyn Provisioner>,
    state_manager: Arc<dyn StateManager>,
    remote_agent_factory: Arc<dyn RemoteAgentFactory>,
    /// Serializes mutating commands: snapshot, version check, and fan-out
    /// happen as one critical section per command
    command_lock: Mutex<()>,
    allow_duplicate_installations: bool,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        environment: impl Into<String>,
        status: CoordinatorStatus,
        repository: Arc<dyn Repository>,
        entry_reader: Option<Arc<dyn ConfigEntryReader>>,
        provisioner: Arc<dyn Provisioner>,
        state_manager: Arc<dyn StateManager>,
        remote_agent_factory: Arc<dyn RemoteAgentFactory>,
        allow_duplicate_installations: bool,
    ) -> Coordinator {
        Coordinator {
            environment: environment.into(),
            status,
            coordinators: RwLock::new(HashMap::new()),
            agents: RwLock::new(HashMap::new()),
            repository,
            entry_reader,
            provisioner,
            state_manager,
            remote_agent_factory,
            command_lock: Mutex::new(()),
            allow_duplicate_installations,
        }
    }

    /// Start the periodic directory refresh
    pub fn start(self: &Arc<Self>, status_expiration: Duration) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(status_expiration);
            loop {
                interval.tick().await;
                if let Err(e) = coordinator.update_all_coordinators().await {
                    error!("failed to update coordinators: {e}");
                }
                if let Err(e) = coordinator.update_all_agents().await {
                    error!("failed to update agents: {e}");
                }
            }
        });
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn status(&self) -> &CoordinatorStatus {
        &self.status
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// All known coordinators (this one first), filtered
    pub async fn coordinators(&self, predicate: &CoordinatorPredicate) -> Vec<CoordinatorStatus> {
        let mut all = vec![self.status.clone()];
        all.extend(self.coordinators.read().await.values().cloned());
        all.retain(|c| predicate.matches(c));
        all
    }

    pub async fn coordinator_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.status.coordinator_id.iter().cloned().collect();
        ids.extend(
            self.coordinators
                .read()
                .await
                .values()
                .filter_map(|c| c.coordinator_id.clone()),
        );
        ids
    }

    /// Current agent statuses, filtered
    pub async fn agents(&self, predicate: &AgentPredicate) -> Vec<AgentStatus> {
        self.agents
            .read()
            .await
            .values()
            .map(|agent| agent.status())
            .filter(|status| predicate.matches(status))
            .collect()
    }

    pub async fn agent_by_id(&self, agent_id: &str) -> Option<AgentStatus> {
        self.agents
            .read()
            .await
            .values()
            .map(|agent| agent.status())
            .find(|status| status.agent_id.as_deref() == Some(agent_id))
    }

    /// Known agent ids, for short-id expansion
    pub async fn agent_ids(&self) -> Vec<String> {
        self.agents
            .read()
            .await
            .values()
            .filter_map(|agent| agent.status().agent_id)
            .collect()
    }

    /// Known slot UUIDs (actual and expected), for short-id expansion
    pub async fn slot_uuids(&self) -> Vec<Uuid> {
        let mut uuids: HashSet<Uuid> = self
            .all_remote_slots()
            .await
            .iter()
            .map(|slot| slot.id())
            .collect();
        if let Ok(expected) = self.state_manager.get_all_expected_states().await {
            uuids.extend(expected.iter().map(|e| e.id));
        }
        uuids.into_iter().collect()
    }

    /// Reconciled slot statuses matching the predicate
    pub async fn all_slots_status(
        &self,
        predicate: &SlotPredicate,
    ) -> AirshipResult<Vec<SlotStatus>> {
        let slots = self.all_remote_slots().await;
        self.reconcile(&slots, predicate).await
    }

    /// Composite version of the reconciled statuses matching the predicate
    pub async fn slots_version(&self, predicate: &SlotPredicate) -> AirshipResult<String> {
        let statuses = self.all_slots_status(predicate).await?;
        Ok(create_slots_version(statuses.iter()))
    }

    async fn all_remote_slots(&self) -> Vec<Arc<dyn RemoteSlot>> {
        self.agents
            .read()
            .await
            .values()
            .flat_map(|agent| agent.slots())
            .collect()
    }

    /// Merge actual statuses with the expected-state store
    ///
    /// A slot the agents report but the store does not know is
    /// "unexpected"; a slot the store expects but no agent reports is
    /// synthesized as UNKNOWN at location `/unknown`; divergence between
    /// the two sides is written into the status message.
    async fn reconcile(
        &self,
        slots: &[Arc<dyn RemoteSlot>],
        predicate: &SlotPredicate,
    ) -> AirshipResult<Vec<SlotStatus>> {
        let expected_states: BTreeMap<Uuid, ExpectedSlotStatus> = self
            .state_manager
            .get_all_expected_states()
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();
        let actual_states: BTreeMap<Uuid, SlotStatus> = slots
            .iter()
            .map(|slot| (slot.id(), slot.status()))
            .collect();

        let all_ids: HashSet<Uuid> = actual_states
            .keys()
            .chain(expected_states.keys())
            .copied()
            .collect();

        let mut statuses = Vec::new();
        for id in all_ids {
            let actual = actual_states.get(&id);
            let expected = expected_states.get(&id);

            let full_status = match (actual, expected) {
                (None, None) => continue,
                (None, Some(expected)) => {
                    // terminated slots age out of the store lazily
                    if expected.status == SlotLifecycleState::Terminated {
                        continue;
                    }
                    SlotStatus::with_expected_state(
                        id,
                        None,
                        None,
                        None,
                        "/unknown",
                        SlotLifecycleState::Unknown,
                        expected.assignment(),
                        None,
                        BTreeMap::new(),
                        Some(expected.status),
                        expected.assignment(),
                        Some(format!(
                            "Slot is missing; Expected slot to be {}",
                            expected.status
                        )),
                    )?
                }
                (Some(actual), None) => actual
                    .change_expected_state(None, None)?
                    .change_status_message(Some("Unexpected slot".to_string()))?,
                (Some(actual), Some(expected)) => {
                    let mut messages = Vec::new();
                    if actual.state != expected.status {
                        messages.push(format!("Expected state to be {}", expected.status));
                    }
                    if actual.assignment != expected.assignment() {
                        match expected.assignment() {
                            Some(assignment) => messages.push(format!(
                                "Expected assignment to be {} {}",
                                assignment.binary, assignment.config
                            )),
                            None => messages.push("Expected no assignment".to_string()),
                        }
                    }
                    let status = actual
                        .change_expected_state(Some(expected.status), expected.assignment())?;
                    if messages.is_empty() {
                        status
                    } else {
                        status.change_status_message(Some(messages.join("; ")))?
                    }
                }
            };

            if predicate.matches(&full_status) {
                statuses.push(full_status);
            }
        }

        // deterministic output order
        statuses.sort_by_key(|s| s.id);
        Ok(statuses)
    }

    // ------------------------------------------------------------------
    // Directory refresh
    // ------------------------------------------------------------------

    /// Reconcile the coordinator directory against the provisioner
    pub async fn update_all_coordinators(&self) -> AirshipResult<()> {
        let instances = self.provisioner.list_coordinators().await?;
        let mut coordinators = self.coordinators.write().await;

        let mut inventory_ids: HashSet<String> = HashSet::new();
        for instance in instances {
            if instance.instance_id == self.status.instance_id {
                // this server is managed by its own process
                continue;
            }
            inventory_ids.insert(instance.instance_id.clone());

            let state = if instance.internal_uri.is_some() {
                CoordinatorLifecycleState::Online
            } else {
                CoordinatorLifecycleState::Offline
            };
            let observed = CoordinatorStatus::new(
                Some(instance.instance_id.clone()),
                state,
                instance.instance_id.clone(),
                instance.internal_uri.clone(),
                instance.external_uri.clone(),
                instance.location.clone(),
                instance.instance_type.clone(),
            )?;

            match coordinators.get(&instance.instance_id) {
                None => {
                    coordinators.insert(instance.instance_id.clone(), observed);
                }
                Some(existing)
                    if existing.state == CoordinatorLifecycleState::Provisioning
                        && observed.state == CoordinatorLifecycleState::Online =>
                {
                    // the provisioned instance came up
                    coordinators.insert(instance.instance_id.clone(), observed);
                }
                Some(_) => {}
            }
        }

        // still-provisioning entries stay until the provisioner lists them
        for (instance_id, status) in coordinators.iter() {
            if status.state == CoordinatorLifecycleState::Provisioning {
                inventory_ids.insert(instance_id.clone());
            }
        }
        coordinators.retain(|instance_id, _| inventory_ids.contains(instance_id));
        Ok(())
    }

    /// Reconcile the agent directory against the provisioner and refresh
    /// every agent's cached status
    pub async fn update_all_agents(&self) -> AirshipResult<()> {
        let instances = self.provisioner.list_agents().await?;

        let refresh_targets: Vec<Arc<dyn RemoteAgent>> = {
            let mut agents = self.agents.write().await;

            let mut inventory_ids: HashSet<String> = HashSet::new();
            for instance in instances {
                inventory_ids.insert(instance.instance_id.clone());
                match agents.get(&instance.instance_id) {
                    Some(existing) => existing.set_internal_uri(instance.internal_uri.clone()),
                    None => {
                        let state = if instance.internal_uri.is_some() {
                            AgentLifecycleState::Online
                        } else {
                            AgentLifecycleState::Offline
                        };
                        let agent = self.remote_agent_factory.create_remote_agent(&instance, state);
                        agents.insert(instance.instance_id.clone(), agent);
                    }
                }
            }

            for (instance_id, agent) in agents.iter() {
                if agent.status().state == AgentLifecycleState::Provisioning {
                    inventory_ids.insert(instance_id.clone());
                }
            }
            agents.retain(|instance_id, _| inventory_ids.contains(instance_id));
            agents.values().cloned().collect()
        };

        // refresh outside the directory lock; a slow agent only delays itself
        stream::iter(refresh_targets)
            .for_each_concurrent(MAX_PARALLEL_REMOTE_CALLS, |agent| async move {
                if let Err(e) = agent.update_status().await {
                    debug!("agent status refresh failed: {e}");
                }
            })
            .await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Provisioning
    // ------------------------------------------------------------------

    pub async fn provision_agents(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<AgentStatus>> {
        let instances = self.provisioner.provision_agents(request).await?;
        let mut agents = self.agents.write().await;
        let mut statuses = Vec::new();
        for instance in instances {
            let agent = self
                .remote_agent_factory
                .create_remote_agent(&instance, AgentLifecycleState::Provisioning);
            statuses.push(agent.status());
            agents.insert(instance.instance_id.clone(), agent);
            info!("provisioning agent on instance {}", instance.instance_id);
        }
        Ok(statuses)
    }

    pub async fn provision_coordinators(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<CoordinatorStatus>> {
        let instances = self.provisioner.provision_coordinators(request).await?;
        let mut coordinators = self.coordinators.write().await;
        let mut statuses = Vec::new();
        for instance in instances {
            if instance.instance_id == self.status.instance_id {
                return Err(AirshipError::IllegalStateTransition(
                    "provisioner created a coordinator with the same instance id as this coordinator"
                        .to_string(),
                ));
            }
            let status = CoordinatorStatus::new(
                Some(instance.instance_id.clone()),
                CoordinatorLifecycleState::Provisioning,
                instance.instance_id.clone(),
                None,
                None,
                instance.location.clone(),
                instance.instance_type.clone(),
            )?;
            coordinators.insert(instance.instance_id.clone(), status.clone());
            statuses.push(status);
        }
        Ok(statuses)
    }

    /// Remove an agent from the fleet
    ///
    /// Refused while the agent still hosts slots; terminate those first.
    pub async fn terminate_agent(&self, agent_id: &str) -> AirshipResult<Option<AgentStatus>> {
        let _guard = self.command_lock.lock().await;

        let mut agents = self.agents.write().await;
        let Some(instance_id) = agents
            .iter()
            .find(|(_, agent)| agent.status().agent_id.as_deref() == Some(agent_id))
            .map(|(instance_id, _)| instance_id.clone())
        else {
            return Ok(None);
        };

        let Some(agent) = agents.remove(&instance_id) else {
            return Ok(None);
        };
        if !agent.slots().is_empty() {
            agents.insert(instance_id, agent);
            return Err(AirshipError::IllegalStateTransition(format!(
                "cannot terminate agent that has slots: {agent_id}"
            )));
        }
        drop(agents);

        self.provisioner.terminate_agents(&[instance_id]).await?;
        let status = agent.status().change_state(AgentLifecycleState::Terminated)?;
        info!("terminated agent {agent_id}");
        Ok(Some(status))
    }

    // ------------------------------------------------------------------
    // Bulk slot commands
    // ------------------------------------------------------------------

    /// Install the assignment into new slots on up to `count` agents
    ///
    /// Capacity is a pre-flight check against the snapshot: fewer
    /// eligible agents than requested fails the whole command before any
    /// mutation. Failures after pre-flight are collected per agent.
    pub async fn install(
        &self,
        predicate: &AgentPredicate,
        count: usize,
        assignment: Assignment,
        expected_agents_version: Option<&str>,
        force: bool,
    ) -> AirshipResult<BulkResult> {
        let installation = to_installation(
            self.repository.as_ref(),
            self.entry_reader.as_deref(),
            &assignment,
        )
        .await?;

        let _guard = self.command_lock.lock().await;

        let candidates: Vec<Arc<dyn RemoteAgent>> = self
            .agents
            .read()
            .await
            .values()
            .filter(|agent| predicate.matches(&agent.status()))
            .cloned()
            .collect();

        let candidate_statuses: Vec<AgentStatus> =
            candidates.iter().map(|agent| agent.status()).collect();
        check_agents_version(candidate_statuses.iter(), expected_agents_version, force)?;

        let mut eligible = Vec::new();
        for agent in candidates {
            if self.is_eligible(&agent, &installation).await {
                eligible.push(agent);
            }
        }

        if eligible.len() < count {
            return Err(AirshipError::InsufficientCapacity {
                requested: count,
                available: eligible.len(),
            });
        }

        // spread deployments instead of stacking one node
        eligible.shuffle(&mut rand::thread_rng());
        eligible.truncate(count);

        let installation = Arc::new(installation);
        let futures: Vec<_> = eligible
            .into_iter()
            .map(|agent: Arc<dyn RemoteAgent>| {
                let installation = Arc::clone(&installation);
                async move {
                    let instance_id = agent.status().instance_id;
                    (instance_id, agent.install(&installation).await)
                }
            })
            .collect();
        let results: Vec<(String, AirshipResult<SlotStatus>)> = stream::iter(futures)
            .buffer_unordered(MAX_PARALLEL_REMOTE_CALLS)
            .collect()
            .await;

        let mut bulk = BulkResult::default();
        for (instance_id, result) in results {
            match result {
                Ok(slot_status) => {
                    self.state_manager
                        .set_expected_state(ExpectedSlotStatus::new(
                            slot_status.id,
                            SlotLifecycleState::Stopped,
                            Some(installation.assignment.clone()),
                        ))
                        .await?;
                    bulk.slots.push(slot_status);
                }
                Err(e) => {
                    warn!("install on agent {instance_id} failed: {e}");
                    bulk.failures.push(TargetFailure {
                        target: instance_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(bulk)
    }

    async fn is_eligible(&self, agent: &Arc<dyn RemoteAgent>, installation: &Installation) -> bool {
        let status = agent.status();
        if status.state != AgentLifecycleState::Online {
            return false;
        }

        // normally only one instance of a binary+config per agent
        if !self.allow_duplicate_installations {
            for slot in status.slot_statuses() {
                if let Some(existing) = &slot.assignment {
                    if self
                        .repository
                        .binary_equals_ignore_version(
                            &installation.assignment.binary,
                            &existing.binary,
                        )
                        .await
                        && self
                            .repository
                            .config_equals_ignore_version(
                                &installation.assignment.config,
                                &existing.config,
                            )
                            .await
                    {
                        return false;
                    }
                }
            }
        }

        // agents without declared resources have unlimited resources
        if !status.resources.is_empty() {
            let available = available_resources(&status);
            if !resources_are_available(&available, &installation.resources) {
                return false;
            }
        }
        true
    }

    /// Upgrade matching slots in place
    ///
    /// Every matched slot must upgrade to the same assignment; divergent
    /// upgrade targets would mean the filter spans different logical
    /// artifacts, which is an ambiguity failure.
    pub async fn upgrade(
        &self,
        predicate: &SlotPredicate,
        versions: &UpgradeVersions,
        expected_version: Option<&str>,
        force: bool,
    ) -> AirshipResult<BulkResult> {
        let _guard = self.command_lock.lock().await;
        let targets = self
            .select_remote_slots(predicate, expected_version, force)
            .await?;

        let mut new_assignments: HashSet<Assignment> = HashSet::new();
        let mut slots_to_upgrade = Vec::new();
        for slot in targets {
            let status = slot.status();
            if matches!(
                status.state,
                SlotLifecycleState::Terminated | SlotLifecycleState::Unknown
            ) {
                continue;
            }
            let Some(assignment) = status.assignment else {
                continue;
            };
            let upgraded =
                upgrade_assignment(self.repository.as_ref(), versions, &assignment).await?;
            new_assignments.insert(upgraded);
            slots_to_upgrade.push(slot);
        }

        if new_assignments.is_empty() {
            return Ok(BulkResult::default());
        }
        if new_assignments.len() != 1 {
            return Err(AirshipError::AmbiguousResolution {
                kind: "upgrade",
                spec: format!("{versions:?}"),
                candidates: new_assignments.iter().map(|a| a.to_string()).collect(),
            });
        }
        let assignment = new_assignments.into_iter().next().expect("one assignment");

        let binary_uri = self
            .repository
            .binary_to_http_uri(&assignment.binary)
            .await?
            .ok_or_else(|| AirshipError::UnresolvableArtifact {
                kind: "binary",
                spec: assignment.binary.clone(),
            })?;
        let config_uri = self
            .repository
            .config_to_http_uri(&assignment.config)
            .await?
            .ok_or_else(|| AirshipError::UnresolvableArtifact {
                kind: "config",
                spec: assignment.config.clone(),
            })?;
        let short_name = self
            .repository
            .config_short_name(&assignment.config)
            .await
            .unwrap_or_else(|| assignment.config.clone());
        let installation = Arc::new(Installation::new(
            short_name,
            assignment,
            binary_uri,
            config_uri,
            BTreeMap::new(),
        ));

        self.apply_to_slots(slots_to_upgrade, move |slot| {
            let installation = Arc::clone(&installation);
            async move { slot.assign(&installation).await }
        })
        .await
    }

    /// Transition matching slots toward the requested lifecycle state
    pub async fn set_state(
        &self,
        state: SlotLifecycleState,
        predicate: &SlotPredicate,
        expected_version: Option<&str>,
        force: bool,
    ) -> AirshipResult<BulkResult> {
        if !matches!(
            state,
            SlotLifecycleState::Running | SlotLifecycleState::Restarting | SlotLifecycleState::Stopped
        ) {
            return Err(AirshipError::IllegalStateTransition(format!(
                "unsupported lifecycle state: {state}"
            )));
        }

        let _guard = self.command_lock.lock().await;
        let targets = self
            .select_remote_slots(predicate, expected_version, force)
            .await?;

        self.apply_to_slots(targets, move |slot| async move {
            match state {
                SlotLifecycleState::Running => slot.start().await,
                SlotLifecycleState::Restarting => slot.restart().await,
                SlotLifecycleState::Stopped => slot.stop().await,
                _ => unreachable!("validated above"),
            }
        })
        .await
    }

    /// Terminate matching slots and drop their expected state
    pub async fn terminate(
        &self,
        predicate: &SlotPredicate,
        expected_version: Option<&str>,
        force: bool,
    ) -> AirshipResult<BulkResult> {
        let _guard = self.command_lock.lock().await;
        let targets = self
            .select_remote_slots(predicate, expected_version, force)
            .await?;

        let result = self
            .apply_to_slots(targets, |slot| async move { slot.terminate().await })
            .await?;
        for slot_status in &result.slots {
            if slot_status.state == SlotLifecycleState::Terminated {
                self.state_manager.delete_expected_state(slot_status.id).await?;
            }
        }
        Ok(result)
    }

    /// Accept reality: copy each matching slot's actual state into its
    /// expected state, discarding any tracked divergence
    pub async fn reset_expected_state(
        &self,
        predicate: &SlotPredicate,
        expected_version: Option<&str>,
        force: bool,
    ) -> AirshipResult<BulkResult> {
        let _guard = self.command_lock.lock().await;

        let statuses = self.all_slots_status(predicate).await?;
        check_slots_version(statuses.iter(), expected_version, force)?;

        let mut bulk = BulkResult::default();
        for status in statuses {
            let outcome = if status.state == SlotLifecycleState::Unknown {
                self.state_manager.delete_expected_state(status.id).await
            } else {
                self.state_manager
                    .set_expected_state(ExpectedSlotStatus::new(
                        status.id,
                        status.state,
                        status.assignment.clone(),
                    ))
                    .await
            };
            match outcome {
                Ok(()) => bulk.slots.push(status),
                Err(e) => bulk.failures.push(TargetFailure {
                    target: status.id.to_string(),
                    error: e.to_string(),
                }),
            }
        }
        Ok(bulk)
    }

    /// Select remote slots matching the predicate and verify the caller's
    /// view of them is current
    async fn select_remote_slots(
        &self,
        predicate: &SlotPredicate,
        expected_version: Option<&str>,
        force: bool,
    ) -> AirshipResult<Vec<Arc<dyn RemoteSlot>>> {
        let targets: Vec<Arc<dyn RemoteSlot>> = self
            .all_remote_slots()
            .await
            .into_iter()
            .filter(|slot| predicate.matches(&slot.status()))
            .collect();

        // the version covers the reconciled view the caller saw,
        // including synthesized missing slots
        let reconciled = self.reconcile(&targets, predicate).await?;
        check_slots_version(reconciled.iter(), expected_version, force)?;

        Ok(targets)
    }

    /// Fan an operation out over slots with bounded concurrency,
    /// recording the expected state for each success
    async fn apply_to_slots<F, Fut>(
        &self,
        targets: Vec<Arc<dyn RemoteSlot>>,
        op: F,
    ) -> AirshipResult<BulkResult>
    where
        F: Fn(Arc<dyn RemoteSlot>) -> Fut + Send + Sync,
        Fut: std::future::Future<Output = AirshipResult<SlotStatus>> + Send,
    {
        let op = &op;
        let futures: Vec<_> = targets
            .into_iter()
            .map(|slot: Arc<dyn RemoteSlot>| async move {
                let id = slot.id();
                (id, op(slot).await)
            })
            .collect();
        let results: Vec<(Uuid, AirshipResult<SlotStatus>)> = stream::iter(futures)
            .buffer_unordered(MAX_PARALLEL_REMOTE_CALLS)
            .collect()
            .await;

        let mut bulk = BulkResult::default();
        for (id, result) in results {
            match result {
                Ok(slot_status) => {
                    let expected_state = match slot_status.state {
                        SlotLifecycleState::Running | SlotLifecycleState::Restarting => {
                            SlotLifecycleState::Running
                        }
                        SlotLifecycleState::Terminated => {
                            bulk.slots.push(slot_status);
                            continue;
                        }
                        _ => SlotLifecycleState::Stopped,
                    };
                    self.state_manager
                        .set_expected_state(ExpectedSlotStatus::new(
                            slot_status.id,
                            expected_state,
                            slot_status.assignment.clone(),
                        ))
                        .await?;
                    bulk.slots.push(slot_status);
                }
                Err(e) => {
                    warn!("slot command on {id} failed: {e}");
                    bulk.failures.push(TargetFailure {
                        target: id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(bulk)
    }
}
