//! Commander - uniform command surface over a local or remote coordinator
//!
//! The CLI speaks to a Commander; whether commands execute in-process
//! against a Coordinator built from a config file, or remotely against a
//! coordinator's HTTP API, the same filters select the same subsets.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use airship_core::{
    AgentRepresentationFactory, AgentStatusRepresentation, AirshipError, AirshipResult,
    AssignmentRepresentation, CoordinatorStatusRepresentation, SlotLifecycleState,
    SlotRepresentationFactory, SlotStatusRepresentation, UpgradeVersions,
    AIRSHIP_AGENTS_VERSION_HEADER, AIRSHIP_FORCE_HEADER, AIRSHIP_SLOTS_VERSION_HEADER,
};
use airship_coordinator::api::SlotCommandResponse;
use airship_coordinator::{
    AgentFilterBuilder, Coordinator, CoordinatorConfig, FileStateManager,
    HttpRemoteAgentFactory, InMemoryStateManager, SlotFilterBuilder, StateManager,
    StaticProvisioner,
};
use airship_coordinator::provision::ProvisioningRequest;
use airship_repo::{
    HttpConfigEntryReader, HttpRepository, MavenRepository, Repository, RepositorySet,
};

use crate::cli::Cli;

/// Uniform command surface for the CLI verbs
#[async_trait]
pub trait Commander: Send + Sync {
    /// Matching slots plus the composite version of that selection
    async fn show_slots(
        &self,
        filter: &SlotFilterBuilder,
    ) -> AirshipResult<(Vec<SlotStatusRepresentation>, Option<String>)>;

    async fn install(
        &self,
        filter: &AgentFilterBuilder,
        count: usize,
        assignment: AssignmentRepresentation,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse>;

    async fn upgrade(
        &self,
        filter: &SlotFilterBuilder,
        versions: &UpgradeVersions,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse>;

    async fn set_state(
        &self,
        filter: &SlotFilterBuilder,
        state: SlotLifecycleState,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse>;

    async fn terminate(
        &self,
        filter: &SlotFilterBuilder,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse>;

    async fn reset_expected_state(
        &self,
        filter: &SlotFilterBuilder,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse>;

    async fn show_agents(
        &self,
        filter: &AgentFilterBuilder,
    ) -> AirshipResult<Vec<AgentStatusRepresentation>>;

    async fn provision_agents(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<AgentStatusRepresentation>>;

    async fn terminate_agent(
        &self,
        agent_id: &str,
    ) -> AirshipResult<Option<AgentStatusRepresentation>>;

    async fn show_coordinators(&self) -> AirshipResult<Vec<CoordinatorStatusRepresentation>>;

    async fn provision_coordinators(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<CoordinatorStatusRepresentation>>;
}

/// Pick the commander implied by the global flags
pub async fn create(cli: &Cli) -> Result<Box<dyn Commander>> {
    if let Some(coordinator_uri) = &cli.coordinator {
        return Ok(Box::new(HttpCommander::new(coordinator_uri.clone())));
    }
    if let Some(config_path) = &cli.config_file {
        let config = CoordinatorConfig::from_file(config_path)
            .with_context(|| format!("failed to load coordinator config {config_path}"))?;
        let coordinator = build_coordinator(&config).await?;
        // one refresh pass so commands see the current fleet
        coordinator.update_all_coordinators().await?;
        coordinator.update_all_agents().await?;
        return Ok(Box::new(LocalCommander::new(coordinator)));
    }
    bail!("either --coordinator <url> or --config <file> is required");
}

/// Assemble a Coordinator from its config
pub async fn build_coordinator(config: &CoordinatorConfig) -> Result<Arc<Coordinator>> {
    config.validate()?;

    let mut repositories: Vec<Arc<dyn Repository>> = Vec::new();
    if let Some(maven) = &config.repositories.maven {
        repositories.push(Arc::new(MavenRepository::new(
            maven.default_group_ids.clone(),
            maven.bases.clone(),
        )));
    }
    if let Some(http) = &config.repositories.http {
        repositories.push(Arc::new(HttpRepository::new(
            http.bases.clone(),
            http.config_short_name_pattern.as_deref(),
            http.config_version_pattern.as_deref(),
            http.binary_version_pattern.as_deref(),
        )?));
    }
    let repository: Arc<dyn Repository> = Arc::new(RepositorySet::new(repositories));
    let entry_reader = Arc::new(HttpConfigEntryReader::new(repository.clone()));

    let state_manager: Arc<dyn StateManager> = match &config.state_directory {
        Some(directory) => Arc::new(FileStateManager::new(directory)?),
        None => Arc::new(InMemoryStateManager::new()),
    };

    let provisioner = Arc::new(StaticProvisioner::new(
        config.provisioner.agents.clone(),
        config.provisioner.coordinators.clone(),
    ));

    let status = airship_core::CoordinatorStatus::new(
        Some(format!("coordinator-{}", config.environment)),
        airship_core::CoordinatorLifecycleState::Online,
        format!("local-{}", uuid::Uuid::new_v4().simple()),
        None,
        None,
        Some(format!("/{}/coordinator", config.environment)),
        None,
    )?;

    let coordinator = Arc::new(Coordinator::new(
        config.environment.clone(),
        status,
        repository,
        Some(entry_reader),
        provisioner,
        state_manager,
        Arc::new(HttpRemoteAgentFactory::new(Duration::from_secs(
            config.remote_timeout_secs,
        ))),
        config.allow_duplicate_installations_on_an_agent,
    ));
    Ok(coordinator)
}

// ----------------------------------------------------------------------
// Local (in-process) commander
// ----------------------------------------------------------------------

pub struct LocalCommander {
    coordinator: Arc<Coordinator>,
}

impl LocalCommander {
    pub fn new(coordinator: Arc<Coordinator>) -> LocalCommander {
        LocalCommander { coordinator }
    }

    async fn slot_predicate(
        &self,
        filter: &SlotFilterBuilder,
        filter_required: bool,
    ) -> AirshipResult<airship_coordinator::SlotPredicate> {
        let uuids = self.coordinator.slot_uuids().await;
        filter.build(filter_required, &uuids)
    }

    async fn agent_predicate(
        &self,
        filter: &AgentFilterBuilder,
        filter_required: bool,
    ) -> AirshipResult<airship_coordinator::AgentPredicate> {
        let agent_ids = self.coordinator.agent_ids().await;
        let slot_uuids = self.coordinator.slot_uuids().await;
        filter.build(filter_required, &agent_ids, &slot_uuids)
    }

    fn to_response(result: airship_coordinator::BulkResult) -> SlotCommandResponse {
        let factory = SlotRepresentationFactory::from_population(result.slots.iter());
        SlotCommandResponse {
            slots: result.slots.iter().map(|slot| factory.create(slot)).collect(),
            failures: result.failures,
        }
    }
}

#[async_trait]
impl Commander for LocalCommander {
    async fn show_slots(
        &self,
        filter: &SlotFilterBuilder,
    ) -> AirshipResult<(Vec<SlotStatusRepresentation>, Option<String>)> {
        let predicate = self.slot_predicate(filter, false).await?;
        let statuses = self.coordinator.all_slots_status(&predicate).await?;
        let version = airship_core::create_slots_version(statuses.iter());
        let factory = SlotRepresentationFactory::from_population(statuses.iter());
        Ok((
            statuses.iter().map(|slot| factory.create(slot)).collect(),
            Some(version),
        ))
    }

    async fn install(
        &self,
        filter: &AgentFilterBuilder,
        count: usize,
        assignment: AssignmentRepresentation,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let predicate = self.agent_predicate(filter, false).await?;
        let result = self
            .coordinator
            .install(&predicate, count, assignment.to_assignment()?, None, force)
            .await?;
        Ok(Self::to_response(result))
    }

    async fn upgrade(
        &self,
        filter: &SlotFilterBuilder,
        versions: &UpgradeVersions,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let predicate = self.slot_predicate(filter, true).await?;
        let result = self
            .coordinator
            .upgrade(&predicate, versions, None, force)
            .await?;
        Ok(Self::to_response(result))
    }

    async fn set_state(
        &self,
        filter: &SlotFilterBuilder,
        state: SlotLifecycleState,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let predicate = self.slot_predicate(filter, true).await?;
        let result = self
            .coordinator
            .set_state(state, &predicate, None, force)
            .await?;
        Ok(Self::to_response(result))
    }

    async fn terminate(
        &self,
        filter: &SlotFilterBuilder,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let predicate = self.slot_predicate(filter, true).await?;
        let result = self.coordinator.terminate(&predicate, None, force).await?;
        Ok(Self::to_response(result))
    }

    async fn reset_expected_state(
        &self,
        filter: &SlotFilterBuilder,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let predicate = self.slot_predicate(filter, true).await?;
        let result = self
            .coordinator
            .reset_expected_state(&predicate, None, force)
            .await?;
        Ok(Self::to_response(result))
    }

    async fn show_agents(
        &self,
        filter: &AgentFilterBuilder,
    ) -> AirshipResult<Vec<AgentStatusRepresentation>> {
        let predicate = self.agent_predicate(filter, false).await?;
        let statuses = self.coordinator.agents(&predicate).await;
        let factory = AgentRepresentationFactory::from_population(statuses.iter());
        Ok(statuses.iter().map(|agent| factory.create(agent)).collect())
    }

    async fn provision_agents(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<AgentStatusRepresentation>> {
        let statuses = self.coordinator.provision_agents(request).await?;
        let factory = AgentRepresentationFactory::from_population(statuses.iter());
        Ok(statuses.iter().map(|agent| factory.create(agent)).collect())
    }

    async fn terminate_agent(
        &self,
        agent_id: &str,
    ) -> AirshipResult<Option<AgentStatusRepresentation>> {
        Ok(self
            .coordinator
            .terminate_agent(agent_id)
            .await?
            .map(|status| AgentStatusRepresentation::from_agent_status(&status)))
    }

    async fn show_coordinators(&self) -> AirshipResult<Vec<CoordinatorStatusRepresentation>> {
        let statuses = self
            .coordinator
            .coordinators(&airship_coordinator::CoordinatorPredicate::match_all())
            .await;
        Ok(CoordinatorStatusRepresentation::from_population(
            statuses.iter(),
        ))
    }

    async fn provision_coordinators(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<CoordinatorStatusRepresentation>> {
        let statuses = self.coordinator.provision_coordinators(request).await?;
        Ok(CoordinatorStatusRepresentation::from_population(
            statuses.iter(),
        ))
    }
}

// ----------------------------------------------------------------------
// HTTP commander
// ----------------------------------------------------------------------

pub struct HttpCommander {
    base_uri: String,
    client: reqwest::Client,
}

impl HttpCommander {
    pub fn new(base_uri: String) -> HttpCommander {
        HttpCommander {
            base_uri: base_uri.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn uri(&self, path: &str) -> String {
        format!("{}{path}", self.base_uri)
    }

    /// Fetch the current composite version of the selection, to pass as
    /// the expected version on the following mutation
    async fn current_slots_version(
        &self,
        filter: &SlotFilterBuilder,
    ) -> AirshipResult<Option<String>> {
        let response = self
            .client
            .get(self.uri("/v1/slot"))
            .query(&filter.to_query())
            .send()
            .await
            .map_err(|e| AirshipError::RemoteUnreachable(e.to_string()))?;
        Ok(header_value(&response, AIRSHIP_SLOTS_VERSION_HEADER))
    }

    async fn slot_command(
        &self,
        request: reqwest::RequestBuilder,
        expected_version: Option<String>,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let mut request = request;
        if force {
            request = request.header(AIRSHIP_FORCE_HEADER, "true");
        } else if let Some(version) = expected_version {
            request = request.header(AIRSHIP_SLOTS_VERSION_HEADER, version);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AirshipError::RemoteUnreachable(e.to_string()))?;
        parse_response(response).await
    }
}

fn header_value(response: &reqwest::Response, header: &str) -> Option<String> {
    response
        .headers()
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Map an HTTP response onto the error taxonomy, keeping 409 distinct so
/// callers know a retry can succeed
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> AirshipResult<T> {
    let status = response.status();
    if status == reqwest::StatusCode::CONFLICT {
        let version = header_value(&response, AIRSHIP_SLOTS_VERSION_HEADER)
            .or_else(|| header_value(&response, AIRSHIP_AGENTS_VERSION_HEADER))
            .unwrap_or_default();
        return Err(AirshipError::VersionConflict {
            header: AIRSHIP_SLOTS_VERSION_HEADER,
            version,
        });
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AirshipError::RemoteUnreachable(format!(
            "coordinator answered HTTP {status}: {message}"
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| AirshipError::Serialization(e.to_string()))
}

#[async_trait]
impl Commander for HttpCommander {
    async fn show_slots(
        &self,
        filter: &SlotFilterBuilder,
    ) -> AirshipResult<(Vec<SlotStatusRepresentation>, Option<String>)> {
        let response = self
            .client
            .get(self.uri("/v1/slot"))
            .query(&filter.to_query())
            .send()
            .await
            .map_err(|e| AirshipError::RemoteUnreachable(e.to_string()))?;
        let version = header_value(&response, AIRSHIP_SLOTS_VERSION_HEADER);
        let slots: Vec<SlotStatusRepresentation> = parse_response(response).await?;
        Ok((slots, version))
    }

    async fn install(
        &self,
        filter: &AgentFilterBuilder,
        count: usize,
        assignment: AssignmentRepresentation,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let body = serde_json::json!({
            "assignment": assignment,
            "count": count,
        });
        let request = self
            .client
            .post(self.uri("/v1/slot/assignment"))
            .query(&filter.to_query())
            .json(&body);
        self.slot_command(request, None, force).await
    }

    async fn upgrade(
        &self,
        filter: &SlotFilterBuilder,
        versions: &UpgradeVersions,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let expected = if force {
            None
        } else {
            self.current_slots_version(filter).await?
        };
        let request = self
            .client
            .put(self.uri("/v1/slot/assignment"))
            .query(&filter.to_query())
            .json(versions);
        self.slot_command(request, expected, force).await
    }

    async fn set_state(
        &self,
        filter: &SlotFilterBuilder,
        state: SlotLifecycleState,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let expected = if force {
            None
        } else {
            self.current_slots_version(filter).await?
        };
        let request = self
            .client
            .put(self.uri("/v1/slot/lifecycle"))
            .query(&filter.to_query())
            .body(state.to_string().to_lowercase());
        self.slot_command(request, expected, force).await
    }

    async fn terminate(
        &self,
        filter: &SlotFilterBuilder,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let expected = if force {
            None
        } else {
            self.current_slots_version(filter).await?
        };
        let request = self
            .client
            .delete(self.uri("/v1/slot"))
            .query(&filter.to_query());
        self.slot_command(request, expected, force).await
    }

    async fn reset_expected_state(
        &self,
        filter: &SlotFilterBuilder,
        force: bool,
    ) -> AirshipResult<SlotCommandResponse> {
        let expected = if force {
            None
        } else {
            self.current_slots_version(filter).await?
        };
        let request = self
            .client
            .delete(self.uri("/v1/slot/expected-state"))
            .query(&filter.to_query());
        self.slot_command(request, expected, force).await
    }

    async fn show_agents(
        &self,
        filter: &AgentFilterBuilder,
    ) -> AirshipResult<Vec<AgentStatusRepresentation>> {
        let response = self
            .client
            .get(self.uri("/v1/agent"))
            .query(&filter.to_query())
            .send()
            .await
            .map_err(|e| AirshipError::RemoteUnreachable(e.to_string()))?;
        parse_response(response).await
    }

    async fn provision_agents(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<AgentStatusRepresentation>> {
        let response = self
            .client
            .post(self.uri("/v1/agent"))
            .json(request)
            .send()
            .await
            .map_err(|e| AirshipError::RemoteUnreachable(e.to_string()))?;
        parse_response(response).await
    }

    async fn terminate_agent(
        &self,
        agent_id: &str,
    ) -> AirshipResult<Option<AgentStatusRepresentation>> {
        let response = self
            .client
            .delete(self.uri(&format!("/v1/agent/{agent_id}")))
            .send()
            .await
            .map_err(|e| AirshipError::RemoteUnreachable(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(parse_response(response).await?))
    }

    async fn show_coordinators(&self) -> AirshipResult<Vec<CoordinatorStatusRepresentation>> {
        let response = self
            .client
            .get(self.uri("/v1/coordinator"))
            .send()
            .await
            .map_err(|e| AirshipError::RemoteUnreachable(e.to_string()))?;
        parse_response(response).await
    }

    async fn provision_coordinators(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<CoordinatorStatusRepresentation>> {
        let response = self
            .client
            .post(self.uri("/v1/coordinator"))
            .json(request)
            .send()
            .await
            .map_err(|e| AirshipError::RemoteUnreachable(e.to_string()))?;
        parse_response(response).await
    }
}
