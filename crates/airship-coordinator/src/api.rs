//! Coordinator HTTP API
//!
//! Exposes the directory reads and bulk commands over HTTP. Selection
//! criteria travel as query parameters (the filter builders' query form),
//! optimistic-concurrency versions travel as headers, and a failed
//! version check answers 409 Conflict with the current version echoed in
//! the same header so the client can re-fetch and retry.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::debug;

use airship_core::{
    create_agents_version, AgentRepresentationFactory, AgentStatusRepresentation, AirshipError,
    AssignmentRepresentation, CoordinatorStatusRepresentation, SlotLifecycleState,
    SlotRepresentationFactory, SlotStatusRepresentation, UpgradeVersions,
    AIRSHIP_AGENTS_VERSION_HEADER, AIRSHIP_FORCE_HEADER, AIRSHIP_SLOTS_VERSION_HEADER,
};

use crate::coordinator::{BulkResult, Coordinator};
use crate::filter::{AgentFilterBuilder, CoordinatorFilterBuilder, SlotFilterBuilder};
use crate::provision::ProvisioningRequest;

/// Shared router state
#[derive(Clone)]
pub struct ApiState {
    coordinator: Arc<Coordinator>,
}

/// Build the coordinator API router
pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/v1/slot", get(list_slots).delete(terminate_slots))
        .route("/v1/slot/assignment", post(install).put(upgrade))
        .route("/v1/slot/lifecycle", put(set_lifecycle_state))
        .route("/v1/slot/expected-state", delete(reset_expected_state))
        .route("/v1/agent", get(list_agents).post(provision_agents))
        .route("/v1/agent/:agent_id", delete(terminate_agent))
        .route(
            "/v1/coordinator",
            get(list_coordinators).post(provision_coordinators),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(ApiState { coordinator })
}

/// Bulk command response: successes plus per-target failures
#[derive(Debug, Serialize, Deserialize)]
pub struct SlotCommandResponse {
    pub slots: Vec<SlotStatusRepresentation>,
    #[serde(default)]
    pub failures: Vec<crate::coordinator::TargetFailure>,
}

/// AirshipError rendered as an HTTP response
struct ApiError(AirshipError);

impl From<AirshipError> for ApiError {
    fn from(error: AirshipError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        debug!("request failed: {error}");
        match &error {
            AirshipError::VersionConflict { header, version } => {
                // echo the fresh version so the client can retry
                let mut response =
                    (StatusCode::CONFLICT, error.to_string()).into_response();
                if let Ok(value) = version.parse() {
                    response.headers_mut().insert(*header, value);
                }
                response
            }
            AirshipError::InvalidSpec(_)
            | AirshipError::UnresolvableArtifact { .. }
            | AirshipError::AmbiguousResolution { .. }
            | AirshipError::IllegalStateTransition(_) => {
                (StatusCode::BAD_REQUEST, error.to_string()).into_response()
            }
            AirshipError::InsufficientCapacity { .. } => {
                (StatusCode::CONFLICT, error.to_string()).into_response()
            }
            AirshipError::CommandTimeout { .. } | AirshipError::RemoteUnreachable(_) => {
                (StatusCode::BAD_GATEWAY, error.to_string()).into_response()
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response(),
        }
    }
}

fn force_requested(headers: &HeaderMap) -> bool {
    headers
        .get(AIRSHIP_FORCE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn expected_version(headers: &HeaderMap, header: &str) -> Option<String> {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn query_pairs(query: &[(String, String)]) -> impl Iterator<Item = (&str, &str)> {
    query.iter().map(|(k, v)| (k.as_str(), v.as_str()))
}

async fn slot_response(
    coordinator: &Coordinator,
    result: BulkResult,
) -> (HeaderMap, Json<SlotCommandResponse>) {
    let factory = SlotRepresentationFactory::from_population(result.slots.iter());
    let slots = result.slots.iter().map(|slot| factory.create(slot)).collect();

    let mut headers = HeaderMap::new();
    if let Ok(version) = coordinator
        .slots_version(&crate::filter::SlotPredicate::match_all())
        .await
    {
        if let Ok(value) = version.parse() {
            headers.insert(AIRSHIP_SLOTS_VERSION_HEADER, value);
        }
    }
    (
        headers,
        Json(SlotCommandResponse {
            slots,
            failures: result.failures,
        }),
    )
}

// ----------------------------------------------------------------------
// Slot routes
// ----------------------------------------------------------------------

async fn list_slots(
    State(state): State<ApiState>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let uuids = state.coordinator.slot_uuids().await;
    let predicate =
        SlotFilterBuilder::from_query(query_pairs(&query))?.build(false, &uuids)?;
    let statuses = state.coordinator.all_slots_status(&predicate).await?;

    let version = airship_core::create_slots_version(statuses.iter());
    let factory = SlotRepresentationFactory::from_population(statuses.iter());
    let slots: Vec<SlotStatusRepresentation> =
        statuses.iter().map(|slot| factory.create(slot)).collect();

    let mut headers = HeaderMap::new();
    if let Ok(value) = version.parse() {
        headers.insert(AIRSHIP_SLOTS_VERSION_HEADER, value);
    }
    Ok((headers, Json(slots)).into_response())
}

#[derive(Debug, Deserialize)]
struct InstallRequest {
    assignment: AssignmentRepresentation,
    #[serde(default = "default_install_count")]
    count: usize,
}

fn default_install_count() -> usize {
    1
}

async fn install(
    State(state): State<ApiState>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(request): Json<InstallRequest>,
) -> Result<Response, ApiError> {
    let agent_ids = state.coordinator.agent_ids().await;
    let slot_uuids = state.coordinator.slot_uuids().await;
    let predicate = AgentFilterBuilder::from_query(query_pairs(&query))?.build(
        false,
        &agent_ids,
        &slot_uuids,
    )?;

    let result = state
        .coordinator
        .install(
            &predicate,
            request.count,
            request.assignment.to_assignment()?,
            expected_version(&headers, AIRSHIP_AGENTS_VERSION_HEADER).as_deref(),
            force_requested(&headers),
        )
        .await?;
    let (headers, body) = slot_response(&state.coordinator, result).await;
    Ok((headers, body).into_response())
}

async fn upgrade(
    State(state): State<ApiState>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(versions): Json<UpgradeVersions>,
) -> Result<Response, ApiError> {
    let uuids = state.coordinator.slot_uuids().await;
    let predicate = SlotFilterBuilder::from_query(query_pairs(&query))?.build(true, &uuids)?;

    let result = state
        .coordinator
        .upgrade(
            &predicate,
            &versions,
            expected_version(&headers, AIRSHIP_SLOTS_VERSION_HEADER).as_deref(),
            force_requested(&headers),
        )
        .await?;
    let (headers, body) = slot_response(&state.coordinator, result).await;
    Ok((headers, body).into_response())
}

async fn set_lifecycle_state(
    State(state): State<ApiState>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    let target_state = SlotLifecycleState::lookup(body.trim()).ok_or_else(|| {
        AirshipError::invalid_spec(format!("unknown lifecycle state: {}", body.trim()))
    })?;

    let uuids = state.coordinator.slot_uuids().await;
    let predicate = SlotFilterBuilder::from_query(query_pairs(&query))?.build(true, &uuids)?;

    let result = state
        .coordinator
        .set_state(
            target_state,
            &predicate,
            expected_version(&headers, AIRSHIP_SLOTS_VERSION_HEADER).as_deref(),
            force_requested(&headers),
        )
        .await?;
    let (headers, body) = slot_response(&state.coordinator, result).await;
    Ok((headers, body).into_response())
}

async fn terminate_slots(
    State(state): State<ApiState>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let uuids = state.coordinator.slot_uuids().await;
    let predicate = SlotFilterBuilder::from_query(query_pairs(&query))?.build(true, &uuids)?;

    let result = state
        .coordinator
        .terminate(
            &predicate,
            expected_version(&headers, AIRSHIP_SLOTS_VERSION_HEADER).as_deref(),
            force_requested(&headers),
        )
        .await?;
    let (headers, body) = slot_response(&state.coordinator, result).await;
    Ok((headers, body).into_response())
}

async fn reset_expected_state(
    State(state): State<ApiState>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let uuids = state.coordinator.slot_uuids().await;
    let predicate = SlotFilterBuilder::from_query(query_pairs(&query))?.build(true, &uuids)?;

    let result = state
        .coordinator
        .reset_expected_state(
            &predicate,
            expected_version(&headers, AIRSHIP_SLOTS_VERSION_HEADER).as_deref(),
            force_requested(&headers),
        )
        .await?;
    let (headers, body) = slot_response(&state.coordinator, result).await;
    Ok((headers, body).into_response())
}

// ----------------------------------------------------------------------
// Agent routes
// ----------------------------------------------------------------------

async fn list_agents(
    State(state): State<ApiState>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let agent_ids = state.coordinator.agent_ids().await;
    let slot_uuids = state.coordinator.slot_uuids().await;
    let predicate = AgentFilterBuilder::from_query(query_pairs(&query))?.build(
        false,
        &agent_ids,
        &slot_uuids,
    )?;

    let statuses = state.coordinator.agents(&predicate).await;
    let version = create_agents_version(statuses.iter());
    let factory = AgentRepresentationFactory::from_population(statuses.iter());
    let agents: Vec<AgentStatusRepresentation> =
        statuses.iter().map(|agent| factory.create(agent)).collect();

    let mut headers = HeaderMap::new();
    if let Ok(value) = version.parse() {
        headers.insert(AIRSHIP_AGENTS_VERSION_HEADER, value);
    }
    Ok((headers, Json(agents)).into_response())
}

async fn provision_agents(
    State(state): State<ApiState>,
    Json(request): Json<ProvisioningRequest>,
) -> Result<Response, ApiError> {
    let statuses = state.coordinator.provision_agents(&request).await?;
    let factory = AgentRepresentationFactory::from_population(statuses.iter());
    let agents: Vec<AgentStatusRepresentation> =
        statuses.iter().map(|agent| factory.create(agent)).collect();
    Ok(Json(agents).into_response())
}

async fn terminate_agent(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
) -> Result<Response, ApiError> {
    match state.coordinator.terminate_agent(&agent_id).await? {
        Some(status) => Ok(Json(AgentStatusRepresentation::from_agent_status(&status))
            .into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

// ----------------------------------------------------------------------
// Coordinator routes
// ----------------------------------------------------------------------

async fn list_coordinators(
    State(state): State<ApiState>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let ids = state.coordinator.coordinator_ids().await;
    let predicate = CoordinatorFilterBuilder::from_query(query_pairs(&query))?.build(&ids)?;
    let statuses = state.coordinator.coordinators(&predicate).await;
    let coordinators = CoordinatorStatusRepresentation::from_population(statuses.iter());
    Ok(Json(coordinators).into_response())
}

async fn provision_coordinators(
    State(state): State<ApiState>,
    Json(request): Json<ProvisioningRequest>,
) -> Result<Response, ApiError> {
    let statuses = state.coordinator.provision_coordinators(&request).await?;
    let coordinators = CoordinatorStatusRepresentation::from_population(statuses.iter());
    Ok(Json(coordinators).into_response())
}
