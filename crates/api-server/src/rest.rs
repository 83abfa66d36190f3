//! REST handlers for customers, segments and operational endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mailwise_agents::WorkflowOrchestrator;
use mailwise_core::{Customer, NewCustomer};
use mailwise_management::{ApiResult, ManagementStore};
use mailwise_segmentation::{AudienceStore, Condition, CustomerStats, Segment, SegmentDraft, SegmentUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest batch the seed endpoint will generate in one call.
const MAX_SEED_COUNT: usize = 10_000;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub audience: Arc<AudienceStore>,
    pub management: Arc<ManagementStore>,
    /// Absent when no model API key is configured.
    pub orchestrator: Option<Arc<WorkflowOrchestrator>>,
    pub node_id: String,
    pub start_time: Instant,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub agents_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRequest {
    #[serde(default = "default_seed_count")]
    pub count: usize,
    #[serde(default)]
    pub seed: u64,
}

fn default_seed_count() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub conditions: Vec<Condition>,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: usize,
}

// ─── Operations ────────────────────────────────────────────────────────────

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        agents_enabled: state.orchestrator.is_some(),
    })
}

/// GET /ready
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

// ─── Customers ─────────────────────────────────────────────────────────────

pub async fn list_customers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<Customer>> {
    Json(state.audience.list_customers(&user_id))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = state.audience.insert_customer(&user_id, req)?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.audience.get_customer(&user_id, id)?))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<StatusCode> {
    state.audience.delete_customer(&user_id, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST .../customers/recompute: rescore every customer of the owner.
pub async fn recompute_scores(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<CountResponse> {
    Json(CountResponse {
        count: state.audience.recompute_scores(&user_id),
    })
}

/// POST .../customers/seed: generate demo customers.
pub async fn seed_customers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<SeedRequest>,
) -> ApiResult<(StatusCode, Json<CountResponse>)> {
    if req.count == 0 || req.count > MAX_SEED_COUNT {
        return Err(mailwise_core::MailwiseError::Validation(format!(
            "count must be between 1 and {MAX_SEED_COUNT}"
        ))
        .into());
    }
    let count = state.audience.seed_customers(&user_id, req.count, req.seed);
    Ok((StatusCode::CREATED, Json(CountResponse { count })))
}

pub async fn customer_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<CustomerStats> {
    Json(state.audience.customer_stats(&user_id))
}

// ─── Segments ──────────────────────────────────────────────────────────────

pub async fn list_segments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<Segment>> {
    Json(state.audience.list_segments(&user_id))
}

pub async fn create_segment(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(draft): Json<SegmentDraft>,
) -> ApiResult<(StatusCode, Json<Segment>)> {
    let segment = state.audience.create_segment(&user_id, draft)?;
    Ok((StatusCode::CREATED, Json(segment)))
}

pub async fn get_segment(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Segment>> {
    Ok(Json(state.audience.get_segment(&user_id, id)?))
}

pub async fn update_segment(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, Uuid)>,
    Json(update): Json<SegmentUpdate>,
) -> ApiResult<Json<Segment>> {
    Ok(Json(state.audience.update_segment(&user_id, id, update)?))
}

pub async fn delete_segment(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<StatusCode> {
    state.audience.delete_segment(&user_id, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn segment_customers(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.audience.customers_in_segment(&user_id, id)?))
}

pub async fn refresh_segment(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Segment>> {
    Ok(Json(state.audience.refresh_count(&user_id, id)?))
}

/// POST .../segments/preview: evaluate unsaved conditions.
pub async fn preview_segment(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.audience.preview_segment(&user_id, &req.conditions)?))
}
