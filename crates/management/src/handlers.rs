//! Axum REST handlers for campaigns and flows.

use crate::error::ApiResult;
use crate::flows::{validate_flow, FlowValidation};
use crate::models::*;
use crate::store::ManagementStore;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Shared management state.
#[derive(Clone)]
pub struct ManagementState {
    pub store: Arc<ManagementStore>,
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

pub async fn list_campaigns(
    State(state): State<ManagementState>,
    Path(user_id): Path<String>,
) -> Json<Vec<Campaign>> {
    Json(state.store.list_campaigns(&user_id))
}

pub async fn get_campaign(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.store.get_campaign(&user_id, id)?))
}

pub async fn create_campaign(
    State(state): State<ManagementState>,
    Path(user_id): Path<String>,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let campaign = state.store.create_campaign(&user_id, req)?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn update_campaign(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
    Json(req): Json<UpdateCampaignRequest>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.store.update_campaign(&user_id, id, req)?))
}

pub async fn delete_campaign(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<StatusCode> {
    state.store.delete_campaign(&user_id, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn schedule_campaign(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
    Json(req): Json<ScheduleCampaignRequest>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.store.schedule_campaign(&user_id, id, req)?))
}

pub async fn send_campaign(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.store.send_campaign(&user_id, id)?))
}

// ─── Flows ─────────────────────────────────────────────────────────────────

pub async fn list_flows(
    State(state): State<ManagementState>,
    Path(user_id): Path<String>,
) -> Json<Vec<Flow>> {
    Json(state.store.list_flows(&user_id))
}

pub async fn get_flow(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Flow>> {
    Ok(Json(state.store.get_flow(&user_id, id)?))
}

pub async fn create_flow(
    State(state): State<ManagementState>,
    Path(user_id): Path<String>,
    Json(req): Json<CreateFlowRequest>,
) -> ApiResult<(StatusCode, Json<Flow>)> {
    let flow = state.store.create_flow(&user_id, req)?;
    Ok((StatusCode::CREATED, Json(flow)))
}

pub async fn update_flow(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
    Json(req): Json<UpdateFlowRequest>,
) -> ApiResult<Json<Flow>> {
    Ok(Json(state.store.update_flow(&user_id, id, req)?))
}

pub async fn delete_flow(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<StatusCode> {
    state.store.delete_flow(&user_id, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Validate a saved flow.
pub async fn validate_saved_flow(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<FlowValidation>> {
    Ok(Json(state.store.validate(&user_id, id)?))
}

pub async fn activate_flow(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Flow>> {
    Ok(Json(state.store.activate_flow(&user_id, id)?))
}

pub async fn pause_flow(
    State(state): State<ManagementState>,
    Path((user_id, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<Flow>> {
    Ok(Json(state.store.pause_flow(&user_id, id)?))
}

#[derive(Debug, Deserialize)]
pub struct ValidateFlowRequest {
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

/// Validate an unsaved graph, as the editor does before saving.
pub async fn validate_flow_graph(Json(req): Json<ValidateFlowRequest>) -> Json<FlowValidation> {
    Json(validate_flow(&req.nodes, &req.edges))
}
