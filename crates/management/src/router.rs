//! Management API router for campaigns and flows under /api/v1/users/:user_id.

use crate::handlers::{self, ManagementState};
use crate::store::ManagementStore;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Build the management router. Merge it into the main app.
pub fn management_router(store: Arc<ManagementStore>) -> Router {
    let state = ManagementState { store };

    Router::new()
        // Campaigns
        .route(
            "/api/v1/users/:user_id/campaigns",
            get(handlers::list_campaigns).post(handlers::create_campaign),
        )
        .route(
            "/api/v1/users/:user_id/campaigns/:id",
            get(handlers::get_campaign)
                .put(handlers::update_campaign)
                .delete(handlers::delete_campaign),
        )
        .route(
            "/api/v1/users/:user_id/campaigns/:id/schedule",
            post(handlers::schedule_campaign),
        )
        .route(
            "/api/v1/users/:user_id/campaigns/:id/send",
            post(handlers::send_campaign),
        )
        // Flows
        .route(
            "/api/v1/users/:user_id/flows",
            get(handlers::list_flows).post(handlers::create_flow),
        )
        .route(
            "/api/v1/users/:user_id/flows/validate",
            post(handlers::validate_flow_graph),
        )
        .route(
            "/api/v1/users/:user_id/flows/:id",
            get(handlers::get_flow)
                .put(handlers::update_flow)
                .delete(handlers::delete_flow),
        )
        .route(
            "/api/v1/users/:user_id/flows/:id/validate",
            post(handlers::validate_saved_flow),
        )
        .route(
            "/api/v1/users/:user_id/flows/:id/activate",
            post(handlers::activate_flow),
        )
        .route(
            "/api/v1/users/:user_id/flows/:id/pause",
            post(handlers::pause_flow),
        )
        .with_state(state)
}
