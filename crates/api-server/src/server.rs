//! API server: REST routes, the agent endpoint, and the metrics exporter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use mailwise_agents::WorkflowOrchestrator;
use mailwise_core::config::AppConfig;
use mailwise_management::{management_router, ManagementStore};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent;
use crate::rest::{self, AppState};

pub struct ApiServer {
    config: AppConfig,
    management: Arc<ManagementStore>,
    orchestrator: Option<Arc<WorkflowOrchestrator>>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        management: Arc<ManagementStore>,
        orchestrator: Option<Arc<WorkflowOrchestrator>>,
    ) -> Self {
        Self {
            config,
            management,
            orchestrator,
        }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState {
            audience: self.management.audience().clone(),
            management: self.management.clone(),
            orchestrator: self.orchestrator.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };
        let app = build_router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, agents = self.orchestrator.is_some(), "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}

/// The full application router, without binding a listener.
pub fn build_router(state: AppState) -> Router {
    let users = "/api/v1/users/:user_id";
    let audience = Router::new()
        // Customers
        .route(
            &format!("{users}/customers"),
            get(rest::list_customers).post(rest::create_customer),
        )
        .route(&format!("{users}/customers/stats"), get(rest::customer_stats))
        .route(&format!("{users}/customers/recompute"), post(rest::recompute_scores))
        .route(&format!("{users}/customers/seed"), post(rest::seed_customers))
        .route(
            &format!("{users}/customers/:id"),
            get(rest::get_customer).delete(rest::delete_customer),
        )
        // Segments
        .route(
            &format!("{users}/segments"),
            get(rest::list_segments).post(rest::create_segment),
        )
        .route(&format!("{users}/segments/preview"), post(rest::preview_segment))
        .route(
            &format!("{users}/segments/:id"),
            get(rest::get_segment)
                .put(rest::update_segment)
                .delete(rest::delete_segment),
        )
        .route(
            &format!("{users}/segments/:id/customers"),
            get(rest::segment_customers),
        )
        .route(
            &format!("{users}/segments/:id/refresh"),
            post(rest::refresh_segment),
        )
        // Agents
        .route("/api/agent", post(agent::handle_agent))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .with_state(state.clone());

    audience
        .merge(management_router(state.management))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
