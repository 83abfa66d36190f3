//! POST /api/agent: plan and run a multi-agent workflow.
//!
//! Answers with the final outcome as JSON, or with a server-sent event per
//! workflow event when the request sets `stream`.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use mailwise_agents::{AgentError, AgentRequest, WorkflowEvent};
use mailwise_management::ApiError;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{error, info};

use crate::rest::AppState;

/// Buffered workflow events per streaming request.
const EVENT_BUFFER: usize = 32;

pub async fn handle_agent(
    State(state): State<AppState>,
    Json(request): Json<AgentRequest>,
) -> Result<Response, ApiError> {
    request.validate()?;
    let orchestrator = state.orchestrator.clone().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "agent_unavailable",
            "no language model is configured",
        )
    })?;
    metrics::counter!("api.agent.requests").increment(1);
    info!(user_id = %request.user_id, stream = request.stream, "Agent request received");

    if !request.stream {
        let outcome = orchestrator
            .run(&request, None)
            .await
            .map_err(agent_error)?;
        return Ok(Json(outcome).into_response());
    }

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(async move {
        if let Err(e) = orchestrator.run(&request, Some(&tx)).await {
            error!(error = %e, "Streaming workflow failed");
            let _ = tx
                .send(WorkflowEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let event = Event::default().json_data(&event).unwrap_or_else(|e| {
            Event::default().data(json!({"type": "error", "message": e.to_string()}).to_string())
        });
        Ok::<_, Infallible>(event)
    });
    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Model failures surface as 502, domain failures keep their own status.
pub fn agent_error(err: AgentError) -> ApiError {
    match err {
        AgentError::Domain(e) => e.into(),
        AgentError::MissingApiKey => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "agent_unavailable",
            err.to_string(),
        ),
        AgentError::LlmRequestFailed { .. }
        | AgentError::LlmParseFailed { .. }
        | AgentError::PlanParse { .. }
        | AgentError::MaxIterationsExceeded { .. } => {
            error!(error = %err, "Language model failure");
            ApiError::new(StatusCode::BAD_GATEWAY, "llm_failed", err.to_string())
        }
        other => {
            error!(error = %other, "Agent request failed");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal processing error",
            )
        }
    }
}
