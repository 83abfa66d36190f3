//! Sequential workflow orchestrator.
//!
//! Plans a request, then runs each step in order. Facts extracted from a
//! step's output are kept in a flat key/value context and substituted into
//! later instructions wherever they reference `{{key}}`. A failing step ends
//! the workflow; the steps already run are still reported.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use mailwise_core::config::LlmConfig;
use mailwise_core::{MailwiseError, MailwiseResult};
use mailwise_management::ManagementStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::handlers::HandlerRegistry;
use crate::llm::{ChatRequest, LanguageModel, LlmResponse, Message};
use crate::planner::{extract_json_object, AgentKind, HistoryMessage, PlanStep, Planner};
use crate::tools::MarketingTools;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub message: String,
    pub user_id: String,
    #[serde(default)]
    pub conversation_history: Vec<HistoryMessage>,
    #[serde(default)]
    pub stream: bool,
}

impl AgentRequest {
    pub fn validate(&self) -> MailwiseResult<()> {
        if self.message.trim().is_empty() {
            return Err(MailwiseError::Validation("message must not be empty".into()));
        }
        if self.user_id.trim().is_empty() {
            return Err(MailwiseError::Validation("userId must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub response: String,
    pub workflow: Vec<String>,
    pub reasoning: String,
}

/// Progress notifications, serialized as `{"type": ..., ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Plan {
        reasoning: String,
        steps: Vec<PlanStep>,
    },
    StepStart {
        step: usize,
        agent: AgentKind,
        instruction: String,
    },
    StepComplete {
        step: usize,
        agent: AgentKind,
        output: String,
    },
    StepError {
        step: usize,
        agent: AgentKind,
        error: String,
    },
    Complete {
        response: String,
        workflow: Vec<String>,
        reasoning: String,
    },
    /// The workflow could not start, e.g. no usable plan.
    Error { message: String },
}

pub struct WorkflowOrchestrator {
    model: Arc<dyn LanguageModel>,
    planner: Planner,
    handlers: HandlerRegistry,
}

impl WorkflowOrchestrator {
    pub fn new(model: Arc<dyn LanguageModel>, handlers: HandlerRegistry, config: &LlmConfig) -> Self {
        Self {
            planner: Planner::new(model.clone(), config.plan_retries),
            model,
            handlers,
        }
    }

    /// Orchestrator whose agents all run tool loops over `management`.
    pub fn with_tool_agents(
        model: Arc<dyn LanguageModel>,
        management: Arc<ManagementStore>,
        config: &LlmConfig,
    ) -> Self {
        let handlers = HandlerRegistry::with_tool_agents(
            model.clone(),
            MarketingTools::new(management),
            config.tool_iteration_limit(),
        );
        Self::new(model, handlers, config)
    }

    /// Run a request end to end. Only planning failures are errors; a failed
    /// step yields an outcome holding the partial log.
    pub async fn run(
        &self,
        request: &AgentRequest,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<WorkflowOutcome> {
        request.validate()?;
        let started = Instant::now();
        let plan = self
            .planner
            .plan(&request.message, &request.conversation_history)
            .await?;
        info!(
            user_id = %request.user_id,
            steps = plan.steps.len(),
            agents = ?plan.steps.iter().map(|s| s.agent.as_str()).collect::<Vec<_>>(),
            "Workflow planned"
        );
        emit(
            events,
            WorkflowEvent::Plan {
                reasoning: plan.reasoning.clone(),
                steps: plan.steps.clone(),
            },
        )
        .await;

        let mut context: HashMap<String, String> = HashMap::new();
        let mut workflow = Vec::with_capacity(plan.steps.len());
        let mut response = String::new();

        for (index, step) in plan.steps.iter().enumerate() {
            let number = index + 1;
            let instruction = substitute(&step.instruction, &context);
            emit(
                events,
                WorkflowEvent::StepStart {
                    step: number,
                    agent: step.agent,
                    instruction: instruction.clone(),
                },
            )
            .await;

            let result = match self.handlers.get(step.agent) {
                Ok(handler) => handler.run(&request.user_id, &instruction).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(output) => {
                    metrics::counter!("agent.steps.completed").increment(1);
                    workflow.push(format!("{}: {}", step.agent, summarize(&output)));
                    emit(
                        events,
                        WorkflowEvent::StepComplete {
                            step: number,
                            agent: step.agent,
                            output: output.clone(),
                        },
                    )
                    .await;

                    // Nothing consumes context after the final step.
                    if number < plan.steps.len() {
                        context.extend(self.extract_context(&output).await);
                    }
                    context.insert(format!("step{number}_output"), output.clone());
                    response = output;
                }
                Err(e) => {
                    metrics::counter!("agent.steps.failed").increment(1);
                    warn!(step = number, agent = %step.agent, error = %e, "Workflow step failed");
                    workflow.push(format!("{}: failed: {}", step.agent, e));
                    emit(
                        events,
                        WorkflowEvent::StepError {
                            step: number,
                            agent: step.agent,
                            error: e.to_string(),
                        },
                    )
                    .await;
                    response = format!("Step {number} ({}) failed: {e}", step.agent);
                    break;
                }
            }
        }

        metrics::histogram!("agent.workflow.duration_seconds")
            .record(started.elapsed().as_secs_f64());
        let outcome = WorkflowOutcome {
            response,
            workflow,
            reasoning: plan.reasoning,
        };
        emit(
            events,
            WorkflowEvent::Complete {
                response: outcome.response.clone(),
                workflow: outcome.workflow.clone(),
                reasoning: outcome.reasoning.clone(),
            },
        )
        .await;
        Ok(outcome)
    }

    /// Ask the model for a flat JSON object of facts in `output`. Any
    /// failure yields an empty map.
    async fn extract_context(&self, output: &str) -> HashMap<String, String> {
        let request = ChatRequest {
            messages: vec![
                Message::system(
                    "Extract the identifiers and key facts from the text below as a single \
                     flat JSON object with camelCase keys and string or number values, \
                     for example {\"segmentId\": \"...\", \"customerCount\": 42}. \
                     Reply with the JSON object only.",
                ),
                Message::user(output),
            ],
            temperature: Some(0.0),
            ..Default::default()
        };

        let text = match self.model.chat(&request).await {
            Ok(LlmResponse::Text(text)) => text,
            Ok(LlmResponse::ToolCalls(_)) => {
                warn!("Context extraction returned tool calls, ignoring");
                return HashMap::new();
            }
            Err(e) => {
                warn!(error = %e, "Context extraction failed");
                return HashMap::new();
            }
        };
        match parse_flat_object(&text) {
            Some(map) => {
                debug!(keys = ?map.keys().collect::<Vec<_>>(), "Context extracted");
                map
            }
            None => {
                warn!("Context extraction returned no JSON object");
                HashMap::new()
            }
        }
    }
}

async fn emit(events: Option<&mpsc::Sender<WorkflowEvent>>, event: WorkflowEvent) {
    if let Some(tx) = events {
        if tx.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }
}

fn parse_flat_object(text: &str) -> Option<HashMap<String, String>> {
    let block = extract_json_object(text)?;
    let object: serde_json::Map<String, Value> = serde_json::from_str(block).ok()?;
    Some(
        object
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                Value::Number(n) => Some((key, n.to_string())),
                Value::Bool(b) => Some((key, b.to_string())),
                _ => None,
            })
            .collect(),
    )
}

/// Replace `{{key}}` with its context value. Unknown keys stay verbatim.
pub fn substitute(template: &str, context: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let key = after[..close].trim();
                match context.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[open..open + 2 + close + 2]),
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn summarize(output: &str) -> String {
    const MAX_CHARS: usize = 200;
    let line = output.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() > MAX_CHARS {
        let cut: String = line.chars().take(MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}
