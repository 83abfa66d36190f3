//! Agent step handlers.
//!
//! A handler takes one plan step's instruction and returns its text output.
//! The stock [`ToolLoopAgent`] runs a bounded function-calling loop against
//! the model with the toolset of its agent kind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::llm::{ChatRequest, LanguageModel, LlmResponse, Message, ToolCall};
use crate::planner::AgentKind;
use crate::tools::MarketingTools;

#[async_trait]
pub trait AgentHandler: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn run(&self, owner_id: &str, instruction: &str) -> Result<String>;
}

pub struct ToolLoopAgent {
    kind: AgentKind,
    model: Arc<dyn LanguageModel>,
    tools: MarketingTools,
    max_iterations: u32,
}

impl ToolLoopAgent {
    pub fn new(
        kind: AgentKind,
        model: Arc<dyn LanguageModel>,
        tools: MarketingTools,
        max_iterations: u32,
    ) -> Self {
        Self {
            kind,
            model,
            tools,
            max_iterations,
        }
    }

    fn system_prompt(&self) -> String {
        let role = match self.kind {
            AgentKind::Segment => {
                "You are the segmentation agent. Translate audience descriptions into \
                 segment conditions, preview them, and save the segment. Always report \
                 the segmentId and customer count in your answer."
            }
            AgentKind::Campaign => {
                "You are the campaign agent. Create email campaigns for the requested \
                 audience. Always report the campaignId and the target segmentId."
            }
            AgentKind::Flow => {
                "You are the automation agent. Design flows that start with exactly one \
                 trigger node, never loop back, and end in exit nodes. Validate before \
                 saving and report the flowId."
            }
            AgentKind::Analytics => {
                "You are the analytics agent. Answer questions about the customer base \
                 using the available data. Quote concrete numbers."
            }
            AgentKind::Content => {
                "You are the copywriting agent. Write concise email subject lines and body \
                 copy. Return the subject on the first line prefixed with `Subject:`."
            }
        };
        role.to_string()
    }

    fn run_tools(&self, owner_id: &str, calls: &[ToolCall]) -> Vec<Message> {
        calls
            .iter()
            .map(|call| {
                debug!(agent = %self.kind, tool = %call.name, id = %call.id, "Executing tool");
                match self.tools.execute(owner_id, &call.name, call.arguments.clone()) {
                    Ok(output) => Message::tool_result(call.id.clone(), output, false),
                    Err(e) => {
                        warn!(agent = %self.kind, tool = %call.name, error = %e, "Tool call failed");
                        metrics::counter!("agent.tools.failed").increment(1);
                        Message::tool_result(call.id.clone(), format!("Error: {e}"), true)
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl AgentHandler for ToolLoopAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn run(&self, owner_id: &str, instruction: &str) -> Result<String> {
        let tools = self.tools.definitions_for(self.kind);
        let mut messages = vec![
            Message::system(self.system_prompt()),
            Message::user(instruction),
        ];

        for iteration in 0..self.max_iterations {
            let request = ChatRequest {
                messages: messages.clone(),
                tools: tools.clone(),
                ..Default::default()
            };
            match self.model.chat(&request).await? {
                LlmResponse::Text(text) => {
                    info!(agent = %self.kind, iterations = iteration + 1, "Agent finished");
                    return Ok(text);
                }
                LlmResponse::ToolCalls(calls) => {
                    metrics::counter!("agent.tools.calls").increment(calls.len() as u64);
                    let results = self.run_tools(owner_id, &calls);
                    messages.push(Message::assistant_tool_calls(calls));
                    messages.extend(results);
                }
            }
        }

        Err(AgentError::MaxIterationsExceeded {
            agent: self.kind.to_string(),
            max_iterations: self.max_iterations,
        })
    }
}

/// Handlers keyed by the agent kind they serve.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<AgentKind, Arc<dyn AgentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`ToolLoopAgent`] per agent kind, sharing a model and toolset.
    pub fn with_tool_agents(
        model: Arc<dyn LanguageModel>,
        tools: MarketingTools,
        max_iterations: u32,
    ) -> Self {
        let mut registry = Self::new();
        for kind in AgentKind::ALL {
            registry.register(Arc::new(ToolLoopAgent::new(
                kind,
                model.clone(),
                tools.clone(),
                max_iterations,
            )));
        }
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn AgentHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: AgentKind) -> Result<Arc<dyn AgentHandler>> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AgentError::UnknownAgent {
                agent: kind.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::tools::{CREATE_SEGMENT, LIST_SEGMENTS};
    use mailwise_management::ManagementStore;
    use mailwise_segmentation::AudienceStore;
    use serde_json::json;

    fn setup() -> (Arc<ScriptedModel>, MarketingTools, Arc<AudienceStore>) {
        let audience = Arc::new(AudienceStore::new());
        audience.seed_customers("u1", 100, 3);
        let tools = MarketingTools::new(Arc::new(ManagementStore::new(audience.clone())));
        (Arc::new(ScriptedModel::new()), tools, audience)
    }

    fn call(id: &str, name: &str, arguments: serde_json::Value) -> LlmResponse {
        LlmResponse::ToolCalls(vec![ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }])
    }

    #[tokio::test]
    async fn test_tool_loop_runs_tools_then_answers() {
        let (model, tools, audience) = setup();
        model
            .push(call(
                "c1",
                CREATE_SEGMENT,
                json!({"name": "Big spenders", "conditions": [{"field": "totalSpent", "operator": ">", "value": 500}]}),
            ))
            .push_text("Created segment Big spenders.");

        let agent = ToolLoopAgent::new(AgentKind::Segment, model.clone(), tools, 10);
        let out = agent.run("u1", "find big spenders").await.unwrap();
        assert_eq!(out, "Created segment Big spenders.");
        assert_eq!(audience.list_segments("u1").len(), 1);

        let second = &model.requests()[1];
        let last = second.messages.last().unwrap();
        assert_eq!(last.tool_call_id.as_deref(), Some("c1"));
        assert!(!last.is_error);
    }

    #[tokio::test]
    async fn test_tool_errors_are_fed_back() {
        let (model, tools, _) = setup();
        model
            .push(call("c1", CREATE_SEGMENT, json!({"name": "", "conditions": []})))
            .push_text("Could not create the segment.");

        let agent = ToolLoopAgent::new(AgentKind::Segment, model.clone(), tools, 10);
        agent.run("u1", "make a segment").await.unwrap();
        let feedback = model.requests()[1].messages.last().cloned().unwrap();
        assert!(feedback.is_error);
        assert!(feedback.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let (model, tools, _) = setup();
        for i in 0..3 {
            model.push(call(&format!("c{i}"), LIST_SEGMENTS, json!({})));
        }
        let agent = ToolLoopAgent::new(AgentKind::Analytics, model.clone(), tools, 3);
        let err = agent.run("u1", "loop forever").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::MaxIterationsExceeded { max_iterations: 3, .. }
        ));
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let (model, tools, _) = setup();
        let registry = HandlerRegistry::with_tool_agents(model, tools, 10);
        assert_eq!(registry.get(AgentKind::Flow).unwrap().kind(), AgentKind::Flow);
        assert!(matches!(
            HandlerRegistry::new().get(AgentKind::Flow),
            Err(AgentError::UnknownAgent { .. })
        ));
    }
}
