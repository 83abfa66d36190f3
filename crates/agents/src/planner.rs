//! Execution planner.
//!
//! Turns a natural-language request into an ordered list of agent steps.
//! The model is forced to answer through the `submit_plan` tool, whose
//! schema fixes the plan's shape; a plain-text answer is accepted only if
//! it contains a JSON object of the same shape.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{AgentError, Result};
use crate::llm::{ChatRequest, LanguageModel, LlmResponse, Message, ToolDefinition};

pub const SUBMIT_PLAN_TOOL: &str = "submit_plan";

/// The specialist agents a plan can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    #[serde(alias = "segmentation")]
    Segment,
    Campaign,
    Flow,
    Analytics,
    #[serde(alias = "copywriter")]
    Content,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Segment,
        AgentKind::Campaign,
        AgentKind::Flow,
        AgentKind::Analytics,
        AgentKind::Content,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Segment => "segment",
            AgentKind::Campaign => "campaign",
            AgentKind::Flow => "flow",
            AgentKind::Analytics => "analytics",
            AgentKind::Content => "content",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::Segment => "builds and previews customer segments from rule conditions",
            AgentKind::Campaign => "creates email campaigns targeting a segment",
            AgentKind::Flow => "designs multi-step automation flows triggered by a segment",
            AgentKind::Analytics => "answers questions about customers, RFM groups and churn risk",
            AgentKind::Content => "writes email subject lines and body copy",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    #[serde(default)]
    pub reasoning: String,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub agent: AgentKind,
    /// May reference earlier results as `{{key}}`.
    pub instruction: String,
}

/// A prior turn of the user's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

pub struct Planner {
    model: Arc<dyn LanguageModel>,
    retries: u32,
}

impl Planner {
    pub fn new(model: Arc<dyn LanguageModel>, retries: u32) -> Self {
        Self { model, retries }
    }

    /// Ask the model for a plan. An unparseable answer is re-requested up to
    /// `retries` times before giving up with [`AgentError::PlanParse`].
    pub async fn plan(&self, message: &str, history: &[HistoryMessage]) -> Result<ExecutionPlan> {
        let request = self.build_request(message, history);
        let attempts = self.retries + 1;
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            let response = self.model.chat(&request).await?;
            match parse_plan(&response) {
                Ok(plan) => {
                    debug!(attempt, steps = plan.steps.len(), "Plan accepted");
                    return Ok(plan);
                }
                Err(reason) => {
                    warn!(attempt, reason = %reason, "Model returned an unusable plan");
                    metrics::counter!("agent.plan.parse_failures").increment(1);
                    last_reason = reason;
                }
            }
        }

        Err(AgentError::PlanParse {
            attempts,
            reason: last_reason,
        })
    }

    fn build_request(&self, message: &str, history: &[HistoryMessage]) -> ChatRequest {
        let mut messages = vec![Message::system(system_prompt())];
        for turn in history {
            match turn.role.as_str() {
                "assistant" => messages.push(Message::assistant(turn.content.clone())),
                "user" => messages.push(Message::user(turn.content.clone())),
                _ => {}
            }
        }
        messages.push(Message::user(message));

        ChatRequest {
            messages,
            tools: vec![plan_tool()],
            forced_tool: Some(SUBMIT_PLAN_TOOL.to_string()),
            temperature: Some(0.0),
            ..Default::default()
        }
    }
}

fn system_prompt() -> String {
    let agents = AgentKind::ALL
        .iter()
        .map(|a| format!("- {}: {}", a, a.description()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You plan marketing-automation work for a user. Break the request into the \
         smallest ordered list of steps, each handled by one agent:\n{agents}\n\n\
         Steps run one after another. Facts produced by earlier steps (for example a \
         new segment's id) are available to later instructions as {{{{key}}}} \
         placeholders, e.g. {{{{segmentId}}}}. Submit the plan with the {SUBMIT_PLAN_TOOL} tool."
    )
}

fn plan_tool() -> ToolDefinition {
    let agents: Vec<&str> = AgentKind::ALL.iter().map(|a| a.as_str()).collect();
    ToolDefinition {
        name: SUBMIT_PLAN_TOOL.to_string(),
        description: "Submit the ordered execution plan.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string" },
                "steps": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "agent": { "type": "string", "enum": agents },
                            "instruction": { "type": "string" }
                        },
                        "required": ["agent", "instruction"]
                    }
                }
            },
            "required": ["reasoning", "steps"]
        }),
    }
}

fn parse_plan(response: &LlmResponse) -> std::result::Result<ExecutionPlan, String> {
    let raw: Value = match response {
        LlmResponse::ToolCalls(calls) => calls
            .iter()
            .find(|c| c.name == SUBMIT_PLAN_TOOL)
            .map(|c| c.arguments.clone())
            .ok_or_else(|| format!("model did not call {SUBMIT_PLAN_TOOL}"))?,
        LlmResponse::Text(text) => {
            let block = extract_json_object(text)
                .ok_or_else(|| "no JSON object in model response".to_string())?;
            serde_json::from_str(block).map_err(|e| format!("invalid JSON: {e}"))?
        }
    };
    let plan: ExecutionPlan =
        serde_json::from_value(raw).map_err(|e| format!("plan does not match schema: {e}"))?;
    if plan.steps.is_empty() {
        return Err("plan has no steps".to_string());
    }
    if let Some(i) = plan.steps.iter().position(|s| s.instruction.trim().is_empty()) {
        return Err(format!("step {} has an empty instruction", i + 1));
    }
    Ok(plan)
}

/// The first balanced `{...}` block in `text`, ignoring braces inside
/// string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
