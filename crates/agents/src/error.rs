//! Agent error types.
//!
//! Model, planning and step failures surface through [`AgentError`]. Domain
//! failures from the stores are wrapped rather than flattened so the API
//! layer can still map them to the right status.

use mailwise_core::MailwiseError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The agent endpoint has no API key configured.
    #[error("missing api key for the language model")]
    MissingApiKey,

    /// An HTTP request to the model provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The provider answered with something other than a messages payload.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The model did not produce a usable execution plan.
    #[error("plan could not be parsed after {attempts} attempt(s): {reason}")]
    PlanParse { attempts: u32, reason: String },

    /// A tool loop hit its iteration cap without a final answer.
    #[error("{agent} agent exceeded {max_iterations} tool iterations")]
    MaxIterationsExceeded { agent: String, max_iterations: u32 },

    /// No handler is registered for a planned agent.
    #[error("no handler registered for agent `{agent}`")]
    UnknownAgent { agent: String },

    #[error("unknown tool `{tool_name}`")]
    UnknownTool { tool_name: String },

    #[error("invalid arguments for `{tool_name}`: {reason}")]
    InvalidToolArguments { tool_name: String, reason: String },

    #[error(transparent)]
    Domain(#[from] MailwiseError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}
