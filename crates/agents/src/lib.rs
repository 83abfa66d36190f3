pub mod error;
pub mod handlers;
pub mod llm;
pub mod planner;
pub mod tools;
pub mod workflow;

pub use error::AgentError;
pub use handlers::{AgentHandler, HandlerRegistry, ToolLoopAgent};
pub use llm::{AnthropicClient, LanguageModel, ScriptedModel};
pub use planner::{AgentKind, ExecutionPlan, HistoryMessage, PlanStep, Planner};
pub use tools::MarketingTools;
pub use workflow::{AgentRequest, WorkflowEvent, WorkflowOrchestrator, WorkflowOutcome};
