//! Tools exposed to agents during their function-calling loop.
//!
//! Every tool is a thin adapter over the audience and management stores,
//! scoped to the requesting owner. Results are JSON strings fed back to the
//! model verbatim.

use std::sync::Arc;

use mailwise_core::Customer;
use mailwise_management::models::{CreateCampaignRequest, CreateFlowRequest, FlowEdge, FlowNode};
use mailwise_management::{validate_flow, ManagementStore};
use mailwise_segmentation::{AudienceStore, Condition, CustomerField, SegmentDraft};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AgentError, Result};
use crate::llm::ToolDefinition;
use crate::planner::AgentKind;

/// Customers shown in a preview result.
const PREVIEW_SAMPLE: usize = 5;

pub const LIST_CUSTOMER_FIELDS: &str = "list_customer_fields";
pub const PREVIEW_SEGMENT: &str = "preview_segment";
pub const CREATE_SEGMENT: &str = "create_segment";
pub const LIST_SEGMENTS: &str = "list_segments";
pub const CUSTOMER_STATS: &str = "customer_stats";
pub const CREATE_CAMPAIGN: &str = "create_campaign";
pub const LIST_CAMPAIGNS: &str = "list_campaigns";
pub const CREATE_FLOW: &str = "create_flow";
pub const VALIDATE_FLOW: &str = "validate_flow";

#[derive(Deserialize)]
struct ConditionsArgs {
    conditions: Vec<Condition>,
}

#[derive(Deserialize)]
struct FlowGraphArgs {
    nodes: Vec<FlowNode>,
    #[serde(default)]
    edges: Vec<FlowEdge>,
}

#[derive(Clone)]
pub struct MarketingTools {
    audience: Arc<AudienceStore>,
    management: Arc<ManagementStore>,
}

impl MarketingTools {
    pub fn new(management: Arc<ManagementStore>) -> Self {
        Self {
            audience: management.audience().clone(),
            management,
        }
    }

    /// The toolset offered to one agent kind.
    pub fn definitions_for(&self, kind: AgentKind) -> Vec<ToolDefinition> {
        let names: &[&str] = match kind {
            AgentKind::Segment => &[LIST_CUSTOMER_FIELDS, PREVIEW_SEGMENT, CREATE_SEGMENT, LIST_SEGMENTS],
            AgentKind::Campaign => &[LIST_SEGMENTS, CREATE_CAMPAIGN, LIST_CAMPAIGNS],
            AgentKind::Flow => &[LIST_CUSTOMER_FIELDS, LIST_SEGMENTS, VALIDATE_FLOW, CREATE_FLOW],
            AgentKind::Analytics => &[CUSTOMER_STATS, LIST_SEGMENTS, PREVIEW_SEGMENT, LIST_CAMPAIGNS],
            AgentKind::Content => &[],
        };
        names.iter().filter_map(|name| definition(name)).collect()
    }

    /// Run one tool call for `owner_id`.
    pub fn execute(&self, owner_id: &str, tool_name: &str, arguments: Value) -> Result<String> {
        let output = match tool_name {
            LIST_CUSTOMER_FIELDS => json!(CustomerField::ALL
                .iter()
                .map(|f| json!({ "field": f.as_str(), "numeric": f.is_numeric() }))
                .collect::<Vec<_>>()),
            PREVIEW_SEGMENT => {
                let args: ConditionsArgs = parse_args(tool_name, arguments)?;
                let matches = self.audience.preview_segment(owner_id, &args.conditions)?;
                json!({
                    "count": matches.len(),
                    "sample": matches.iter().take(PREVIEW_SAMPLE).map(customer_summary).collect::<Vec<_>>(),
                })
            }
            CREATE_SEGMENT => {
                let mut draft: SegmentDraft = parse_args(tool_name, arguments)?;
                draft.ai_generated = true;
                let segment = self.audience.create_segment(owner_id, draft)?;
                json!({
                    "segmentId": segment.id,
                    "segmentName": segment.name,
                    "customerCount": segment.customer_count,
                })
            }
            LIST_SEGMENTS => json!(self
                .audience
                .list_segments(owner_id)
                .iter()
                .map(|s| json!({
                    "id": s.id,
                    "name": s.name,
                    "customerCount": s.customer_count,
                    "conditions": s.conditions,
                }))
                .collect::<Vec<_>>()),
            CUSTOMER_STATS => serde_json::to_value(self.audience.customer_stats(owner_id))?,
            CREATE_CAMPAIGN => {
                let req: CreateCampaignRequest = parse_args(tool_name, arguments)?;
                if let Some(segment_id) = req.segment_id {
                    self.audience.get_segment(owner_id, segment_id)?;
                }
                let campaign = self.management.create_campaign(owner_id, req)?;
                json!({
                    "campaignId": campaign.id,
                    "campaignName": campaign.name,
                    "status": campaign.status,
                })
            }
            LIST_CAMPAIGNS => json!(self
                .management
                .list_campaigns(owner_id)
                .iter()
                .map(|c| json!({
                    "id": c.id,
                    "name": c.name,
                    "subject": c.subject,
                    "status": c.status,
                    "segmentId": c.segment_id,
                }))
                .collect::<Vec<_>>()),
            VALIDATE_FLOW => {
                let args: FlowGraphArgs = parse_args(tool_name, arguments)?;
                serde_json::to_value(validate_flow(&args.nodes, &args.edges))?
            }
            CREATE_FLOW => {
                let req: CreateFlowRequest = parse_args(tool_name, arguments)?;
                let flow = self.management.create_flow(owner_id, req)?;
                let validation = validate_flow(&flow.nodes, &flow.edges);
                json!({
                    "flowId": flow.id,
                    "flowName": flow.name,
                    "status": flow.status,
                    "validation": validation,
                })
            }
            _ => {
                return Err(AgentError::UnknownTool {
                    tool_name: tool_name.to_string(),
                })
            }
        };
        Ok(output.to_string())
    }
}

fn parse_args<T: DeserializeOwned>(tool_name: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| AgentError::InvalidToolArguments {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    })
}

fn customer_summary(c: &Customer) -> Value {
    json!({
        "id": c.id,
        "name": c.full_name(),
        "email": c.email,
        "state": c.state,
        "totalSpent": c.total_spent,
        "rfmSegment": c.rfm_segment,
    })
}

fn condition_schema() -> Value {
    let fields: Vec<&str> = CustomerField::ALL.iter().map(|f| f.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "field": { "type": "string", "enum": fields },
            "operator": {
                "type": "string",
                "enum": ["=", "!=", ">", "<", ">=", "<=", "contains", "startsWith", "endsWith", "in"]
            },
            "value": {
                "description": "A string, number or boolean; an array for the `in` operator."
            }
        },
        "required": ["field", "operator", "value"]
    })
}

fn flow_graph_schema() -> (Value, Value) {
    let nodes = json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "type": { "type": "string", "enum": ["trigger", "email", "wait", "condition", "exit"] },
                "subject": { "type": "string" },
                "content": { "type": "string" },
                "durationHours": { "type": "integer", "minimum": 1 },
                "condition": condition_schema()
            },
            "required": ["id", "type"]
        }
    });
    let edges = json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "source": { "type": "string" },
                "target": { "type": "string" },
                "label": { "type": "string" }
            },
            "required": ["source", "target"]
        }
    });
    (nodes, edges)
}

fn definition(name: &str) -> Option<ToolDefinition> {
    let conditions = json!({ "type": "array", "items": condition_schema() });
    let empty = json!({ "type": "object", "properties": {} });

    let (description, input_schema) = match name {
        LIST_CUSTOMER_FIELDS => ("List the customer fields usable in segment conditions.", empty),
        PREVIEW_SEGMENT => (
            "Count and sample the customers matching all given conditions without saving.",
            json!({
                "type": "object",
                "properties": { "conditions": conditions },
                "required": ["conditions"]
            }),
        ),
        CREATE_SEGMENT => (
            "Save a named segment. Returns its segmentId and current customer count.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "conditions": conditions
                },
                "required": ["name", "conditions"]
            }),
        ),
        LIST_SEGMENTS => ("List the user's saved segments.", empty),
        CUSTOMER_STATS => (
            "Customer totals, revenue, and counts per RFM segment and churn risk.",
            empty,
        ),
        CREATE_CAMPAIGN => (
            "Create a draft email campaign, optionally targeting a segment.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "subject": { "type": "string" },
                    "content": { "type": "string" },
                    "segmentId": { "type": "string", "format": "uuid" }
                },
                "required": ["name", "subject"]
            }),
        ),
        LIST_CAMPAIGNS => ("List the user's campaigns.", empty),
        VALIDATE_FLOW => {
            let (nodes, edges) = flow_graph_schema();
            (
                "Check a flow graph for a single trigger, orphan nodes and cycles.",
                json!({
                    "type": "object",
                    "properties": { "nodes": nodes, "edges": edges },
                    "required": ["nodes"]
                }),
            )
        }
        CREATE_FLOW => {
            let (nodes, edges) = flow_graph_schema();
            (
                "Save a draft automation flow. Returns its flowId and validation result.",
                json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "description": { "type": "string" },
                        "triggerSegmentId": { "type": "string", "format": "uuid" },
                        "nodes": nodes,
                        "edges": edges
                    },
                    "required": ["name", "nodes"]
                }),
            )
        }
        _ => return None,
    };

    Some(ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    })
}
