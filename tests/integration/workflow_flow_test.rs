//! Integration test for the agent workflow: plan, build a segment, then
//! target it with a campaign, all against the in-memory stores.
//! Uses a rule-driven fake model, no network access needed.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mailwise_agents::llm::{ChatRequest, LlmResponse, Role, ToolCall};
    use mailwise_agents::planner::SUBMIT_PLAN_TOOL;
    use mailwise_agents::{AgentRequest, LanguageModel, WorkflowEvent, WorkflowOrchestrator};
    use mailwise_core::config::LlmConfig;
    use mailwise_management::ManagementStore;
    use mailwise_segmentation::AudienceStore;
    use serde_json::json;
    use tokio::sync::mpsc;

    /// Answers by inspecting the request instead of replaying a script, so
    /// ids created during the run can flow back into later turns.
    struct RuleModel;

    #[async_trait::async_trait]
    impl LanguageModel for RuleModel {
        async fn chat(&self, request: &ChatRequest) -> mailwise_agents::error::Result<LlmResponse> {
            let system = request
                .messages
                .iter()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            let last = request.messages.last().expect("request has messages");

            if request.forced_tool.as_deref() == Some(SUBMIT_PLAN_TOOL) {
                return Ok(tool_call(
                    SUBMIT_PLAN_TOOL,
                    json!({
                        "reasoning": "Build the audience first, then the campaign.",
                        "steps": [
                            {"agent": "segment", "instruction": "Texas customers who spent over $500"},
                            {"agent": "campaign", "instruction": "Create a VIP campaign for segment {{segmentId}}"}
                        ]
                    }),
                ));
            }
            if system.starts_with("Extract the identifiers") {
                return Ok(LlmResponse::Text(last.content.clone()));
            }
            if last.role == Role::Tool {
                return Ok(LlmResponse::Text(last.content.clone()));
            }
            if system.contains("segmentation agent") {
                return Ok(tool_call(
                    "create_segment",
                    json!({
                        "name": "Texas VIPs",
                        "conditions": [
                            {"field": "state", "operator": "=", "value": "TX"},
                            {"field": "totalSpent", "operator": ">", "value": 500}
                        ]
                    }),
                ));
            }
            if system.contains("campaign agent") {
                let segment_id = last.content.split_whitespace().last().unwrap_or_default();
                return Ok(tool_call(
                    "create_campaign",
                    json!({"name": "Texas VIP offer", "subject": "A thank-you from us", "segmentId": segment_id}),
                ));
            }
            Ok(LlmResponse::Text("nothing to do".into()))
        }
    }

    fn tool_call(name: &str, arguments: serde_json::Value) -> LlmResponse {
        LlmResponse::ToolCalls(vec![ToolCall {
            id: format!("call-{name}"),
            name: name.into(),
            arguments,
        }])
    }

    fn setup() -> (WorkflowOrchestrator, Arc<ManagementStore>) {
        let audience = Arc::new(AudienceStore::new());
        audience.seed_customers("demo-user", 1000, 42);
        let management = Arc::new(ManagementStore::new(audience));
        let model: Arc<dyn LanguageModel> = Arc::new(RuleModel);
        let orchestrator =
            WorkflowOrchestrator::with_tool_agents(model, management.clone(), &LlmConfig::default());
        (orchestrator, management)
    }

    #[tokio::test]
    async fn test_segment_then_campaign_workflow() {
        let (orchestrator, management) = setup();
        let request = AgentRequest {
            message: "Send my best Texas customers a thank-you email".into(),
            user_id: "demo-user".into(),
            conversation_history: Vec::new(),
            stream: false,
        };

        let outcome = orchestrator.run(&request, None).await.unwrap();
        assert_eq!(outcome.workflow.len(), 2, "{:?}", outcome.workflow);
        assert!(outcome.reasoning.contains("audience first"));

        let audience = management.audience();
        let segments = audience.list_segments("demo-user");
        assert_eq!(segments.len(), 1);
        let segment = &segments[0];
        assert!(segment.ai_generated);
        assert!(segment.customer_count > 0);

        let campaigns = management.list_campaigns("demo-user");
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].segment_id, Some(segment.id));

        let sent = management.send_campaign("demo-user", campaigns[0].id).unwrap();
        assert_eq!(sent.recipient_count, Some(segment.customer_count));

        let members = audience.customers_in_segment("demo-user", segment.id).unwrap();
        assert!(members.iter().all(|c| c.state == "TX" && c.total_spent > 500.0));
        assert!(members.windows(2).all(|w| w[0].total_spent >= w[1].total_spent));
    }

    #[tokio::test]
    async fn test_workflow_streams_ordered_events() {
        let (orchestrator, _) = setup();
        let request = AgentRequest {
            message: "Send my best Texas customers a thank-you email".into(),
            user_id: "demo-user".into(),
            conversation_history: Vec::new(),
            stream: true,
        };
        let (tx, mut rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { orchestrator.run(&request, Some(&tx)).await });

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        handle.await.unwrap().unwrap();

        assert!(matches!(events.first(), Some(WorkflowEvent::Plan { steps, .. }) if steps.len() == 2));
        assert!(matches!(events.last(), Some(WorkflowEvent::Complete { .. })));
        let started: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::StepStart { step, .. } => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![1, 2]);
        let second_instruction = events.iter().find_map(|e| match e {
            WorkflowEvent::StepStart { step: 2, instruction, .. } => Some(instruction.clone()),
            _ => None,
        });
        assert!(!second_instruction.unwrap().contains("{{segmentId}}"));
    }
}
