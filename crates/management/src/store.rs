//! In-memory management store backed by DashMap.
//!
//! Holds campaigns and flows per owner. Segment membership is read from the
//! shared [`AudienceStore`] when a campaign is sent.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use mailwise_core::{MailwiseError, MailwiseResult};
use mailwise_segmentation::AudienceStore;
use tracing::info;
use uuid::Uuid;

use crate::flows::{validate_flow, FlowValidation};
use crate::models::*;

/// Thread-safe in-memory store for campaigns and flows.
pub struct ManagementStore {
    audience: Arc<AudienceStore>,
    campaigns: DashMap<Uuid, Campaign>,
    flows: DashMap<Uuid, Flow>,
}

impl ManagementStore {
    pub fn new(audience: Arc<AudienceStore>) -> Self {
        info!("Management store initialized (in-memory)");
        Self {
            audience,
            campaigns: DashMap::new(),
            flows: DashMap::new(),
        }
    }

    pub fn audience(&self) -> &Arc<AudienceStore> {
        &self.audience
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn list_campaigns(&self, owner_id: &str) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .map(|r| r.value().clone())
            .collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    pub fn get_campaign(&self, owner_id: &str, id: Uuid) -> MailwiseResult<Campaign> {
        self.campaigns
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| MailwiseError::not_found("campaign", id))
    }

    pub fn create_campaign(
        &self,
        owner_id: &str,
        req: CreateCampaignRequest,
    ) -> MailwiseResult<Campaign> {
        require_text("campaign name", &req.name)?;
        require_text("campaign subject", &req.subject)?;
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: req.name,
            subject: req.subject,
            content: req.content,
            segment_id: req.segment_id,
            status: CampaignStatus::Draft,
            scheduled_at: None,
            sent_at: None,
            recipient_count: None,
            created_at: now,
            updated_at: now,
        };
        self.campaigns.insert(campaign.id, campaign.clone());
        metrics::counter!("management.campaigns.created").increment(1);
        info!(campaign_id = %campaign.id, owner_id, name = %campaign.name, "Campaign created");
        Ok(campaign)
    }

    pub fn update_campaign(
        &self,
        owner_id: &str,
        id: Uuid,
        req: UpdateCampaignRequest,
    ) -> MailwiseResult<Campaign> {
        self.modify_campaign(owner_id, id, |c| {
            if c.status == CampaignStatus::Sent {
                return Err(MailwiseError::Conflict(
                    "a sent campaign cannot be edited".to_string(),
                ));
            }
            if let Some(name) = req.name {
                require_text("campaign name", &name)?;
                c.name = name;
            }
            if let Some(subject) = req.subject {
                require_text("campaign subject", &subject)?;
                c.subject = subject;
            }
            if let Some(content) = req.content {
                c.content = content;
            }
            if let Some(segment_id) = req.segment_id {
                c.segment_id = Some(segment_id);
            }
            Ok(())
        })
    }

    pub fn delete_campaign(&self, owner_id: &str, id: Uuid) -> MailwiseResult<()> {
        self.campaigns
            .remove_if(&id, |_, c| c.owner_id == owner_id)
            .ok_or_else(|| MailwiseError::not_found("campaign", id))?;
        metrics::counter!("management.campaigns.deleted").increment(1);
        info!(campaign_id = %id, owner_id, "Campaign deleted");
        Ok(())
    }

    pub fn schedule_campaign(
        &self,
        owner_id: &str,
        id: Uuid,
        req: ScheduleCampaignRequest,
    ) -> MailwiseResult<Campaign> {
        self.modify_campaign(owner_id, id, |c| {
            if c.status == CampaignStatus::Sent {
                return Err(MailwiseError::Conflict(
                    "campaign has already been sent".to_string(),
                ));
            }
            c.status = CampaignStatus::Scheduled;
            c.scheduled_at = Some(req.scheduled_at);
            Ok(())
        })
    }

    /// Mark a campaign sent, snapshotting the live size of its segment.
    /// Delivery itself happens outside this service.
    pub fn send_campaign(&self, owner_id: &str, id: Uuid) -> MailwiseResult<Campaign> {
        let campaign = self.get_campaign(owner_id, id)?;
        if campaign.status == CampaignStatus::Sent {
            return Err(MailwiseError::Conflict(
                "campaign has already been sent".to_string(),
            ));
        }
        let segment_id = campaign.segment_id.ok_or_else(|| {
            MailwiseError::Validation("campaign has no target segment".to_string())
        })?;
        let recipients = self
            .audience
            .customers_in_segment(owner_id, segment_id)
            .map_err(|e| match e {
                MailwiseError::NotFound { .. } => MailwiseError::Validation(format!(
                    "target segment {} no longer exists",
                    segment_id
                )),
                other => other,
            })?
            .len();

        let sent = self.modify_campaign(owner_id, id, |c| {
            // Recheck under the entry guard; another send may have won.
            if c.status == CampaignStatus::Sent {
                return Err(MailwiseError::Conflict(
                    "campaign has already been sent".to_string(),
                ));
            }
            c.status = CampaignStatus::Sent;
            c.sent_at = Some(Utc::now());
            c.recipient_count = Some(recipients);
            Ok(())
        })?;
        metrics::counter!("management.campaigns.sent").increment(1);
        info!(campaign_id = %id, owner_id, recipients, "Campaign sent");
        Ok(sent)
    }

    fn modify_campaign<F>(&self, owner_id: &str, id: Uuid, apply: F) -> MailwiseResult<Campaign>
    where
        F: FnOnce(&mut Campaign) -> MailwiseResult<()>,
    {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .filter(|c| c.owner_id == owner_id)
            .ok_or_else(|| MailwiseError::not_found("campaign", id))?;
        let mut updated = entry.value().clone();
        apply(&mut updated)?;
        updated.updated_at = Utc::now();
        *entry.value_mut() = updated.clone();
        Ok(updated)
    }

    // ─── Flows ─────────────────────────────────────────────────────────────

    pub fn list_flows(&self, owner_id: &str) -> Vec<Flow> {
        let mut flows: Vec<Flow> = self
            .flows
            .iter()
            .filter(|f| f.owner_id == owner_id)
            .map(|r| r.value().clone())
            .collect();
        flows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        flows
    }

    pub fn get_flow(&self, owner_id: &str, id: Uuid) -> MailwiseResult<Flow> {
        self.flows
            .get(&id)
            .filter(|f| f.owner_id == owner_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| MailwiseError::not_found("flow", id))
    }

    /// Store a flow as a draft. Drafts may be invalid; activation checks.
    pub fn create_flow(&self, owner_id: &str, req: CreateFlowRequest) -> MailwiseResult<Flow> {
        require_text("flow name", &req.name)?;
        let now = Utc::now();
        let flow = Flow {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: req.name,
            description: req.description,
            trigger_segment_id: req.trigger_segment_id,
            nodes: req.nodes,
            edges: req.edges,
            status: FlowStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.flows.insert(flow.id, flow.clone());
        metrics::counter!("management.flows.created").increment(1);
        info!(flow_id = %flow.id, owner_id, nodes = flow.nodes.len(), "Flow created");
        Ok(flow)
    }

    /// Replace parts of a draft or paused flow. Active flows must be paused
    /// before their graph can change.
    pub fn update_flow(
        &self,
        owner_id: &str,
        id: Uuid,
        req: UpdateFlowRequest,
    ) -> MailwiseResult<Flow> {
        if let Some(name) = &req.name {
            require_text("flow name", name)?;
        }
        let mut entry = self
            .flows
            .get_mut(&id)
            .filter(|f| f.owner_id == owner_id)
            .ok_or_else(|| MailwiseError::not_found("flow", id))?;
        if entry.status == FlowStatus::Active {
            return Err(MailwiseError::Conflict(
                "pause the flow before editing it".to_string(),
            ));
        }
        if let Some(name) = req.name {
            entry.name = name;
        }
        if let Some(description) = req.description {
            entry.description = Some(description);
        }
        if let Some(segment_id) = req.trigger_segment_id {
            entry.trigger_segment_id = Some(segment_id);
        }
        if let Some(nodes) = req.nodes {
            entry.nodes = nodes;
        }
        if let Some(edges) = req.edges {
            entry.edges = edges;
        }
        entry.updated_at = Utc::now();
        metrics::counter!("management.flows.updated").increment(1);
        info!(flow_id = %id, owner_id, nodes = entry.nodes.len(), "Flow updated");
        Ok(entry.value().clone())
    }

    pub fn delete_flow(&self, owner_id: &str, id: Uuid) -> MailwiseResult<()> {
        self.flows
            .remove_if(&id, |_, f| f.owner_id == owner_id)
            .ok_or_else(|| MailwiseError::not_found("flow", id))?;
        metrics::counter!("management.flows.deleted").increment(1);
        info!(flow_id = %id, owner_id, "Flow deleted");
        Ok(())
    }

    /// Validate a saved flow's graph without changing its status.
    pub fn validate(&self, owner_id: &str, id: Uuid) -> MailwiseResult<FlowValidation> {
        let flow = self.get_flow(owner_id, id)?;
        Ok(validate_flow(&flow.nodes, &flow.edges))
    }

    /// Activate a flow. Requires a clean graph and an existing trigger segment.
    pub fn activate_flow(&self, owner_id: &str, id: Uuid) -> MailwiseResult<Flow> {
        let flow = self.get_flow(owner_id, id)?;
        let validation = validate_flow(&flow.nodes, &flow.edges);
        if !validation.valid {
            let issues = serde_json::to_string(&validation.errors)?;
            return Err(MailwiseError::Validation(format!(
                "flow graph is invalid: {}",
                issues
            )));
        }
        let segment_id = flow.trigger_segment_id.ok_or_else(|| {
            MailwiseError::Validation("flow has no trigger segment".to_string())
        })?;
        self.audience.get_segment(owner_id, segment_id).map_err(|_| {
            MailwiseError::Validation(format!("trigger segment {} does not exist", segment_id))
        })?;
        self.set_flow_status(owner_id, id, FlowStatus::Active)
    }

    pub fn pause_flow(&self, owner_id: &str, id: Uuid) -> MailwiseResult<Flow> {
        self.set_flow_status(owner_id, id, FlowStatus::Paused)
    }

    fn set_flow_status(&self, owner_id: &str, id: Uuid, status: FlowStatus) -> MailwiseResult<Flow> {
        let mut entry = self
            .flows
            .get_mut(&id)
            .filter(|f| f.owner_id == owner_id)
            .ok_or_else(|| MailwiseError::not_found("flow", id))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        info!(flow_id = %id, owner_id, ?status, "Flow status changed");
        Ok(entry.value().clone())
    }
}

fn require_text(what: &str, value: &str) -> MailwiseResult<()> {
    if value.trim().is_empty() {
        return Err(MailwiseError::Validation(format!("{} must not be empty", what)));
    }
    Ok(())
}
