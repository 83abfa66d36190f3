use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer record owned by a single user account.
///
/// Purchase aggregates are written by inserts and the score recompute job;
/// the RFM fields are always derived from them, never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub owner_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
    pub total_orders: u32,
    pub total_spent: f64,
    pub average_order_value: f64,
    /// `None` when the customer has never ordered.
    pub days_since_last_order: Option<u32>,
    pub recency_score: u8,
    pub frequency_score: u8,
    pub monetary_score: u8,
    pub rfm_segment: RfmSegment,
    pub churn_risk: ChurnRisk,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Builds an unscored customer. Scores start at the floor until the
    /// scoring pass runs.
    pub fn new(owner_id: impl Into<String>, req: NewCustomer) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            address: req.address,
            city: req.city,
            state: req.state,
            zip_code: req.zip_code,
            country: req.country,
            total_orders: req.total_orders,
            total_spent: req.total_spent,
            average_order_value: 0.0,
            days_since_last_order: req.days_since_last_order,
            recency_score: 1,
            frequency_score: 1,
            monetary_score: 1,
            rfm_segment: RfmSegment::Lost,
            churn_risk: ChurnRisk::Low,
            tags: req.tags,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Request body for inserting a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub total_orders: u32,
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub days_since_last_order: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Categorical RFM label derived from the summed recency, frequency and
/// monetary scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RfmSegment {
    Champions,
    Loyal,
    Potential,
    #[serde(rename = "At-Risk")]
    AtRisk,
    Lost,
}

impl RfmSegment {
    pub const ALL: [RfmSegment; 5] = [
        RfmSegment::Champions,
        RfmSegment::Loyal,
        RfmSegment::Potential,
        RfmSegment::AtRisk,
        RfmSegment::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RfmSegment::Champions => "Champions",
            RfmSegment::Loyal => "Loyal",
            RfmSegment::Potential => "Potential",
            RfmSegment::AtRisk => "At-Risk",
            RfmSegment::Lost => "Lost",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChurnRisk {
    Low,
    Medium,
    High,
}

impl ChurnRisk {
    pub const ALL: [ChurnRisk; 3] = [ChurnRisk::Low, ChurnRisk::Medium, ChurnRisk::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChurnRisk::Low => "Low",
            ChurnRisk::Medium => "Medium",
            ChurnRisk::High => "High",
        }
    }
}
