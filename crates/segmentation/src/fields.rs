//! Customer fields addressable from segment conditions.
//!
//! Each variant maps to a typed accessor on [`Customer`]. Unknown field
//! names fail to deserialize, so they are rejected when a segment is saved
//! rather than silently resolving to nothing at query time.

use mailwise_core::Customer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CustomerField {
    Email,
    FirstName,
    LastName,
    Address,
    City,
    State,
    ZipCode,
    Country,
    TotalOrders,
    TotalSpent,
    AverageOrderValue,
    DaysSinceLastOrder,
    RecencyScore,
    FrequencyScore,
    MonetaryScore,
    RfmSegment,
    ChurnRisk,
    Tags,
}

impl CustomerField {
    pub const ALL: [CustomerField; 18] = [
        CustomerField::Email,
        CustomerField::FirstName,
        CustomerField::LastName,
        CustomerField::Address,
        CustomerField::City,
        CustomerField::State,
        CustomerField::ZipCode,
        CustomerField::Country,
        CustomerField::TotalOrders,
        CustomerField::TotalSpent,
        CustomerField::AverageOrderValue,
        CustomerField::DaysSinceLastOrder,
        CustomerField::RecencyScore,
        CustomerField::FrequencyScore,
        CustomerField::MonetaryScore,
        CustomerField::RfmSegment,
        CustomerField::ChurnRisk,
        CustomerField::Tags,
    ];

    /// Wire name, as it appears in persisted conditions.
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerField::Email => "email",
            CustomerField::FirstName => "firstName",
            CustomerField::LastName => "lastName",
            CustomerField::Address => "address",
            CustomerField::City => "city",
            CustomerField::State => "state",
            CustomerField::ZipCode => "zipCode",
            CustomerField::Country => "country",
            CustomerField::TotalOrders => "totalOrders",
            CustomerField::TotalSpent => "totalSpent",
            CustomerField::AverageOrderValue => "averageOrderValue",
            CustomerField::DaysSinceLastOrder => "daysSinceLastOrder",
            CustomerField::RecencyScore => "recencyScore",
            CustomerField::FrequencyScore => "frequencyScore",
            CustomerField::MonetaryScore => "monetaryScore",
            CustomerField::RfmSegment => "rfmSegment",
            CustomerField::ChurnRisk => "churnRisk",
            CustomerField::Tags => "tags",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            CustomerField::TotalOrders
                | CustomerField::TotalSpent
                | CustomerField::AverageOrderValue
                | CustomerField::DaysSinceLastOrder
                | CustomerField::RecencyScore
                | CustomerField::FrequencyScore
                | CustomerField::MonetaryScore
        )
    }

    /// Resolve the field on a customer. `None` means the value is absent
    /// (only `daysSinceLastOrder` can be absent).
    pub fn resolve(&self, customer: &Customer) -> Option<Value> {
        let value = match self {
            CustomerField::Email => Value::from(customer.email.as_str()),
            CustomerField::FirstName => Value::from(customer.first_name.as_str()),
            CustomerField::LastName => Value::from(customer.last_name.as_str()),
            CustomerField::Address => Value::from(customer.address.as_str()),
            CustomerField::City => Value::from(customer.city.as_str()),
            CustomerField::State => Value::from(customer.state.as_str()),
            CustomerField::ZipCode => Value::from(customer.zip_code.as_str()),
            CustomerField::Country => Value::from(customer.country.as_str()),
            CustomerField::TotalOrders => Value::from(customer.total_orders),
            CustomerField::TotalSpent => Value::from(customer.total_spent),
            CustomerField::AverageOrderValue => Value::from(customer.average_order_value),
            CustomerField::DaysSinceLastOrder => Value::from(customer.days_since_last_order?),
            CustomerField::RecencyScore => Value::from(customer.recency_score),
            CustomerField::FrequencyScore => Value::from(customer.frequency_score),
            CustomerField::MonetaryScore => Value::from(customer.monetary_score),
            CustomerField::RfmSegment => Value::from(customer.rfm_segment.as_str()),
            CustomerField::ChurnRisk => Value::from(customer.churn_risk.as_str()),
            CustomerField::Tags => Value::from(customer.tags.clone()),
        };
        Some(value)
    }
}

impl fmt::Display for CustomerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CustomerField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown customer field '{}'", s))
    }
}
