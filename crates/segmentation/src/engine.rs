//! Segment matcher: evaluates an AND-conjunction of conditions over a
//! customer set.

use chrono::{DateTime, Utc};
use mailwise_core::Customer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::predicates::{evaluate, Condition};

/// A persisted, named conjunction of conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub conditions: Vec<Condition>,
    pub ai_generated: bool,
    /// Cached match count, valid as of `counted_at`.
    pub customer_count: usize,
    pub counted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub ai_generated: bool,
}

/// Partial update. A present `conditions` replaces the whole list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Option<Vec<Condition>>,
}

/// Customers satisfying every condition, highest `total_spent` first.
///
/// Conditions are applied in list order, each narrowing the candidate set.
/// An empty condition list matches every customer.
pub fn matching_customers<'a, I>(customers: I, conditions: &[Condition]) -> Vec<Customer>
where
    I: IntoIterator<Item = &'a Customer>,
{
    let mut candidates: Vec<&Customer> = customers.into_iter().collect();
    for condition in conditions {
        candidates.retain(|c| evaluate(c, condition));
    }
    let mut matched: Vec<Customer> = candidates.into_iter().cloned().collect();
    sort_by_total_spent(&mut matched);
    matched
}

/// Like [`matching_customers`], but an empty condition list yields nothing.
pub fn preview<'a, I>(customers: I, conditions: &[Condition]) -> Vec<Customer>
where
    I: IntoIterator<Item = &'a Customer>,
{
    if conditions.is_empty() {
        return Vec::new();
    }
    matching_customers(customers, conditions)
}

pub fn sort_by_total_spent(customers: &mut [Customer]) {
    customers.sort_by(|a, b| b.total_spent.total_cmp(&a.total_spent));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::CustomerField;
    use crate::predicates::Operator;
    use crate::seed::generate_customers;
    use serde_json::json;
    use std::collections::HashSet;

    fn seeded() -> Vec<Customer> {
        generate_customers("owner-1", 1000, 7)
    }

    fn ids(customers: &[Customer]) -> HashSet<Uuid> {
        customers.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_texas_high_spenders() {
        let customers = seeded();
        let conditions = vec![
            Condition::new(CustomerField::State, Operator::Equals, "TX"),
            Condition::new(CustomerField::TotalSpent, Operator::GreaterThan, 500),
        ];
        let result = matching_customers(&customers, &conditions);

        assert!(!result.is_empty());
        assert!(result
            .iter()
            .all(|c| c.state == "TX" && c.total_spent > 500.0));
        assert!(result
            .windows(2)
            .all(|w| w[0].total_spent >= w[1].total_spent));

        let expected = customers
            .iter()
            .filter(|c| c.state == "TX" && c.total_spent > 500.0)
            .count();
        assert_eq!(result.len(), expected);
    }

    #[test]
    fn test_conjunction_is_order_independent() {
        let customers = seeded();
        let c1 = Condition::new(CustomerField::TotalOrders, Operator::GreaterThanOrEqual, 5);
        let c2 = Condition::new(CustomerField::State, Operator::In, json!(["TX", "CA", "NY"]));
        let forward = matching_customers(&customers, &[c1.clone(), c2.clone()]);
        let backward = matching_customers(&customers, &[c2, c1]);
        assert_eq!(ids(&forward), ids(&backward));
        assert_eq!(forward.len(), backward.len());
    }

    #[test]
    fn test_equality_matches_exactly_the_equal_customers() {
        let customers = seeded();
        let cond = Condition::new(CustomerField::RfmSegment, Operator::Equals, "Champions");
        let result = matching_customers(&customers, &[cond]);
        let expected: HashSet<Uuid> = customers
            .iter()
            .filter(|c| c.rfm_segment.as_str() == "Champions")
            .map(|c| c.id)
            .collect();
        assert_eq!(ids(&result), expected);
    }

    #[test]
    fn test_missing_field_excluded_by_relational_condition() {
        let customers = seeded();
        let cond = Condition::new(CustomerField::DaysSinceLastOrder, Operator::GreaterThan, -1);
        let result = matching_customers(&customers, &[cond]);
        assert!(result.iter().all(|c| c.days_since_last_order.is_some()));
        let with_orders = customers
            .iter()
            .filter(|c| c.days_since_last_order.is_some())
            .count();
        assert_eq!(result.len(), with_orders);
    }

    #[test]
    fn test_preview_without_conditions_is_empty() {
        let customers = seeded();
        assert!(preview(&customers, &[]).is_empty());
        assert_eq!(matching_customers(&customers, &[]).len(), customers.len());
    }
}
