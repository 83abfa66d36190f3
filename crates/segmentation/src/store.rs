//! Owner-scoped customer and segment storage backed by DashMap.
//!
//! Every read and write is keyed by the owning user id; records belonging
//! to another owner are reported as not found.

use std::collections::BTreeMap;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mailwise_core::{Customer, MailwiseError, MailwiseResult, NewCustomer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{self, Segment, SegmentDraft, SegmentUpdate};
use crate::predicates::{validate_conditions, Condition};
use crate::scoring::score_customer;
use crate::seed::generate_customers;

/// Aggregate view of an owner's customer base.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total_customers: usize,
    pub total_revenue: f64,
    pub average_order_value: f64,
    pub by_rfm_segment: BTreeMap<String, usize>,
    pub by_churn_risk: BTreeMap<String, usize>,
}

/// Thread-safe in-memory store for customers and segments.
pub struct AudienceStore {
    customers: DashMap<Uuid, Customer>,
    /// (owner, lowercased email) -> customer id
    emails: DashMap<(String, String), Uuid>,
    segments: DashMap<Uuid, Segment>,
}

impl AudienceStore {
    pub fn new() -> Self {
        info!("Audience store initialized (in-memory)");
        Self {
            customers: DashMap::new(),
            emails: DashMap::new(),
            segments: DashMap::new(),
        }
    }

    // ─── Customers ─────────────────────────────────────────────────────────

    /// Insert and score a customer. Emails are unique per owner.
    pub fn insert_customer(&self, owner_id: &str, req: NewCustomer) -> MailwiseResult<Customer> {
        let mut customer = Customer::new(owner_id, req);
        score_customer(&mut customer);
        self.insert_scored(customer)
    }

    fn insert_scored(&self, customer: Customer) -> MailwiseResult<Customer> {
        if customer.email.trim().is_empty() {
            return Err(MailwiseError::Validation(
                "customer email must not be empty".to_string(),
            ));
        }
        let key = (
            customer.owner_id.clone(),
            customer.email.trim().to_lowercase(),
        );
        match self.emails.entry(key) {
            Entry::Occupied(_) => Err(MailwiseError::Conflict(format!(
                "customer with email '{}' already exists",
                customer.email
            ))),
            Entry::Vacant(slot) => {
                slot.insert(customer.id);
                self.customers.insert(customer.id, customer.clone());
                metrics::counter!("customers.created").increment(1);
                debug!(customer_id = %customer.id, owner_id = %customer.owner_id, "Customer inserted");
                Ok(customer)
            }
        }
    }

    pub fn get_customer(&self, owner_id: &str, id: Uuid) -> MailwiseResult<Customer> {
        self.customers
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .map(|c| c.value().clone())
            .ok_or_else(|| MailwiseError::not_found("customer", id))
    }

    /// All customers of an owner, highest `total_spent` first.
    pub fn list_customers(&self, owner_id: &str) -> Vec<Customer> {
        let mut customers = self.owned_customers(owner_id);
        engine::sort_by_total_spent(&mut customers);
        customers
    }

    pub fn delete_customer(&self, owner_id: &str, id: Uuid) -> MailwiseResult<()> {
        let removed = self
            .customers
            .remove_if(&id, |_, c| c.owner_id == owner_id)
            .ok_or_else(|| MailwiseError::not_found("customer", id))?;
        let customer = removed.1;
        self.emails
            .remove(&(customer.owner_id.clone(), customer.email.trim().to_lowercase()));
        metrics::counter!("customers.deleted").increment(1);
        info!(customer_id = %id, owner_id, "Customer deleted");
        Ok(())
    }

    /// Re-run RFM scoring for every customer of an owner.
    pub fn recompute_scores(&self, owner_id: &str) -> usize {
        let mut rescored = 0;
        for mut entry in self.customers.iter_mut() {
            if entry.owner_id == owner_id {
                score_customer(entry.value_mut());
                rescored += 1;
            }
        }
        metrics::counter!("customers.rescored").increment(rescored as u64);
        info!(owner_id, rescored, "Customer scores recomputed");
        rescored
    }

    /// Insert generated demo customers, skipping any email collisions.
    pub fn seed_customers(&self, owner_id: &str, count: usize, seed: u64) -> usize {
        let inserted = generate_customers(owner_id, count, seed)
            .into_iter()
            .filter(|c| self.insert_scored(c.clone()).is_ok())
            .count();
        info!(owner_id, inserted, requested = count, "Seeded demo customers");
        inserted
    }

    pub fn customer_stats(&self, owner_id: &str) -> CustomerStats {
        let customers = self.owned_customers(owner_id);
        let mut stats = CustomerStats {
            total_customers: customers.len(),
            ..Default::default()
        };
        let mut total_orders: u64 = 0;
        for c in &customers {
            stats.total_revenue += c.total_spent;
            total_orders += c.total_orders as u64;
            *stats
                .by_rfm_segment
                .entry(c.rfm_segment.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_churn_risk
                .entry(c.churn_risk.as_str().to_string())
                .or_default() += 1;
        }
        if total_orders > 0 {
            stats.average_order_value = stats.total_revenue / total_orders as f64;
        }
        stats
    }

    fn owned_customers(&self, owner_id: &str) -> Vec<Customer> {
        self.customers
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .map(|c| c.value().clone())
            .collect()
    }

    // ─── Segments ──────────────────────────────────────────────────────────

    /// Validate and persist a segment, computing its customer count.
    pub fn create_segment(&self, owner_id: &str, draft: SegmentDraft) -> MailwiseResult<Segment> {
        validate_name(&draft.name)?;
        validate_conditions(&draft.conditions)?;

        let now = Utc::now();
        let customer_count = self.count_matches(owner_id, &draft.conditions);
        let segment = Segment {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: draft.name,
            description: draft.description,
            conditions: draft.conditions,
            ai_generated: draft.ai_generated,
            customer_count,
            counted_at: now,
            created_at: now,
            updated_at: now,
        };
        self.segments.insert(segment.id, segment.clone());
        metrics::counter!("segments.created").increment(1);
        info!(
            segment_id = %segment.id,
            owner_id,
            name = %segment.name,
            customer_count,
            "Segment created"
        );
        Ok(segment)
    }

    pub fn get_segment(&self, owner_id: &str, id: Uuid) -> MailwiseResult<Segment> {
        self.segments
            .get(&id)
            .filter(|s| s.owner_id == owner_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| MailwiseError::not_found("segment", id))
    }

    /// Segments of an owner, newest first.
    pub fn list_segments(&self, owner_id: &str) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self
            .segments
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .map(|s| s.value().clone())
            .collect();
        segments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        segments
    }

    /// Apply an update and recompute the cached count.
    pub fn update_segment(
        &self,
        owner_id: &str,
        id: Uuid,
        update: SegmentUpdate,
    ) -> MailwiseResult<Segment> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(conditions) = &update.conditions {
            validate_conditions(conditions)?;
        }

        let conditions = match &update.conditions {
            Some(conditions) => conditions.clone(),
            None => self.get_segment(owner_id, id)?.conditions,
        };
        let counted = self.count_matches(owner_id, &conditions);

        // Apply in place so a concurrent delete is never undone.
        let mut entry = self
            .segments
            .get_mut(&id)
            .filter(|s| s.owner_id == owner_id)
            .ok_or_else(|| MailwiseError::not_found("segment", id))?;
        let segment = entry.value_mut();
        if let Some(name) = update.name {
            segment.name = name;
        }
        if let Some(description) = update.description {
            segment.description = Some(description);
        }
        if let Some(new_conditions) = update.conditions {
            segment.conditions = new_conditions;
        }
        segment.customer_count = if segment.conditions == conditions {
            counted
        } else {
            self.count_matches(owner_id, &segment.conditions)
        };
        let now = Utc::now();
        segment.counted_at = now;
        segment.updated_at = now;
        let segment = segment.clone();
        drop(entry);

        metrics::counter!("segments.updated").increment(1);
        info!(segment_id = %id, owner_id, customer_count = segment.customer_count, "Segment updated");
        Ok(segment)
    }

    /// Remove a segment. Campaigns and flows referencing it are left alone.
    pub fn delete_segment(&self, owner_id: &str, id: Uuid) -> MailwiseResult<()> {
        self.segments
            .remove_if(&id, |_, s| s.owner_id == owner_id)
            .ok_or_else(|| MailwiseError::not_found("segment", id))?;
        metrics::counter!("segments.deleted").increment(1);
        info!(segment_id = %id, owner_id, "Segment deleted");
        Ok(())
    }

    /// Recompute the cached count against current customer data.
    pub fn refresh_count(&self, owner_id: &str, id: Uuid) -> MailwiseResult<Segment> {
        let conditions = self.get_segment(owner_id, id)?.conditions;
        let count = self.count_matches(owner_id, &conditions);
        let mut entry = self
            .segments
            .get_mut(&id)
            .ok_or_else(|| MailwiseError::not_found("segment", id))?;
        entry.customer_count = count;
        entry.counted_at = Utc::now();
        metrics::counter!("segments.refreshed").increment(1);
        info!(segment_id = %id, owner_id, count, "Segment count refreshed");
        Ok(entry.value().clone())
    }

    /// Evaluate unsaved conditions. No conditions means no preview.
    pub fn preview_segment(
        &self,
        owner_id: &str,
        conditions: &[Condition],
    ) -> MailwiseResult<Vec<Customer>> {
        validate_conditions(conditions)?;
        let customers = self.owned_customers(owner_id);
        Ok(engine::preview(&customers, conditions))
    }

    /// Live membership of a saved segment.
    pub fn customers_in_segment(&self, owner_id: &str, id: Uuid) -> MailwiseResult<Vec<Customer>> {
        let segment = self.get_segment(owner_id, id)?;
        let customers = self.owned_customers(owner_id);
        Ok(engine::matching_customers(&customers, &segment.conditions))
    }

    fn count_matches(&self, owner_id: &str, conditions: &[Condition]) -> usize {
        let customers = self.owned_customers(owner_id);
        engine::matching_customers(&customers, conditions).len()
    }
}

impl Default for AudienceStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> MailwiseResult<()> {
    if name.trim().is_empty() {
        return Err(MailwiseError::Validation(
            "segment name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SegmentBuilder;
    use crate::fields::CustomerField;
    use crate::predicates::Operator;
    use mailwise_core::RfmSegment;
    use serde_json::json;

    fn new_customer(email: &str, state: &str, spent: f64, orders: u32) -> NewCustomer {
        NewCustomer {
            email: email.to_string(),
            first_name: "Test".to_string(),
            state: state.to_string(),
            total_spent: spent,
            total_orders: orders,
            days_since_last_order: Some(10),
            ..Default::default()
        }
    }

    fn store_with_customers() -> AudienceStore {
        let store = AudienceStore::new();
        store
            .insert_customer("alice", new_customer("a@x.com", "TX", 900.0, 12))
            .unwrap();
        store
            .insert_customer("alice", new_customer("b@x.com", "TX", 120.0, 2))
            .unwrap();
        store
            .insert_customer("alice", new_customer("c@x.com", "CA", 1500.0, 25))
            .unwrap();
        store
            .insert_customer("bob", new_customer("a@x.com", "TX", 5000.0, 40))
            .unwrap();
        store
    }

    #[test]
    fn test_insert_scores_and_rejects_duplicate_email() {
        let store = store_with_customers();
        let dup = store.insert_customer("alice", new_customer("A@X.com", "NY", 1.0, 1));
        assert!(matches!(dup, Err(MailwiseError::Conflict(_))));

        let top = &store.list_customers("alice")[0];
        assert_eq!(top.email, "c@x.com");
        assert_eq!(top.rfm_segment, RfmSegment::Champions);
    }

    #[test]
    fn test_owner_scoping() {
        let store = store_with_customers();
        assert_eq!(store.list_customers("alice").len(), 3);
        assert_eq!(store.list_customers("bob").len(), 1);

        let bobs = store.list_customers("bob")[0].id;
        assert!(store.get_customer("alice", bobs).is_err());
        assert!(store.delete_customer("alice", bobs).is_err());
        store.delete_customer("bob", bobs).unwrap();
        assert!(store.list_customers("bob").is_empty());
        // Email is free again after delete.
        store
            .insert_customer("bob", new_customer("a@x.com", "TX", 1.0, 1))
            .unwrap();
    }

    #[test]
    fn test_update_racing_delete_never_resurrects() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let store = Arc::new(store_with_customers());
        for round in 0..20 {
            let segment = store
                .create_segment(
                    "alice",
                    SegmentBuilder::new(format!("Texans {round}"))
                        .where_eq(CustomerField::State, "TX")
                        .build(),
                )
                .unwrap();
            let barrier = Arc::new(Barrier::new(2));
            let renamer = {
                let (store, barrier) = (store.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    store.update_segment(
                        "alice",
                        segment.id,
                        SegmentUpdate {
                            name: Some("Renamed".into()),
                            ..Default::default()
                        },
                    )
                })
            };
            let deleter = {
                let (store, barrier) = (store.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    store.delete_segment("alice", segment.id)
                })
            };
            let _ = renamer.join().unwrap();
            deleter.join().unwrap().unwrap();
            assert!(store.get_segment("alice", segment.id).is_err());
        }
        assert!(matches!(
            store.update_segment("alice", Uuid::new_v4(), SegmentUpdate::default()),
            Err(MailwiseError::NotFound { .. })
        ));
    }

    #[test]
    fn test_segment_lifecycle_recomputes_count() {
        let store = store_with_customers();
        let draft = SegmentBuilder::new("Texas")
            .where_eq(CustomerField::State, "TX")
            .build();
        let segment = store.create_segment("alice", draft).unwrap();
        assert_eq!(segment.customer_count, 2);

        let updated = store
            .update_segment(
                "alice",
                segment.id,
                SegmentUpdate {
                    conditions: Some(vec![
                        Condition::new(CustomerField::State, Operator::Equals, "TX"),
                        Condition::new(CustomerField::TotalSpent, Operator::GreaterThan, 500),
                    ]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.customer_count, 1);
        assert_eq!(updated.name, "Texas");

        let members = store.customers_in_segment("alice", segment.id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].email, "a@x.com");

        store.delete_segment("alice", segment.id).unwrap();
        assert!(store.get_segment("alice", segment.id).is_err());
    }

    #[test]
    fn test_cached_count_drifts_until_refreshed() {
        let store = store_with_customers();
        let draft = SegmentBuilder::new("Texas")
            .where_eq(CustomerField::State, "TX")
            .build();
        let segment = store.create_segment("alice", draft).unwrap();
        store
            .insert_customer("alice", new_customer("d@x.com", "TX", 10.0, 1))
            .unwrap();

        assert_eq!(store.get_segment("alice", segment.id).unwrap().customer_count, 2);
        let refreshed = store.refresh_count("alice", segment.id).unwrap();
        assert_eq!(refreshed.customer_count, 3);
        assert!(refreshed.counted_at >= segment.counted_at);
    }

    #[test]
    fn test_invalid_segments_rejected() {
        let store = store_with_customers();
        let draft = SegmentDraft {
            name: "Bad".to_string(),
            description: None,
            conditions: vec![Condition::new(CustomerField::State, Operator::In, "TX")],
            ai_generated: false,
        };
        assert!(matches!(
            store.create_segment("alice", draft),
            Err(MailwiseError::Validation(_))
        ));

        let unnamed = SegmentBuilder::new("  ").build();
        assert!(store.create_segment("alice", unnamed).is_err());
    }

    #[test]
    fn test_preview() {
        let store = store_with_customers();
        assert!(store.preview_segment("alice", &[]).unwrap().is_empty());
        let preview = store
            .preview_segment(
                "alice",
                &[Condition::new(
                    CustomerField::State,
                    Operator::In,
                    json!(["TX", "CA"]),
                )],
            )
            .unwrap();
        assert_eq!(preview.len(), 3);
        assert_eq!(preview[0].total_spent, 1500.0);
    }

    #[test]
    fn test_seed_and_stats() {
        let store = AudienceStore::new();
        assert_eq!(store.seed_customers("demo", 200, 5), 200);
        // Re-seeding the same data collides on every email.
        assert_eq!(store.seed_customers("demo", 200, 5), 0);

        let stats = store.customer_stats("demo");
        assert_eq!(stats.total_customers, 200);
        assert_eq!(stats.by_rfm_segment.values().sum::<usize>(), 200);
        assert_eq!(stats.by_churn_risk.values().sum::<usize>(), 200);
        assert!(stats.total_revenue > 0.0);
        assert_eq!(store.recompute_scores("demo"), 200);
    }
}
