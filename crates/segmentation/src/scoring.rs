//! RFM scoring: threshold-based recency, frequency and monetary scores,
//! the derived segment label, and churn risk.
//!
//! These breakpoints are the only copy in the codebase; the seed generator
//! and the live recompute both go through [`score_customer`].

use chrono::Utc;
use mailwise_core::{ChurnRisk, Customer, RfmSegment};

/// Upper bounds (exclusive) on days since last order for recency 5, 4, 3, 2.
pub const RECENCY_DAY_BREAKPOINTS: [u32; 4] = [30, 60, 90, 180];
/// Minimum order counts for frequency 5, 4, 3, 2.
pub const FREQUENCY_ORDER_BREAKPOINTS: [u32; 4] = [20, 10, 5, 2];
/// Minimum total spend for monetary 5, 4, 3, 2.
pub const MONETARY_SPEND_BREAKPOINTS: [f64; 4] = [1000.0, 500.0, 250.0, 100.0];
/// Minimum summed score for Champions, Loyal, Potential, At-Risk.
pub const SEGMENT_SCORE_BREAKPOINTS: [u8; 4] = [13, 10, 7, 5];

pub const HIGH_CHURN_MIN_DAYS: u32 = 90;
pub const HIGH_CHURN_MIN_ORDERS: u32 = 5;
pub const MEDIUM_CHURN_MIN_DAYS: u32 = 45;
pub const MEDIUM_CHURN_MIN_ORDERS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfmScores {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
}

impl RfmScores {
    pub fn total(&self) -> u8 {
        self.recency + self.frequency + self.monetary
    }
}

pub fn recency_score(days_since_last_order: Option<u32>) -> u8 {
    let Some(days) = days_since_last_order else {
        return 1;
    };
    RECENCY_DAY_BREAKPOINTS
        .iter()
        .position(|&limit| days < limit)
        .map_or(1, |i| 5 - i as u8)
}

pub fn frequency_score(total_orders: u32) -> u8 {
    FREQUENCY_ORDER_BREAKPOINTS
        .iter()
        .position(|&min| total_orders >= min)
        .map_or(1, |i| 5 - i as u8)
}

pub fn monetary_score(total_spent: f64) -> u8 {
    MONETARY_SPEND_BREAKPOINTS
        .iter()
        .position(|&min| total_spent >= min)
        .map_or(1, |i| 5 - i as u8)
}

pub fn rfm_segment(scores: &RfmScores) -> RfmSegment {
    const LABELS: [RfmSegment; 4] = [
        RfmSegment::Champions,
        RfmSegment::Loyal,
        RfmSegment::Potential,
        RfmSegment::AtRisk,
    ];
    let total = scores.total();
    SEGMENT_SCORE_BREAKPOINTS
        .iter()
        .position(|&min| total >= min)
        .map_or(RfmSegment::Lost, |i| LABELS[i])
}

pub fn churn_risk(days_since_last_order: Option<u32>, total_orders: u32) -> ChurnRisk {
    match days_since_last_order {
        None => ChurnRisk::Low,
        Some(days) if days > HIGH_CHURN_MIN_DAYS && total_orders > HIGH_CHURN_MIN_ORDERS => {
            ChurnRisk::High
        }
        Some(days) if days > MEDIUM_CHURN_MIN_DAYS && total_orders > MEDIUM_CHURN_MIN_ORDERS => {
            ChurnRisk::Medium
        }
        Some(_) => ChurnRisk::Low,
    }
}

pub fn rfm_scores(customer: &Customer) -> RfmScores {
    RfmScores {
        recency: recency_score(customer.days_since_last_order),
        frequency: frequency_score(customer.total_orders),
        monetary: monetary_score(customer.total_spent),
    }
}

/// Recompute every derived field of a customer in place.
pub fn score_customer(customer: &mut Customer) {
    let scores = rfm_scores(customer);
    customer.recency_score = scores.recency;
    customer.frequency_score = scores.frequency;
    customer.monetary_score = scores.monetary;
    customer.rfm_segment = rfm_segment(&scores);
    customer.churn_risk = churn_risk(customer.days_since_last_order, customer.total_orders);
    customer.average_order_value = if customer.total_orders > 0 {
        customer.total_spent / customer.total_orders as f64
    } else {
        0.0
    };
    customer.updated_at = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailwise_core::NewCustomer;

    fn scored(total_spent: f64, total_orders: u32, days: Option<u32>) -> Customer {
        let mut c = Customer::new(
            "owner",
            NewCustomer {
                email: "c@example.com".into(),
                total_spent,
                total_orders,
                days_since_last_order: days,
                ..Default::default()
            },
        );
        score_customer(&mut c);
        c
    }

    #[test]
    fn test_champion_customer() {
        let c = scored(1200.0, 22, Some(10));
        assert_eq!(
            (c.recency_score, c.frequency_score, c.monetary_score),
            (5, 5, 5)
        );
        assert_eq!(c.rfm_segment, RfmSegment::Champions);
        assert_eq!(c.churn_risk, ChurnRisk::Low);
        assert!((c.average_order_value - 1200.0 / 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_lost_customer_with_one_order_is_low_risk() {
        let c = scored(50.0, 1, Some(200));
        assert_eq!(
            (c.recency_score, c.frequency_score, c.monetary_score),
            (1, 1, 1)
        );
        assert_eq!(c.rfm_segment, RfmSegment::Lost);
        assert_eq!(c.churn_risk, ChurnRisk::Low);
    }

    #[test]
    fn test_recency_breakpoints() {
        assert_eq!(recency_score(None), 1);
        assert_eq!(recency_score(Some(0)), 5);
        assert_eq!(recency_score(Some(29)), 5);
        assert_eq!(recency_score(Some(30)), 4);
        assert_eq!(recency_score(Some(59)), 4);
        assert_eq!(recency_score(Some(60)), 3);
        assert_eq!(recency_score(Some(90)), 2);
        assert_eq!(recency_score(Some(179)), 2);
        assert_eq!(recency_score(Some(180)), 1);
    }

    #[test]
    fn test_frequency_and_monetary_breakpoints() {
        assert_eq!(frequency_score(0), 1);
        assert_eq!(frequency_score(2), 2);
        assert_eq!(frequency_score(5), 3);
        assert_eq!(frequency_score(10), 4);
        assert_eq!(frequency_score(20), 5);
        assert_eq!(monetary_score(99.99), 1);
        assert_eq!(monetary_score(100.0), 2);
        assert_eq!(monetary_score(250.0), 3);
        assert_eq!(monetary_score(500.0), 4);
        assert_eq!(monetary_score(1000.0), 5);
    }

    #[test]
    fn test_segment_labels_from_total() {
        let label = |r, f, m| {
            rfm_segment(&RfmScores {
                recency: r,
                frequency: f,
                monetary: m,
            })
        };
        assert_eq!(label(5, 4, 4), RfmSegment::Champions);
        assert_eq!(label(4, 3, 3), RfmSegment::Loyal);
        assert_eq!(label(3, 2, 2), RfmSegment::Potential);
        assert_eq!(label(2, 2, 1), RfmSegment::AtRisk);
        assert_eq!(label(2, 1, 1), RfmSegment::Lost);
    }

    #[test]
    fn test_churn_risk() {
        assert_eq!(churn_risk(Some(91), 6), ChurnRisk::High);
        assert_eq!(churn_risk(Some(91), 5), ChurnRisk::Medium);
        assert_eq!(churn_risk(Some(46), 3), ChurnRisk::Medium);
        assert_eq!(churn_risk(Some(45), 3), ChurnRisk::Low);
        assert_eq!(churn_risk(Some(300), 2), ChurnRisk::Low);
        assert_eq!(churn_risk(None, 0), ChurnRisk::Low);
    }

    #[test]
    fn test_no_orders() {
        let c = scored(0.0, 0, None);
        assert_eq!(c.average_order_value, 0.0);
        assert_eq!(c.rfm_segment, RfmSegment::Lost);
        assert_eq!(c.churn_risk, ChurnRisk::Low);
    }
}
