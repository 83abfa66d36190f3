//! Deterministic demo customers for new accounts and local development.

use mailwise_core::{Customer, NewCustomer};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::scoring::score_customer;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Carlos", "Maria", "Wei", "Aisha", "Priya", "Diego",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Wilson", "Anderson", "Thomas", "Taylor", "Moore", "Lee",
    "Nguyen", "Patel",
];

/// (state, cities, zip prefix)
const LOCATIONS: &[(&str, &[&str], &str)] = &[
    ("TX", &["Austin", "Dallas", "Houston", "San Antonio"], "7"),
    ("CA", &["Los Angeles", "San Francisco", "San Diego", "Sacramento"], "9"),
    ("NY", &["New York", "Buffalo", "Rochester"], "1"),
    ("FL", &["Miami", "Orlando", "Tampa"], "3"),
    ("IL", &["Chicago", "Springfield"], "6"),
    ("WA", &["Seattle", "Spokane", "Tacoma"], "9"),
    ("CO", &["Denver", "Boulder"], "8"),
    ("GA", &["Atlanta", "Savannah"], "3"),
];

const STREETS: &[&str] = &["Main St", "Oak Ave", "Maple Dr", "Cedar Ln", "Elm St", "Park Blvd"];

const TAGS: &[&str] = &["newsletter", "vip", "wholesale", "mobile", "referral", "holiday"];

/// Generate `count` scored customers for `owner_id`. The same `seed`
/// always yields the same purchase data and emails.
pub fn generate_customers(owner_id: &str, count: usize, seed: u64) -> Vec<Customer> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let mut customer = Customer::new(owner_id, random_customer(&mut rng, i));
            score_customer(&mut customer);
            customer
        })
        .collect()
}

fn random_customer(rng: &mut StdRng, index: usize) -> NewCustomer {
    let first = pick(rng, FIRST_NAMES);
    let last = pick(rng, LAST_NAMES);
    let (state, cities, zip_prefix) = LOCATIONS[rng.gen_range(0..LOCATIONS.len())];
    let city = pick(rng, cities);

    // Roughly one in ten customers signed up but never ordered.
    let total_orders: u32 = if rng.gen_bool(0.1) {
        0
    } else {
        // Skew toward few orders with a long tail of repeat buyers.
        let base: f64 = rng.gen_range(0.0..1.0);
        1 + (base * base * 35.0) as u32
    };

    let (total_spent, days_since_last_order) = if total_orders == 0 {
        (0.0, None)
    } else {
        let aov: f64 = rng.gen_range(15.0..160.0);
        let spent = (total_orders as f64 * aov * 100.0).round() / 100.0;
        (spent, Some(rng.gen_range(0..365)))
    };

    let tag_count = rng.gen_range(0..=2);
    let tags = TAGS
        .choose_multiple(rng, tag_count)
        .map(|t| t.to_string())
        .collect();

    NewCustomer {
        email: format!(
            "{}.{}{}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            index
        ),
        first_name: first.to_string(),
        last_name: last.to_string(),
        address: format!("{} {}", rng.gen_range(100..9999), pick(rng, STREETS)),
        city: city.to_string(),
        state: state.to_string(),
        zip_code: format!("{}{:04}", zip_prefix, rng.gen_range(0..10_000)),
        country: "US".to_string(),
        total_orders,
        total_spent,
        days_since_last_order,
        tags,
    }
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate_customers("owner", 50, 11);
        let b = generate_customers("owner", 50, 11);
        let emails_a: Vec<_> = a.iter().map(|c| (&c.email, c.total_spent)).collect();
        let emails_b: Vec<_> = b.iter().map(|c| (&c.email, c.total_spent)).collect();
        assert_eq!(emails_a, emails_b);
    }

    #[test]
    fn test_generated_customers_are_scored_and_unique() {
        let customers = generate_customers("owner", 1000, 3);
        assert_eq!(customers.len(), 1000);
        let emails: HashSet<_> = customers.iter().map(|c| c.email.clone()).collect();
        assert_eq!(emails.len(), 1000);
        assert!(customers.iter().any(|c| c.state == "TX"));
        assert!(customers.iter().any(|c| c.days_since_last_order.is_none()));
        assert!(customers.iter().any(|c| c.total_spent > 500.0));
        for c in &customers {
            assert!((1..=5).contains(&c.recency_score));
            assert_eq!(c.total_orders == 0, c.days_since_last_order.is_none());
            assert_eq!(c.owner_id, "owner");
        }
    }
}
