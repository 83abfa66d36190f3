//! Condition types and evaluation logic for segment rules.

use mailwise_core::{Customer, MailwiseError, MailwiseResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::CustomerField;

/// A single predicate over one customer field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: CustomerField,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startsWith")]
    StartsWith,
    #[serde(rename = "endsWith")]
    EndsWith,
    #[serde(rename = "in")]
    In,
}

impl Operator {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::LessThan
                | Operator::GreaterThanOrEqual
                | Operator::LessThanOrEqual
        )
    }
}

impl Condition {
    pub fn new(field: CustomerField, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }

    /// Check the value shape against the operator.
    pub fn validate(&self) -> MailwiseResult<()> {
        match self.operator {
            Operator::In => {
                let items = self.value.as_array().ok_or_else(|| {
                    invalid(self, "operator 'in' requires an array value")
                })?;
                if let Some(bad) = items.iter().find(|v| !is_scalar(v)) {
                    return Err(invalid(
                        self,
                        &format!("array values must be scalars, found {}", bad),
                    ));
                }
            }
            op => {
                if !is_scalar(&self.value) {
                    return Err(invalid(
                        self,
                        "value must be a string, number or boolean",
                    ));
                }
                if op.is_relational() && !to_number(Some(&self.value)).is_finite() {
                    return Err(invalid(self, "relational operators require a numeric value"));
                }
            }
        }
        Ok(())
    }
}

/// Validate every condition of a segment, reporting the first failure.
pub fn validate_conditions(conditions: &[Condition]) -> MailwiseResult<()> {
    conditions.iter().try_for_each(Condition::validate)
}

fn invalid(condition: &Condition, reason: &str) -> MailwiseError {
    MailwiseError::Validation(format!(
        "condition on '{}': {}",
        condition.field, reason
    ))
}

fn is_scalar(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Whether `customer` satisfies `condition`.
pub fn evaluate(customer: &Customer, condition: &Condition) -> bool {
    let actual = condition.field.resolve(customer);
    compare_values(actual.as_ref(), &condition.operator, &condition.value)
}

/// Apply `operator` to a resolved field value. `None` is an absent value.
pub fn compare_values(actual: Option<&Value>, operator: &Operator, expected: &Value) -> bool {
    match operator {
        Operator::Equals => strict_eq(actual, expected),
        Operator::NotEquals => !strict_eq(actual, expected),
        Operator::GreaterThan => to_number(actual) > to_number(Some(expected)),
        Operator::LessThan => to_number(actual) < to_number(Some(expected)),
        Operator::GreaterThanOrEqual => to_number(actual) >= to_number(Some(expected)),
        Operator::LessThanOrEqual => to_number(actual) <= to_number(Some(expected)),
        Operator::Contains => match actual {
            Some(Value::Array(items)) => items.iter().any(|item| strict_eq(Some(item), expected)),
            _ => string_pair(actual, expected).is_some_and(|(a, e)| a.contains(&e)),
        },
        Operator::StartsWith => {
            string_pair(actual, expected).is_some_and(|(a, e)| a.starts_with(&e))
        }
        Operator::EndsWith => string_pair(actual, expected).is_some_and(|(a, e)| a.ends_with(&e)),
        Operator::In => expected
            .as_array()
            .is_some_and(|list| list.iter().any(|item| strict_eq(actual, item))),
    }
}

/// Equality without type coercion. Numbers compare by value, so `500` and
/// `500.0` are equal while `500` and `"500"` are not.
fn strict_eq(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(Value::String(a)), Value::String(b)) => a == b,
        (Some(Value::Bool(a)), Value::Bool(b)) => a == b,
        _ => false,
    }
}

/// Numeric coercion with JavaScript `Number()` rules for the scalar cases.
/// Absent values and anything non-numeric become NaN.
fn to_number(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::String(s)) => parse_numeric_str(s),
        // Arrays coerce through their joined string form.
        Some(Value::Array(items)) => match items.as_slice() {
            [] | [Value::Null] => 0.0,
            [Value::Bool(_)] => f64::NAN,
            [single] => to_number(Some(single)),
            _ => f64::NAN,
        },
        _ => f64::NAN,
    }
}

fn parse_numeric_str(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // Rust also accepts "inf" and "nan"; JS does not.
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Lowercased string forms of both sides, or `None` if the field is absent.
fn string_pair(actual: Option<&Value>, expected: &Value) -> Option<(String, String)> {
    let a = stringify(actual?)?;
    let e = stringify(expected)?;
    Some((a.to_lowercase(), e.to_lowercase()))
}

fn stringify(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => i.to_string(),
            (_, Some(u)) => u.to_string(),
            _ => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        }),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|i| stringify(i).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailwise_core::NewCustomer;
    use serde_json::json;

    fn customer() -> Customer {
        let mut c = Customer::new(
            "owner",
            NewCustomer {
                email: "Jane.Doe@Example.com".into(),
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                state: "TX".into(),
                city: "Austin".into(),
                total_orders: 12,
                total_spent: 640.0,
                days_since_last_order: Some(20),
                tags: vec!["vip".into(), "newsletter".into()],
                ..Default::default()
            },
        );
        c.average_order_value = 640.0 / 12.0;
        c
    }

    fn check(field: CustomerField, operator: Operator, value: Value) -> bool {
        evaluate(&customer(), &Condition::new(field, operator, value))
    }

    #[test]
    fn test_equality_is_strict() {
        assert!(check(CustomerField::State, Operator::Equals, json!("TX")));
        assert!(!check(CustomerField::State, Operator::Equals, json!("tx")));
        assert!(check(CustomerField::TotalOrders, Operator::Equals, json!(12)));
        assert!(check(CustomerField::TotalSpent, Operator::Equals, json!(640)));
        assert!(!check(CustomerField::TotalOrders, Operator::Equals, json!("12")));
        assert!(check(CustomerField::TotalOrders, Operator::NotEquals, json!("12")));
    }

    #[test]
    fn test_relational_coerces_numbers() {
        assert!(check(CustomerField::TotalSpent, Operator::GreaterThan, json!(500)));
        assert!(check(CustomerField::TotalSpent, Operator::GreaterThan, json!("500")));
        assert!(!check(CustomerField::TotalSpent, Operator::LessThan, json!(500)));
        assert!(check(CustomerField::TotalOrders, Operator::GreaterThanOrEqual, json!(12)));
        assert!(check(CustomerField::TotalOrders, Operator::LessThanOrEqual, json!(12)));
        assert!(check(CustomerField::ZipCode, Operator::GreaterThanOrEqual, json!(0)));
    }

    #[test]
    fn test_relational_against_missing_field_is_false() {
        let mut c = customer();
        c.days_since_last_order = None;
        for op in [
            Operator::GreaterThan,
            Operator::LessThan,
            Operator::GreaterThanOrEqual,
            Operator::LessThanOrEqual,
        ] {
            let cond = Condition::new(CustomerField::DaysSinceLastOrder, op, json!(0));
            assert!(!evaluate(&c, &cond), "{:?} matched a missing field", op);
        }
    }

    #[test]
    fn test_contains_is_case_insensitive_substring() {
        assert!(check(CustomerField::Email, Operator::Contains, json!("example.COM")));
        assert!(check(CustomerField::TotalSpent, Operator::Contains, json!("64")));
        assert!(!check(CustomerField::Email, Operator::Contains, json!("gmail")));
    }

    #[test]
    fn test_contains_on_array_is_membership() {
        assert!(check(CustomerField::Tags, Operator::Contains, json!("vip")));
        assert!(!check(CustomerField::Tags, Operator::Contains, json!("VIP")));
        assert!(!check(CustomerField::Tags, Operator::Contains, json!("news")));
    }

    #[test]
    fn test_prefix_and_suffix() {
        assert!(check(CustomerField::FirstName, Operator::StartsWith, json!("ja")));
        assert!(check(CustomerField::Email, Operator::EndsWith, json!("@EXAMPLE.com")));
        assert!(!check(CustomerField::City, Operator::StartsWith, json!("Dallas")));
    }

    #[test]
    fn test_in_is_case_sensitive() {
        let mut c = customer();
        let cond = Condition::new(CustomerField::State, Operator::In, json!(["A", "B"]));
        c.state = "A".into();
        assert!(evaluate(&c, &cond));
        c.state = "a".into();
        assert!(!evaluate(&c, &cond));
    }

    #[test]
    fn test_string_operators_never_match_missing_field() {
        let mut c = customer();
        c.days_since_last_order = None;
        let cond = Condition::new(CustomerField::DaysSinceLastOrder, Operator::Contains, json!("un"));
        assert!(!evaluate(&c, &cond));
        let cond = Condition::new(CustomerField::DaysSinceLastOrder, Operator::NotEquals, json!(5));
        assert!(evaluate(&c, &cond));
    }

    #[test]
    fn test_wire_format() {
        let cond: Condition = serde_json::from_value(json!({
            "field": "totalSpent",
            "operator": ">=",
            "value": 100
        }))
        .unwrap();
        assert_eq!(cond.operator, Operator::GreaterThanOrEqual);
        assert_eq!(cond.field, CustomerField::TotalSpent);

        let unknown_op = serde_json::from_value::<Condition>(json!({
            "field": "state",
            "operator": "like",
            "value": "TX"
        }));
        assert!(unknown_op.is_err());
    }

    #[test]
    fn test_validation() {
        assert!(Condition::new(CustomerField::State, Operator::In, json!("TX"))
            .validate()
            .is_err());
        assert!(Condition::new(CustomerField::State, Operator::In, json!([["TX"]]))
            .validate()
            .is_err());
        assert!(Condition::new(CustomerField::State, Operator::Equals, json!(["TX"]))
            .validate()
            .is_err());
        assert!(Condition::new(CustomerField::State, Operator::Equals, Value::Null)
            .validate()
            .is_err());
        assert!(Condition::new(CustomerField::TotalSpent, Operator::GreaterThan, json!("lots"))
            .validate()
            .is_err());
        assert!(Condition::new(CustomerField::TotalSpent, Operator::GreaterThan, json!("500"))
            .validate()
            .is_ok());
        assert!(validate_conditions(&[
            Condition::new(CustomerField::State, Operator::In, json!(["TX", "CA"])),
            Condition::new(CustomerField::Tags, Operator::Contains, json!("vip")),
        ])
        .is_ok());
    }

    #[test]
    fn test_js_number_coercion() {
        assert_eq!(parse_numeric_str("  42 "), 42.0);
        assert_eq!(parse_numeric_str(""), 0.0);
        assert!(parse_numeric_str("inf").is_nan());
        assert!(parse_numeric_str("12abc").is_nan());
        assert_eq!(parse_numeric_str("1e3"), 1000.0);
        assert_eq!(to_number(Some(&json!(true))), 1.0);
        assert_eq!(to_number(Some(&json!([]))), 0.0);
        assert_eq!(to_number(Some(&json!(["5"]))), 5.0);
        assert_eq!(to_number(Some(&json!([[7]]))), 7.0);
        assert!(to_number(Some(&json!([true]))).is_nan());
        assert!(to_number(Some(&json!(["1", "2"]))).is_nan());
    }

    #[test]
    fn test_relational_on_tags_follows_array_coercion() {
        let mut single = customer();
        single.tags = vec!["5".into()];
        let gt = Condition::new(CustomerField::Tags, Operator::GreaterThan, json!(4));
        assert!(evaluate(&single, &gt));

        let mut empty = customer();
        empty.tags = Vec::new();
        let lt = Condition::new(CustomerField::Tags, Operator::LessThan, json!(1));
        assert!(evaluate(&empty, &lt));

        assert!(!evaluate(&customer(), &gt));
        assert!(!evaluate(&customer(), &lt));
    }
}
