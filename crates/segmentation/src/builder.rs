//! Fluent builder for assembling segment drafts.

use serde_json::Value;

use crate::engine::SegmentDraft;
use crate::fields::CustomerField;
use crate::predicates::{Condition, Operator};

pub struct SegmentBuilder {
    name: String,
    description: Option<String>,
    conditions: Vec<Condition>,
    ai_generated: bool,
}

impl SegmentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            conditions: Vec::new(),
            ai_generated: false,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn ai_generated(mut self) -> Self {
        self.ai_generated = true;
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn where_eq(self, field: CustomerField, value: impl Into<Value>) -> Self {
        self.condition(Condition::new(field, Operator::Equals, value))
    }

    pub fn where_gt(self, field: CustomerField, value: impl Into<Value>) -> Self {
        self.condition(Condition::new(field, Operator::GreaterThan, value))
    }

    pub fn where_lt(self, field: CustomerField, value: impl Into<Value>) -> Self {
        self.condition(Condition::new(field, Operator::LessThan, value))
    }

    pub fn where_in<V: Into<Value>>(
        self,
        field: CustomerField,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let list: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.condition(Condition::new(field, Operator::In, list))
    }

    pub fn where_contains(self, field: CustomerField, value: impl Into<Value>) -> Self {
        self.condition(Condition::new(field, Operator::Contains, value))
    }

    pub fn build(self) -> SegmentDraft {
        SegmentDraft {
            name: self.name,
            description: self.description,
            conditions: self.conditions,
            ai_generated: self.ai_generated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_conditions_in_order() {
        let draft = SegmentBuilder::new("Lapsed VIPs")
            .description("High value, not seen lately")
            .where_contains(CustomerField::Tags, "vip")
            .where_gt(CustomerField::DaysSinceLastOrder, 90)
            .where_in(CustomerField::State, ["TX", "CA"])
            .ai_generated()
            .build();

        assert_eq!(draft.name, "Lapsed VIPs");
        assert!(draft.ai_generated);
        assert_eq!(draft.conditions.len(), 3);
        assert_eq!(draft.conditions[1].operator, Operator::GreaterThan);
        assert_eq!(draft.conditions[2].value, json!(["TX", "CA"]));
    }
}
