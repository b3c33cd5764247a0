//! Builder for synthetic event definitions.

use crate::builder::error::BuildError;
use crate::core::{Condition, EventDefinition, Operator, TriggerMode};

/// Builder for event definitions. Edge-triggered with AND semantics unless told otherwise.
#[derive(Clone, Debug)]
pub struct EventBuilder {
    name: String,
    trigger_mode: TriggerMode,
    conditions: Vec<Condition>,
    operator: Operator,
}

impl EventBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trigger_mode: TriggerMode::Edge,
            conditions: Vec::new(),
            operator: Operator::And,
        }
    }

    /// Fire once on the rising edge and `<name>_RESET` on the falling edge.
    pub fn edge(mut self) -> Self {
        self.trigger_mode = TriggerMode::Edge;
        self
    }

    /// Fire on every check that finds the conditions holding.
    pub fn level(mut self) -> Self {
        self.trigger_mode = TriggerMode::Level;
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn any(mut self) -> Self {
        self.operator = Operator::Or;
        self
    }

    pub fn build(self) -> Result<EventDefinition, BuildError> {
        if self.name.is_empty() {
            return Err(BuildError::MissingEventName);
        }
        if self.conditions.is_empty() {
            return Err(BuildError::NoEventConditions(self.name));
        }

        let mut definition = EventDefinition::new(self.name, self.trigger_mode);
        definition.conditions = self.conditions;
        definition.operator = self.operator;
        Ok(definition)
    }
}
