//! Builder for transition rules.

use crate::builder::error::BuildError;
use crate::core::{Condition, Operator, TransitionRule};

/// Builder for constructing transition rules with a fluent API.
#[derive(Clone, Debug, Default)]
pub struct TransitionBuilder {
    from: Option<String>,
    to: Option<String>,
    events: Vec<String>,
    conditions: Vec<Condition>,
    operator: Operator,
}

impl TransitionBuilder {
    /// Create a new transition builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source state (required).
    pub fn from(mut self, state: impl Into<String>) -> Self {
        self.from = Some(state.into());
        self
    }

    /// Set the target state (required).
    pub fn to(mut self, state: impl Into<String>) -> Self {
        self.to = Some(state.into());
        self
    }

    /// Listen for `event`. Without any event the rule listens for internal events.
    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    /// Add a condition (optional).
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Met when any condition holds.
    pub fn any(mut self) -> Self {
        self.operator = Operator::Or;
        self
    }

    /// Met when every condition holds (the default).
    pub fn all(mut self) -> Self {
        self.operator = Operator::And;
        self
    }

    /// Build the rule.
    pub fn build(self) -> Result<TransitionRule, BuildError> {
        let from = self.from.ok_or(BuildError::MissingFromState)?;
        let to = self.to.ok_or(BuildError::MissingToState)?;

        Ok(TransitionRule {
            from,
            to,
            events: self.events,
            conditions: self.conditions,
            operator: self.operator,
        })
    }
}
