//! Transition rules.

use super::condition::{Condition, Operator};
use super::event::INTERNAL_EVENT;
use serde::{Deserialize, Serialize};

/// Rule moving the machine from `from` to `to` when one of `events`
/// arrives and the conditions hold.
///
/// A rule without events listens for [`INTERNAL_EVENT`], which is raised
/// after every condition change.
///
/// # Example
///
/// ```rust
/// use statewire::core::{Condition, TransitionRule, INTERNAL_EVENT};
///
/// let rule = TransitionRule::new("OFF", "ON")
///     .with_condition(Condition::new("power", 1, 100));
///
/// assert_eq!(rule.trigger_events(), vec![INTERNAL_EVENT.to_string()]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub operator: Operator,
}

impl TransitionRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            events: Vec::new(),
            conditions: Vec::new(),
            operator: Operator::And,
        }
    }

    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    /// Events this rule is indexed under.
    ///
    /// Empty names are ignored and duplicates collapse. When nothing is
    /// left the rule listens for [`INTERNAL_EVENT`].
    pub fn trigger_events(&self) -> Vec<String> {
        let mut events: Vec<String> = Vec::new();
        for event in self.events.iter().filter(|e| !e.is_empty()) {
            if !events.contains(event) {
                events.push(event.clone());
            }
        }
        if events.is_empty() {
            events.push(INTERNAL_EVENT.to_string());
        }
        events
    }
}
