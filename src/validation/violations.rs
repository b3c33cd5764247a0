//! Configuration violations reported by validation.

use thiserror::Error;

/// A single problem found in a machine definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigViolation {
    #[error("No states defined")]
    NoStates,

    #[error("State '{state}' is defined more than once")]
    DuplicateState { state: String },

    #[error("State '{state}' names unknown parent '{parent}'")]
    UnknownParent { state: String, parent: String },

    #[error("State '{state}' is part of a parent cycle")]
    ParentCycle { state: String },

    #[error("Initial state not specified")]
    MissingInitialState,

    #[error("Initial state '{state}' is not defined")]
    UnknownInitialState { state: String },

    #[error("Rule {from} -> {to} starts from unknown state '{from}'")]
    UnknownRuleSource { from: String, to: String },

    #[error("Rule {from} -> {to} targets unknown state '{to}'")]
    UnknownRuleTarget { from: String, to: String },

    #[error("Condition '{condition}' lists no accepted range")]
    EmptyRanges { condition: String },

    #[error("Condition '{condition}' has inverted range [{min}, {max}]")]
    InvalidRange {
        condition: String,
        min: i64,
        max: i64,
    },

    #[error("Event definition '{name}' uses a reserved event name")]
    ReservedEventName { name: String },

    #[error("Event definition '{name}' is defined more than once")]
    DuplicateEventDefinition { name: String },
}
