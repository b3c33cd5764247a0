//! Crate-wide error type.

use crate::config::ConfigError;
use crate::validation::ConfigViolation;
use thiserror::Error;

/// Errors returned by the state machine and its components.
#[derive(Debug, Error)]
pub enum FsmError {
    #[error("State '{0}' is already registered")]
    DuplicateState(String),

    #[error("State '{state}' names unregistered parent '{parent}'")]
    UnknownParent { state: String, parent: String },

    #[error("Unknown state '{0}'")]
    UnknownState(String),

    #[error("Unknown condition '{0}'")]
    UnknownCondition(String),

    #[error("Condition '{name}' has invalid range [{min}, {max}]")]
    InvalidRange { name: String, min: i64, max: i64 },

    #[error("Condition '{0}' lists no accepted range")]
    MissingRanges(String),

    #[error("Event name '{0}' is reserved by the engine")]
    ReservedEventName(String),

    #[error("Event definition '{0}' is already registered")]
    DuplicateEventDefinition(String),

    #[error("Machine definition has {} violation(s): {}", .0.len(), summarize(.0))]
    InvalidDefinition(Vec<ConfigViolation>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Machine is not initialized. Call init() before start()")]
    NotInitialized,

    #[error("Machine is already initialized")]
    AlreadyInitialized,

    #[error("Machine is already running")]
    AlreadyRunning,

    #[error("Callbacks cannot be changed while the machine is running")]
    CallbacksLocked,

    #[error("Registration is closed once the component has started")]
    RegistrationClosed,

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

fn summarize(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
