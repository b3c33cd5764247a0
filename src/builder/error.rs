//! Build errors for definition, transition and event builders.

use thiserror::Error;

/// Errors that can occur when building machine definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("No states defined. Add at least one state")]
    NoStates,

    #[error("Transition source state not specified. Call .from(state)")]
    MissingFromState,

    #[error("Transition target state not specified. Call .to(state)")]
    MissingToState,

    #[error("Event name not specified. Pass a non-empty name to EventBuilder::new")]
    MissingEventName,

    #[error("Event '{0}' has no conditions. Call .when(condition)")]
    NoEventConditions(String),
}
