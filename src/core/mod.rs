//! Core data model of the state machine engine.
//!
//! This module holds the plain types every component shares:
//! - States and their hierarchy (`StateInfo`, `TransitionPath`)
//! - Conditions, live condition values and their evaluation
//! - Transition rules, events and synthetic event definitions
//! - The complete machine definition and the transition history
//!
//! Everything in here is free of threads and locks. The pure functions
//! (`evaluate`, `transition_path`) are what the runtime components call
//! while holding their own locks.

mod condition;
mod definition;
mod event;
mod history;
pub(crate) mod millis;
mod state;
mod transition;

pub use condition::{evaluate, Condition, ConditionInfo, ConditionValue, Evaluation, Operator, ValueRange};
pub use definition::MachineDefinition;
pub use event::{
    is_reserved_event, Event, EventDefinition, TriggerMode, INTERNAL_EVENT, RESET_SUFFIX,
    STATE_TIMEOUT_EVENT,
};
pub use history::{TransitionHistory, TransitionRecord, DEFAULT_HISTORY_CAPACITY};
pub use state::{transition_path, StateInfo, TransitionPath};
pub use transition::TransitionRule;
