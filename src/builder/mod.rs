//! Builder API for ergonomic machine definitions.
//!
//! This module provides fluent builders for states, transition rules and
//! event definitions, plus shorthands for the most common rule shapes.

pub mod error;
pub mod event;
pub mod machine;
pub mod transition;

pub use error::BuildError;
pub use event::EventBuilder;
pub use machine::DefinitionBuilder;
pub use transition::TransitionBuilder;

use crate::core::{Condition, TransitionRule};

/// Rule taken whenever `event` arrives in `from`.
///
/// # Example
///
/// ```
/// use statewire::builder::on_event;
///
/// let rule = on_event("OFF", "ON", "switch");
/// assert_eq!(rule.trigger_events(), vec!["switch".to_string()]);
/// ```
pub fn on_event(
    from: impl Into<String>,
    to: impl Into<String>,
    event: impl Into<String>,
) -> TransitionRule {
    TransitionRule::new(from, to).on(event)
}

/// Rule taken on a condition change once `condition` holds.
///
/// # Example
///
/// ```
/// use statewire::builder::when_condition;
/// use statewire::core::{Condition, INTERNAL_EVENT};
///
/// let rule = when_condition("OFF", "ON", Condition::new("power", 1, 100));
/// assert_eq!(rule.trigger_events(), vec![INTERNAL_EVENT.to_string()]);
/// ```
pub fn when_condition(
    from: impl Into<String>,
    to: impl Into<String>,
    condition: Condition,
) -> TransitionRule {
    TransitionRule::new(from, to).with_condition(condition)
}
