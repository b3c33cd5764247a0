//! Events, reserved event names and synthetic event definitions.

use super::condition::{Condition, ConditionInfo, Operator};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event enqueued after every condition change. Drives rules that name no event.
pub const INTERNAL_EVENT: &str = "__INTERNAL_EVENT__";

/// Event enqueued when the current state's timeout elapses.
pub const STATE_TIMEOUT_EVENT: &str = "__STATE_TIMEOUT_EVENT__";

/// Suffix of the event an edge-mode definition emits when its conditions stop holding.
pub const RESET_SUFFIX: &str = "_RESET";

/// Whether `name` is one of the engine's reserved event names.
pub fn is_reserved_event(name: &str) -> bool {
    name == INTERNAL_EVENT || name == STATE_TIMEOUT_EVENT
}

/// An event submitted to, or generated inside, a machine.
///
/// The attached conditions describe what caused the event. They are
/// informational only and never take part in rule matching.
///
/// # Example
///
/// ```rust
/// use statewire::core::{ConditionInfo, Event};
/// use std::time::Duration;
///
/// let event = Event::new("door_open")
///     .with_conditions(vec![ConditionInfo::new("door", 1, Duration::from_millis(200))]);
///
/// assert_eq!(event.name(), "door_open");
/// assert_eq!(event.to_string(), "door_open [door=1 (sustain 200 ms)]");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    conditions: Vec<ConditionInfo>,
    /// State whose timeout produced this event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin_state: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions: Vec::new(),
            origin_state: None,
        }
    }

    pub fn with_conditions(mut self, conditions: Vec<ConditionInfo>) -> Self {
        self.conditions = conditions;
        self
    }

    /// The catch-all event carrying the condition change that caused it.
    pub fn internal(change: ConditionInfo) -> Self {
        Self::new(INTERNAL_EVENT).with_conditions(vec![change])
    }

    /// Timeout event raised for `state`.
    pub fn state_timeout(state: impl Into<String>) -> Self {
        Self {
            name: STATE_TIMEOUT_EVENT.to_string(),
            conditions: Vec::new(),
            origin_state: Some(state.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn conditions(&self) -> &[ConditionInfo] {
        &self.conditions
    }

    /// Value carried for `condition`, if the event mentions it.
    pub fn condition_value(&self, condition: &str) -> Option<i64> {
        self.conditions
            .iter()
            .find(|info| info.name == condition)
            .map(|info| info.value)
    }

    pub fn origin_state(&self) -> Option<&str> {
        self.origin_state.as_deref()
    }

    pub fn is_internal(&self) -> bool {
        self.name == INTERNAL_EVENT
    }

    pub fn is_state_timeout(&self) -> bool {
        self.name == STATE_TIMEOUT_EVENT
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.conditions.is_empty() {
            return Ok(());
        }
        f.write_str(" [")?;
        for (index, info) in self.conditions.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", info.name, info.value)?;
            if !info.elapsed.is_zero() {
                write!(f, " (sustain {} ms)", info.elapsed.as_millis())?;
            }
        }
        f.write_str("]")
    }
}

/// How a synthetic event definition fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Fire once when the conditions start holding, and `<name>_RESET` when they stop
    #[default]
    Edge,
    /// Fire on every check that finds the conditions holding
    Level,
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edge => f.write_str("edge"),
            Self::Level => f.write_str("level"),
        }
    }
}

/// Generator of a named event derived from condition values.
///
/// Each definition owns a same-named 0/1 tracking value, which records
/// whether its conditions held at the previous check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    #[serde(default)]
    pub trigger_mode: TriggerMode,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub operator: Operator,
}

impl EventDefinition {
    pub fn new(name: impl Into<String>, trigger_mode: TriggerMode) -> Self {
        Self {
            name: name.into(),
            trigger_mode,
            conditions: Vec::new(),
            operator: Operator::And,
        }
    }

    /// Name of the event emitted on the falling edge.
    pub fn reset_event_name(&self) -> String {
        format!("{}{}", self.name, RESET_SUFFIX)
    }
}
