//! Conditions, live condition values and their evaluation.
//!
//! A condition names a live integer value and lists the ranges that
//! satisfy it. A duration-qualified condition additionally requires the
//! value to have stayed unchanged for at least `duration` before it counts
//! as met.

use crate::error::FsmError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Inclusive `[min, max]` range of accepted values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: i64,
    pub max: i64,
}

impl ValueRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// A range holding exactly one value.
    pub fn exactly(value: i64) -> Self {
        Self::new(value, value)
    }

    pub fn contains(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

impl From<(i64, i64)> for ValueRange {
    fn from((min, max): (i64, i64)) -> Self {
        Self::new(min, max)
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// How the conditions of a rule or event definition are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    /// Every condition must be met
    #[default]
    And,
    /// At least one condition must be met
    Or,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

/// A named predicate over a live condition value.
///
/// # Example
///
/// ```rust
/// use statewire::core::Condition;
/// use std::time::Duration;
///
/// let power = Condition::new("power", 1, 100)
///     .or_range(200, 300)
///     .sustained_for(Duration::from_millis(1000));
///
/// assert!(power.accepts(50));
/// assert!(power.accepts(250));
/// assert!(!power.accepts(150));
/// assert!(power.is_timed());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    /// Accepted ranges, a value in any one of them satisfies the condition
    pub ranges: Vec<ValueRange>,
    /// How long the value must hold before the condition is met
    #[serde(default, with = "super::millis")]
    pub duration: Duration,
}

impl Condition {
    pub fn new(name: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            ranges: vec![ValueRange::new(min, max)],
            duration: Duration::ZERO,
        }
    }

    /// Condition met when the value equals `value`.
    pub fn equals(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, value, value)
    }

    /// Condition over an explicit set of ranges.
    pub fn with_ranges(name: impl Into<String>, ranges: Vec<ValueRange>) -> Self {
        Self {
            name: name.into(),
            ranges,
            duration: Duration::ZERO,
        }
    }

    pub fn or_range(mut self, min: i64, max: i64) -> Self {
        self.ranges.push(ValueRange::new(min, max));
        self
    }

    pub fn sustained_for(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Whether `value` falls in any accepted range.
    pub fn accepts(&self, value: i64) -> bool {
        self.ranges.iter().any(|range| range.contains(value))
    }

    pub fn is_timed(&self) -> bool {
        !self.duration.is_zero()
    }
}

/// Live value tracked for one condition name.
#[derive(Clone, Debug)]
pub struct ConditionValue {
    pub value: i64,
    /// Last time the value was written
    pub last_update: Instant,
    /// Last time the value actually changed
    pub last_changed: Instant,
    /// Set once a duration timer confirmed the current value
    pub triggered: bool,
    /// Bumped on every change, used to discard stale duration timers
    pub generation: u64,
}

impl ConditionValue {
    pub fn new(value: i64, at: Instant) -> Self {
        Self {
            value,
            last_update: at,
            last_changed: at,
            triggered: false,
            generation: 0,
        }
    }

    /// Record a write. Returns `true` when the value changed.
    pub fn write(&mut self, value: i64, at: Instant) -> bool {
        self.last_update = at;
        if self.value == value {
            return false;
        }
        self.value = value;
        self.last_changed = at;
        self.triggered = false;
        self.generation += 1;
        true
    }

    /// Time the value has held steady as of `now`.
    pub fn held_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_changed)
    }
}

/// A condition that contributed to a successful check or fired an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionInfo {
    pub name: String,
    pub value: i64,
    /// Elapsed hold time, or the configured duration for change notifications
    #[serde(with = "super::millis")]
    pub elapsed: Duration,
}

impl ConditionInfo {
    pub fn new(name: impl Into<String>, value: i64, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            value,
            elapsed,
        }
    }
}

/// Outcome of checking a list of conditions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub met: bool,
    pub matched: Vec<ConditionInfo>,
}

impl Evaluation {
    fn unmet() -> Self {
        Self::default()
    }
}

/// Evaluate `conditions` against a value table.
///
/// An empty list is always met. `And` stops at the first unmet condition
/// and discards what matched so far; `Or` stops at the first met one. A
/// name missing from `values` is an error rather than a plain miss.
///
/// # Example
///
/// ```rust
/// use statewire::core::{evaluate, Condition, ConditionValue, Operator};
/// use std::collections::HashMap;
/// use std::time::Instant;
///
/// let now = Instant::now();
/// let mut values = HashMap::new();
/// values.insert("x".to_string(), ConditionValue::new(1, now));
/// values.insert("y".to_string(), ConditionValue::new(0, now));
///
/// let conditions = vec![Condition::equals("x", 1), Condition::equals("y", 1)];
///
/// assert!(!evaluate(&conditions, Operator::And, &values, now).unwrap().met);
/// assert!(evaluate(&conditions, Operator::Or, &values, now).unwrap().met);
/// ```
pub fn evaluate(
    conditions: &[Condition],
    operator: Operator,
    values: &HashMap<String, ConditionValue>,
    now: Instant,
) -> Result<Evaluation, FsmError> {
    if conditions.is_empty() {
        return Ok(Evaluation {
            met: true,
            matched: Vec::new(),
        });
    }

    let mut matched = Vec::new();
    for condition in conditions {
        let current = values
            .get(&condition.name)
            .ok_or_else(|| FsmError::UnknownCondition(condition.name.clone()))?;

        let held = current.held_for(now);
        let met = condition.accepts(current.value) && held >= condition.duration;
        if met {
            matched.push(ConditionInfo::new(&condition.name, current.value, held));
        }

        match operator {
            Operator::And if !met => return Ok(Evaluation::unmet()),
            Operator::Or if met => return Ok(Evaluation { met, matched }),
            _ => {}
        }
    }

    Ok(Evaluation {
        met: operator == Operator::And,
        matched,
    })
}
