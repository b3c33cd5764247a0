//! Transition history tracking.
//!
//! Every committed transition is recorded with the states it exited and
//! entered. The history is bounded: once full, the oldest record is
//! dropped for each new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Number of records kept when no capacity is given.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// Record of a single committed transition.
///
/// # Example
///
/// ```rust
/// use statewire::core::TransitionRecord;
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     from: "OFF".to_string(),
///     to: "ON".to_string(),
///     event: "power_on".to_string(),
///     exited: vec!["OFF".to_string()],
///     entered: vec!["ON".to_string()],
///     timestamp: Utc::now(),
/// };
///
/// assert!(!record.is_self_transition());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State that was current when the event arrived
    pub from: String,
    /// State committed by the transition
    pub to: String,
    /// Name of the event that triggered the transition
    pub event: String,
    /// States exited, most specific first
    pub exited: Vec<String>,
    /// States entered, least specific first
    pub entered: Vec<String>,
    /// When the transition was committed
    pub timestamp: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn is_self_transition(&self) -> bool {
        self.from == self.to
    }
}

/// Bounded, ordered history of committed transitions.
///
/// # Example
///
/// ```rust
/// use statewire::core::{TransitionHistory, TransitionRecord};
/// use chrono::Utc;
///
/// let mut history = TransitionHistory::new();
/// for (from, to) in [("Start", "Middle"), ("Middle", "End")] {
///     history.record(TransitionRecord {
///         from: from.to_string(),
///         to: to.to_string(),
///         event: "next".to_string(),
///         exited: vec![from.to_string()],
///         entered: vec![to.to_string()],
///         timestamp: Utc::now(),
///     });
/// }
///
/// assert_eq!(history.path(), vec!["Start", "Middle", "End"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionHistory {
    capacity: usize,
    records: VecDeque<TransitionRecord>,
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a history keeping at most `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
        }
    }

    /// Append a record, dropping the oldest one when full.
    pub fn record(&mut self, record: TransitionRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Get the path of states traversed.
    ///
    /// Returns the `from` state of the oldest record, then the `to` state
    /// of each record in order.
    pub fn path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(first) = self.records.front() {
            path.push(first.from.as_str());
        }
        path.extend(self.records.iter().map(|r| r.to.as_str()));
        path
    }

    /// Time between the oldest and newest record, `None` when empty.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// Records in commit order.
    pub fn transitions(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
