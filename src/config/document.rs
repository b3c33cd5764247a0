//! On-disk JSON documents and their conversion into core types.

use crate::core::{
    Condition, EventDefinition, Operator, StateInfo, TransitionRule, TriggerMode, ValueRange,
    INTERNAL_EVENT,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `state_config.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateDocument {
    pub states: Vec<StateEntry>,
    pub initial_state: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateEntry {
    pub name: String,
    #[serde(default)]
    pub parent: String,
    /// Milliseconds, zero disables the timeout
    #[serde(default)]
    pub timeout: u64,
}

impl From<StateEntry> for StateInfo {
    fn from(entry: StateEntry) -> Self {
        StateInfo::new(entry.name)
            .with_parent(entry.parent)
            .with_timeout(Duration::from_millis(entry.timeout))
    }
}

/// `range` accepts a single pair or a list of pairs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeField {
    Single([i64; 2]),
    Multiple(Vec<[i64; 2]>),
}

impl RangeField {
    fn into_ranges(self) -> Vec<ValueRange> {
        match self {
            Self::Single([min, max]) => vec![ValueRange::new(min, max)],
            Self::Multiple(pairs) => pairs
                .into_iter()
                .map(|[min, max]| ValueRange::new(min, max))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConditionEntry {
    pub name: String,
    pub range: RangeField,
    /// Milliseconds the value must hold
    #[serde(default)]
    pub duration: u64,
}

impl From<ConditionEntry> for Condition {
    fn from(entry: ConditionEntry) -> Self {
        Condition::with_ranges(entry.name, entry.range.into_ranges())
            .sustained_for(Duration::from_millis(entry.duration))
    }
}

/// One file under `event_generate_config/`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventDocument {
    pub name: String,
    #[serde(default)]
    pub trigger_mode: TriggerMode,
    #[serde(default)]
    pub conditions_operator: Operator,
    #[serde(default)]
    pub conditions: Vec<ConditionEntry>,
}

impl From<EventDocument> for EventDefinition {
    fn from(document: EventDocument) -> Self {
        let mut definition = EventDefinition::new(document.name, document.trigger_mode);
        definition.operator = document.conditions_operator;
        definition.conditions = document.conditions.into_iter().map(Condition::from).collect();
        definition
    }
}

/// `event` accepts one name or a list of names.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventField {
    One(String),
    Many(Vec<String>),
}

/// One file under `trans_config/`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionDocument {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub event: Option<EventField>,
    #[serde(default)]
    pub conditions_operator: Operator,
    #[serde(default)]
    pub conditions: Vec<ConditionEntry>,
}

impl TransitionDocument {
    fn events(event: Option<EventField>) -> Vec<String> {
        let events: Vec<String> = match event {
            None => Vec::new(),
            Some(EventField::One(name)) => vec![name],
            Some(EventField::Many(names)) => names,
        };
        let events: Vec<String> = events.into_iter().filter(|e| !e.is_empty()).collect();
        if events.is_empty() {
            vec![INTERNAL_EVENT.to_string()]
        } else {
            events
        }
    }
}

impl From<TransitionDocument> for TransitionRule {
    fn from(document: TransitionDocument) -> Self {
        TransitionRule {
            from: document.from,
            to: document.to,
            events: TransitionDocument::events(document.event),
            conditions: document.conditions.into_iter().map(Condition::from).collect(),
            operator: document.conditions_operator,
        }
    }
}
