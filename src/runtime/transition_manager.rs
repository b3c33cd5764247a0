//! Rule index keyed by `(state, event)`.

use super::{read, write};
use crate::core::TransitionRule;
use crate::error::FsmError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TransitionKey {
    state: String,
    event: String,
}

/// Multimap from `(state, event)` to the rules registered for it.
///
/// A rule is shared by every key it is indexed under. Rules under one key
/// keep their registration order so the first satisfied rule wins
/// deterministically.
///
/// # Example
///
/// ```rust
/// use statewire::core::TransitionRule;
/// use statewire::runtime::TransitionManager;
///
/// let rules = TransitionManager::new();
/// rules
///     .add_transition(TransitionRule::new("IDLE", "RUN").on("start").on("resume"))
///     .unwrap();
///
/// assert_eq!(rules.find_transition("IDLE", "start").len(), 1);
/// assert_eq!(rules.find_transition("IDLE", "resume").len(), 1);
/// assert!(rules.find_transition("RUN", "start").is_empty());
/// ```
#[derive(Debug, Default)]
pub struct TransitionManager {
    rules: RwLock<HashMap<TransitionKey, Vec<Arc<TransitionRule>>>>,
    sealed: AtomicBool,
}

impl TransitionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `rule` under `(rule.from, event)` for each of its trigger events.
    pub fn add_transition(&self, rule: TransitionRule) -> Result<(), FsmError> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(FsmError::RegistrationClosed);
        }
        let events = rule.trigger_events();
        let rule = Arc::new(rule);
        let mut rules = write(&self.rules);
        for event in events {
            let key = TransitionKey {
                state: rule.from.clone(),
                event,
            };
            rules.entry(key).or_default().push(Arc::clone(&rule));
        }
        Ok(())
    }

    /// Rules registered for exactly `(state, event)`, in registration order.
    pub fn find_transition(&self, state: &str, event: &str) -> Vec<Arc<TransitionRule>> {
        let key = TransitionKey {
            state: state.to_string(),
            event: event.to_string(),
        };
        read(&self.rules).get(&key).cloned().unwrap_or_default()
    }

    /// Number of distinct `(state, event)` keys.
    pub fn key_count(&self) -> usize {
        read(&self.rules).len()
    }

    pub fn clear(&self) {
        write(&self.rules).clear();
    }

    /// Refuse further registrations until [`unseal`](Self::unseal).
    pub(crate) fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn unseal(&self) {
        self.sealed.store(false, Ordering::SeqCst);
    }
}
