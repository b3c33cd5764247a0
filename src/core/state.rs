//! Hierarchical state descriptions and exit/enter path computation.
//!
//! States are identified by name. A state has at most one parent, and the
//! parent links form a forest. Moving between two states exits every state
//! below their lowest common ancestor on the source side (leaf first) and
//! enters every state below it on the target side (root first).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registration record for a single state.
///
/// # Example
///
/// ```rust
/// use statewire::core::StateInfo;
/// use std::time::Duration;
///
/// let active = StateInfo::new("ACTIVE")
///     .with_parent("ON")
///     .with_timeout(Duration::from_millis(500));
///
/// assert_eq!(active.parent.as_deref(), Some("ON"));
/// assert!(active.has_timeout());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    /// Unique state name
    pub name: String,
    /// Parent state, `None` for a root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Child states, in registration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// Timeout while this state is current, zero disables it
    #[serde(default, with = "super::millis")]
    pub timeout: Duration,
}

impl StateInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            timeout: Duration::ZERO,
        }
    }

    /// Set the parent state. An empty name means no parent.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        self.parent = if parent.is_empty() { None } else { Some(parent) };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_timeout(&self) -> bool {
        !self.timeout.is_zero()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// States to exit and enter when moving between two states.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPath {
    /// States to exit, most specific first
    pub exit: Vec<String>,
    /// States to enter, least specific first
    pub enter: Vec<String>,
}

impl TransitionPath {
    /// True when the transition neither exits nor enters anything.
    pub fn is_empty(&self) -> bool {
        self.exit.is_empty() && self.enter.is_empty()
    }
}

/// Compute the exit and enter lists between two lineages.
///
/// Each lineage is ordered from the state itself up to its root
/// (child-to-parent). The chains are compared from the root end inward to
/// find the lowest common ancestor. Moving a state to itself yields an
/// empty path.
///
/// # Example
///
/// ```rust
/// use statewire::core::transition_path;
///
/// let from = ["A1a", "A1", "A"];
/// let to = ["A2a", "A2", "A"];
/// let path = transition_path(&from, &to);
///
/// assert_eq!(path.exit, vec!["A1a", "A1"]);
/// assert_eq!(path.enter, vec!["A2", "A2a"]);
/// ```
pub fn transition_path<S: AsRef<str>>(from: &[S], to: &[S]) -> TransitionPath {
    let shared = from
        .iter()
        .rev()
        .zip(to.iter().rev())
        .take_while(|(a, b)| a.as_ref() == b.as_ref())
        .count();

    let exit = from[..from.len() - shared]
        .iter()
        .map(|s| s.as_ref().to_string())
        .collect();
    let enter = to[..to.len() - shared]
        .iter()
        .rev()
        .map(|s| s.as_ref().to_string())
        .collect();

    TransitionPath { exit, enter }
}
