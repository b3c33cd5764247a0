//! Complete, inert description of a machine.

use super::condition::Condition;
use super::event::EventDefinition;
use super::state::StateInfo;
use super::transition::TransitionRule;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Everything needed to initialize a machine: states, the initial state,
/// transition rules and synthetic event definitions.
///
/// Definitions are produced by the builders or the config loader and
/// consumed by `FiniteStateMachine::init`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDefinition {
    pub states: Vec<StateInfo>,
    pub initial_state: String,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
}

impl MachineDefinition {
    pub fn state(&self, name: &str) -> Option<&StateInfo> {
        self.states.iter().find(|s| s.name == name)
    }

    /// States ordered so every parent precedes its children.
    ///
    /// Relative declaration order is kept otherwise. States whose parent
    /// never resolves (unknown parent or a cycle) come last, in
    /// declaration order.
    pub fn states_parent_first(&self) -> Vec<&StateInfo> {
        let mut placed: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::with_capacity(self.states.len());
        let mut pending: Vec<&StateInfo> = self.states.iter().collect();

        loop {
            let before = pending.len();
            pending.retain(|state| {
                let ready = state
                    .parent
                    .as_deref()
                    .filter(|parent| !parent.is_empty())
                    .map_or(true, |parent| placed.contains(parent));
                if ready {
                    placed.insert(state.name.as_str());
                    ordered.push(*state);
                }
                !ready
            });
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        ordered.extend(pending);
        ordered
    }

    /// Every condition referenced by a rule or an event definition.
    pub fn referenced_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.transitions
            .iter()
            .flat_map(|rule| rule.conditions.iter())
            .chain(self.events.iter().flat_map(|def| def.conditions.iter()))
    }
}
