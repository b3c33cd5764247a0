//! Individual validation checks, one per area of a definition.

use crate::core::{is_reserved_event, Condition, MachineDefinition};
use crate::validation::violations::ConfigViolation;
use std::collections::{HashMap, HashSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Result of a single check.
pub type Check = Validation<(), NonEmptyVec<ConfigViolation>>;

fn check(violation: Option<ConfigViolation>) -> Check {
    match violation {
        Some(violation) => Validation::fail(violation),
        None => Validation::success(()),
    }
}

fn combine(mut checks: Vec<Check>) -> Check {
    checks.insert(0, Validation::success(()));
    Validation::all_vec(checks).map(|_| ())
}

/// Unique names, resolvable parents and no parent cycles.
pub fn check_states(definition: &MachineDefinition) -> Check {
    if definition.states.is_empty() {
        return Validation::fail(ConfigViolation::NoStates);
    }

    let mut checks = Vec::new();
    let mut seen = HashSet::new();
    for state in &definition.states {
        checks.push(check((!seen.insert(state.name.as_str())).then(|| {
            ConfigViolation::DuplicateState {
                state: state.name.clone(),
            }
        })));
    }

    let parents: HashMap<&str, Option<&str>> = definition
        .states
        .iter()
        .map(|s| (s.name.as_str(), s.parent.as_deref().filter(|p| !p.is_empty())))
        .collect();

    for state in &definition.states {
        let Some(parent) = parents.get(state.name.as_str()).copied().flatten() else {
            continue;
        };
        if !parents.contains_key(parent) {
            checks.push(Validation::fail(ConfigViolation::UnknownParent {
                state: state.name.clone(),
                parent: parent.to_string(),
            }));
        } else if in_cycle(&state.name, &parents) {
            checks.push(Validation::fail(ConfigViolation::ParentCycle {
                state: state.name.clone(),
            }));
        }
    }

    combine(checks)
}

fn in_cycle(start: &str, parents: &HashMap<&str, Option<&str>>) -> bool {
    let mut visited = HashSet::new();
    let mut current = start;
    while let Some(parent) = parents.get(current).copied().flatten() {
        if parent == start {
            return true;
        }
        if !visited.insert(parent) {
            return false;
        }
        current = parent;
    }
    false
}

/// The initial state is named and defined.
pub fn check_initial_state(definition: &MachineDefinition) -> Check {
    if definition.initial_state.is_empty() {
        return Validation::fail(ConfigViolation::MissingInitialState);
    }
    check(definition.state(&definition.initial_state).is_none().then(|| {
        ConfigViolation::UnknownInitialState {
            state: definition.initial_state.clone(),
        }
    }))
}

/// Every rule starts and ends at a defined state.
pub fn check_transitions(definition: &MachineDefinition) -> Check {
    let known: HashSet<&str> = definition.states.iter().map(|s| s.name.as_str()).collect();
    let mut checks = Vec::new();
    for rule in &definition.transitions {
        if !known.contains(rule.from.as_str()) {
            checks.push(Validation::fail(ConfigViolation::UnknownRuleSource {
                from: rule.from.clone(),
                to: rule.to.clone(),
            }));
        }
        if !known.contains(rule.to.as_str()) {
            checks.push(Validation::fail(ConfigViolation::UnknownRuleTarget {
                from: rule.from.clone(),
                to: rule.to.clone(),
            }));
        }
    }
    combine(checks)
}

/// Every referenced condition lists well-formed ranges.
pub fn check_conditions(definition: &MachineDefinition) -> Check {
    let checks = definition
        .referenced_conditions()
        .flat_map(condition_checks)
        .collect();
    combine(checks)
}

fn condition_checks(condition: &Condition) -> Vec<Check> {
    if condition.ranges.is_empty() {
        return vec![Validation::fail(ConfigViolation::EmptyRanges {
            condition: condition.name.clone(),
        })];
    }
    condition
        .ranges
        .iter()
        .filter(|range| !range.is_valid())
        .map(|range| {
            Validation::fail(ConfigViolation::InvalidRange {
                condition: condition.name.clone(),
                min: range.min,
                max: range.max,
            })
        })
        .collect()
}

/// Event definitions use free, unique names.
pub fn check_event_definitions(definition: &MachineDefinition) -> Check {
    let mut checks = Vec::new();
    let mut seen = HashSet::new();
    for event in &definition.events {
        if is_reserved_event(&event.name) {
            checks.push(Validation::fail(ConfigViolation::ReservedEventName {
                name: event.name.clone(),
            }));
        }
        if !seen.insert(event.name.as_str()) {
            checks.push(Validation::fail(ConfigViolation::DuplicateEventDefinition {
                name: event.name.clone(),
            }));
        }
    }
    combine(checks)
}
