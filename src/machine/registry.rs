//! Named machine instances.

use super::fsm::FiniteStateMachine;
use crate::runtime::lock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Owner of named [`FiniteStateMachine`] instances.
///
/// # Example
///
/// ```rust
/// use statewire::machine::MachineRegistry;
/// use std::sync::Arc;
///
/// let registry = MachineRegistry::new();
/// let first = registry.create("hvac");
/// let again = registry.create("hvac");
///
/// assert!(Arc::ptr_eq(&first, &again));
/// assert_eq!(registry.names(), vec!["hvac"]);
/// ```
#[derive(Debug, Default)]
pub struct MachineRegistry {
    machines: Mutex<HashMap<String, Arc<FiniteStateMachine>>>,
}

impl MachineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Machine registered as `name`, created if it does not exist yet.
    pub fn create(&self, name: &str) -> Arc<FiniteStateMachine> {
        let (machine, existed) = {
            let mut machines = lock(&self.machines);
            match machines.get(name) {
                Some(machine) => (Arc::clone(machine), true),
                None => {
                    let machine = Arc::new(FiniteStateMachine::new(name));
                    machines.insert(name.to_string(), Arc::clone(&machine));
                    (machine, false)
                }
            }
        };

        if existed {
            warn!(machine = name, "machine already exists, returning existing instance");
        } else {
            info!(machine = name, "machine created");
        }
        machine
    }

    pub fn get(&self, name: &str) -> Option<Arc<FiniteStateMachine>> {
        lock(&self.machines).get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.machines).keys().cloned().collect();
        names.sort();
        names
    }

    /// Unregister `name` and stop its machine.
    pub fn remove(&self, name: &str) -> Option<Arc<FiniteStateMachine>> {
        let machine = lock(&self.machines).remove(name)?;
        machine.stop();
        Some(machine)
    }

    /// Stop every registered machine. They stay registered.
    pub fn stop_all(&self) {
        let machines: Vec<Arc<FiniteStateMachine>> =
            lock(&self.machines).values().cloned().collect();
        for machine in machines {
            machine.stop();
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.machines).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.machines).is_empty()
    }
}
