//! Validation of machine definitions before they are registered.
//!
//! Checks use Stillwater's `Validation` type so that ALL violations are
//! reported in one pass instead of stopping at the first one.
//!
//! # Example
//!
//! ```rust
//! use statewire::core::{MachineDefinition, StateInfo, TransitionRule};
//! use statewire::validation::{validate, violations, ConfigViolation};
//!
//! let definition = MachineDefinition {
//!     states: vec![StateInfo::new("A"), StateInfo::new("A")],
//!     initial_state: "Missing".to_string(),
//!     transitions: vec![TransitionRule::new("A", "Nowhere")],
//!     events: Vec::new(),
//! };
//!
//! assert!(validate(&definition).is_failure());
//! assert_eq!(violations(&definition).len(), 3);
//! ```

pub mod rules;
pub mod violations;

pub use violations::ConfigViolation;

use crate::core::MachineDefinition;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Run every check against `definition`, accumulating all violations.
pub fn validate(definition: &MachineDefinition) -> Validation<(), NonEmptyVec<ConfigViolation>> {
    let checks = vec![
        rules::check_states(definition),
        rules::check_initial_state(definition),
        rules::check_transitions(definition),
        rules::check_conditions(definition),
        rules::check_event_definitions(definition),
    ];
    Validation::all_vec(checks).map(|_| ())
}

/// Every violation in `definition`, empty when it is valid.
pub fn violations(definition: &MachineDefinition) -> Vec<ConfigViolation> {
    match validate(definition) {
        Validation::Success(_) => Vec::new(),
        Validation::Failure(errors) => errors.iter().cloned().collect(),
    }
}
