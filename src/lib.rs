//! Statewire: a hierarchical, condition- and event-driven state machine engine
//!
//! Statewire drives a tree of named states from two kinds of input:
//! discrete events submitted by the application, and integer condition
//! values whose changes are evaluated against range predicates. Rules are
//! indexed by `(state, event)` and searched from the current state up
//! through its ancestors. Every component runs its own worker threads, so
//! submitting an event or a value never blocks the caller.
//!
//! # Core Concepts
//!
//! - **States**: A forest of named states, each optionally timed out
//! - **Conditions**: Named integer values with inclusive range predicates,
//!   optionally required to hold for a duration
//! - **Rules**: `from → to` transitions triggered by events and guarded by conditions
//! - **Event definitions**: Synthetic events raised on edges or levels of conditions
//! - **Callbacks**: Pre-event filter and transition, exit, enter and post-event notifications
//!
//! # Example
//!
//! ```rust
//! use statewire::builder::{DefinitionBuilder, TransitionBuilder};
//! use statewire::core::Condition;
//! use statewire::FiniteStateMachine;
//! use std::time::Duration;
//!
//! let definition = DefinitionBuilder::new()
//!     .state("OFF")
//!     .state("ON")
//!     .initial("OFF")
//!     .transition(
//!         TransitionBuilder::new()
//!             .from("OFF")
//!             .to("ON")
//!             .when(Condition::new("power", 1, 100).sustained_for(Duration::from_millis(50))),
//!     )
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let machine = FiniteStateMachine::new("power");
//! machine.init(&definition).unwrap();
//! machine.start().unwrap();
//!
//! machine.set_condition_value("power", 42);
//! std::thread::sleep(Duration::from_millis(300));
//! assert_eq!(machine.current_state().as_deref(), Some("ON"));
//!
//! machine.stop();
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod error;
pub mod machine;
pub mod runtime;
pub mod validation;

// Re-export commonly used types
pub use crate::core::{
    Condition, Event, EventDefinition, MachineDefinition, StateInfo, TransitionRule, TriggerMode,
    INTERNAL_EVENT, STATE_TIMEOUT_EVENT,
};
pub use error::FsmError;
pub use machine::{Callbacks, FiniteStateMachine, MachineRegistry, StateEventHandler};
