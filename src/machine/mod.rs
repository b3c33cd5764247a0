//! The public state machine facade.
//!
//! [`FiniteStateMachine`] owns the runtime components and the callback
//! set; [`MachineRegistry`] keeps named instances.

mod callbacks;
mod fsm;
mod lifecycle;
mod registry;

pub use callbacks::{
    Callbacks, DefaultHandler, PostEventFn, PreEventFn, StateEventHandler, StatesFn, TransitionFn,
};
pub use fsm::FiniteStateMachine;
pub use lifecycle::Lifecycle;
pub use registry::MachineRegistry;
