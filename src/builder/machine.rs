//! Builder for complete machine definitions.

use crate::builder::error::BuildError;
use crate::builder::event::EventBuilder;
use crate::builder::transition::TransitionBuilder;
use crate::core::{EventDefinition, MachineDefinition, StateInfo, TransitionRule};
use std::time::Duration;

/// Builder for constructing a [`MachineDefinition`] with a fluent API.
///
/// Only the presence of states and an initial state is checked here;
/// structural checks run when the definition is handed to the machine.
///
/// # Example
///
/// ```rust
/// use statewire::builder::{DefinitionBuilder, TransitionBuilder};
/// use statewire::core::Condition;
///
/// let definition = DefinitionBuilder::new()
///     .state("OFF")
///     .state("ON")
///     .child("ACTIVE", "ON")
///     .initial("OFF")
///     .transition(
///         TransitionBuilder::new()
///             .from("OFF")
///             .to("ACTIVE")
///             .when(Condition::new("power", 1, 100)),
///     )
///     .unwrap()
///     .build()
///     .unwrap();
///
/// assert_eq!(definition.states.len(), 3);
/// assert_eq!(definition.state("ACTIVE").unwrap().parent.as_deref(), Some("ON"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct DefinitionBuilder {
    states: Vec<StateInfo>,
    initial: Option<String>,
    transitions: Vec<TransitionRule>,
    events: Vec<EventDefinition>,
}

impl DefinitionBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root state.
    pub fn state(self, name: impl Into<String>) -> Self {
        self.state_info(StateInfo::new(name))
    }

    /// Add a state below `parent`.
    pub fn child(self, name: impl Into<String>, parent: impl Into<String>) -> Self {
        self.state_info(StateInfo::new(name).with_parent(parent))
    }

    /// Add a root state with a timeout.
    pub fn timed_state(self, name: impl Into<String>, timeout: Duration) -> Self {
        self.state_info(StateInfo::new(name).with_timeout(timeout))
    }

    /// Add a fully described state.
    pub fn state_info(mut self, state: StateInfo) -> Self {
        self.states.push(state);
        self
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: impl Into<String>) -> Self {
        self.initial = Some(state.into());
        self
    }

    /// Add a transition using a builder.
    /// Returns an error if the builder fails validation.
    pub fn transition(mut self, builder: TransitionBuilder) -> Result<Self, BuildError> {
        self.transitions.push(builder.build()?);
        Ok(self)
    }

    /// Add a pre-built rule.
    pub fn add_transition(mut self, rule: TransitionRule) -> Self {
        self.transitions.push(rule);
        self
    }

    /// Add an event definition using a builder.
    pub fn event(mut self, builder: EventBuilder) -> Result<Self, BuildError> {
        self.events.push(builder.build()?);
        Ok(self)
    }

    /// Add a pre-built event definition.
    pub fn add_event(mut self, definition: EventDefinition) -> Self {
        self.events.push(definition);
        self
    }

    /// Build the definition.
    pub fn build(self) -> Result<MachineDefinition, BuildError> {
        if self.states.is_empty() {
            return Err(BuildError::NoStates);
        }
        let initial_state = self.initial.ok_or(BuildError::MissingInitialState)?;

        Ok(MachineDefinition {
            states: self.states,
            initial_state,
            transitions: self.transitions,
            events: self.events,
        })
    }
}
