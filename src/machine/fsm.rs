//! The state machine facade.

use super::callbacks::{Callbacks, StateEventHandler};
use super::lifecycle::Lifecycle;
use crate::config;
use crate::core::{Event, MachineDefinition, TransitionHistory, TransitionPath};
use crate::error::FsmError;
use crate::runtime::{lock, ConditionManager, EventHandler, StateManager, TransitionManager};
use crate::validation;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info, info_span, Span};

/// A hierarchical, condition- and event-driven state machine.
///
/// The machine wires a [`StateManager`], a [`ConditionManager`], a
/// [`TransitionManager`] and an [`EventHandler`] together and drives
/// them through `Created → Initialized → Running → Stopped`.
///
/// Events and condition values may be submitted from any thread at any
/// stage. Before `start` they are buffered and processed once running.
///
/// # Example
///
/// ```rust
/// use statewire::builder::DefinitionBuilder;
/// use statewire::core::TransitionRule;
/// use statewire::machine::FiniteStateMachine;
///
/// let definition = DefinitionBuilder::new()
///     .state("OFF")
///     .state("ON")
///     .initial("OFF")
///     .add_transition(TransitionRule::new("OFF", "ON").on("switch"))
///     .build()
///     .unwrap();
///
/// let machine = FiniteStateMachine::new("lamp");
/// machine.init(&definition).unwrap();
/// assert_eq!(machine.current_state().as_deref(), Some("OFF"));
/// ```
pub struct FiniteStateMachine {
    name: String,
    /// Serializes init, start and stop
    control: Mutex<()>,
    lifecycle: Mutex<Lifecycle>,
    callbacks: Mutex<Callbacks>,
    states: Arc<StateManager>,
    conditions: Arc<ConditionManager>,
    transitions: Arc<TransitionManager>,
    events: Arc<EventHandler>,
    span: Span,
}

impl FiniteStateMachine {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let span = info_span!("fsm", name = %name);
        let states = Arc::new(StateManager::new(span.clone()));
        let conditions = Arc::new(ConditionManager::new(span.clone()));
        let transitions = Arc::new(TransitionManager::new());
        let events = Arc::new(EventHandler::new(
            Arc::clone(&states),
            Arc::clone(&conditions),
            Arc::clone(&transitions),
            span.clone(),
        ));

        Self {
            name,
            control: Mutex::new(()),
            lifecycle: Mutex::new(Lifecycle::Created),
            callbacks: Mutex::new(Callbacks::default()),
            states,
            conditions,
            transitions,
            events,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *lock(&self.lifecycle)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle().is_running()
    }

    /// Validate `definition` and register it with the components.
    ///
    /// Every configuration problem is reported at once as
    /// [`FsmError::InvalidDefinition`]; nothing is registered in that case.
    pub fn init(&self, definition: &MachineDefinition) -> Result<(), FsmError> {
        let result = self.register(definition);
        let _entered = self.span.enter();
        match &result {
            Ok(()) => info!(
                states = definition.states.len(),
                rules = definition.transitions.len(),
                event_definitions = definition.events.len(),
                initial = %definition.initial_state,
                "machine initialized"
            ),
            Err(err) => error!(error = %err, "machine initialization failed"),
        }
        result
    }

    fn register(&self, definition: &MachineDefinition) -> Result<(), FsmError> {
        let _control = lock(&self.control);
        if self.lifecycle() != Lifecycle::Created {
            return Err(FsmError::AlreadyInitialized);
        }

        let violations = validation::violations(definition);
        if !violations.is_empty() {
            return Err(FsmError::InvalidDefinition(violations));
        }

        for state in definition.states_parent_first() {
            self.states.add_state_info(state.clone())?;
        }
        for condition in definition.referenced_conditions() {
            self.conditions.add_condition(condition)?;
        }
        for rule in &definition.transitions {
            self.transitions.add_transition(rule.clone())?;
        }
        for event in &definition.events {
            self.events.add_event_definition(event.clone())?;
        }
        self.states.set_state(&definition.initial_state)?;

        self.set_lifecycle(Lifecycle::Initialized);
        Ok(())
    }

    /// Load a configuration directory (or its state file) and initialize from it.
    pub fn init_from_path(&self, path: impl AsRef<Path>) -> Result<(), FsmError> {
        let definition = config::load(path)?;
        self.init(&definition)
    }

    /// Start every worker.
    ///
    /// Fails with [`FsmError::NotInitialized`] before `init` and with
    /// [`FsmError::AlreadyRunning`] when running. A stopped machine can be
    /// started again.
    pub fn start(&self) -> Result<(), FsmError> {
        let result = self.start_components();
        let _entered = self.span.enter();
        match &result {
            Ok(()) => info!("machine started"),
            Err(err) => error!(error = %err, "machine failed to start"),
        }
        result
    }

    fn start_components(&self) -> Result<(), FsmError> {
        let _control = lock(&self.control);
        match self.lifecycle() {
            Lifecycle::Created => return Err(FsmError::NotInitialized),
            Lifecycle::Running => return Err(FsmError::AlreadyRunning),
            Lifecycle::Initialized | Lifecycle::Stopped => {}
        }

        let callbacks = lock(&self.callbacks).clone();
        self.events.set_handler(Arc::new(callbacks))?;
        self.transitions.seal();

        let started = self
            .states
            .start()
            .and_then(|_| self.conditions.start())
            .and_then(|_| self.events.start());
        if let Err(err) = started {
            self.stop_components();
            return Err(err);
        }

        self.set_lifecycle(Lifecycle::Running);
        Ok(())
    }

    /// Stop and join every worker. Calling it again is a no-op.
    ///
    /// Queued events and condition updates are kept and processed after
    /// a restart.
    pub fn stop(&self) {
        {
            let _control = lock(&self.control);
            if !self.is_running() {
                return;
            }
            self.set_lifecycle(Lifecycle::Stopped);
            self.stop_components();
        }
        let _entered = self.span.enter();
        info!("machine stopped");
    }

    fn set_lifecycle(&self, stage: Lifecycle) {
        *lock(&self.lifecycle) = stage;
    }

    fn stop_components(&self) {
        self.events.stop();
        self.conditions.stop();
        self.states.stop();
        self.transitions.unseal();
    }

    /// Queue an event. Never blocks.
    pub fn handle_event(&self, event: impl Into<Event>) {
        self.events.handle_event(event.into());
    }

    /// Queue a new condition value. Never blocks.
    pub fn set_condition_value(&self, name: &str, value: i64) {
        self.conditions.set_condition_value(name, value);
    }

    /// Live value of a condition, 0 when unknown.
    pub fn condition_value(&self, name: &str) -> i64 {
        self.conditions.condition_value(name)
    }

    pub fn current_state(&self) -> Option<String> {
        self.states.current_state()
    }

    /// `state` followed by its ancestors up to the root.
    pub fn state_hierarchy(&self, state: &str) -> Vec<String> {
        self.states.state_hierarchy(state)
    }

    /// States exited and entered when moving from `from` to `to`.
    pub fn transition_path(&self, from: &str, to: &str) -> TransitionPath {
        self.states.transition_path(from, to)
    }

    /// Snapshot of the committed transitions.
    pub fn history(&self) -> TransitionHistory {
        self.events.history()
    }

    pub fn set_pre_event_callback<F>(&self, callback: F) -> Result<(), FsmError>
    where
        F: Fn(&str, &Event) -> bool + Send + Sync + 'static,
    {
        self.update_callbacks(|callbacks| callbacks.pre_event(callback))
    }

    pub fn set_transition_callback<F>(&self, callback: F) -> Result<(), FsmError>
    where
        F: Fn(&[String], &Event, &[String]) + Send + Sync + 'static,
    {
        self.update_callbacks(|callbacks| callbacks.transition(callback))
    }

    pub fn set_exit_state_callback<F>(&self, callback: F) -> Result<(), FsmError>
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.update_callbacks(|callbacks| callbacks.exit_state(callback))
    }

    pub fn set_enter_state_callback<F>(&self, callback: F) -> Result<(), FsmError>
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.update_callbacks(|callbacks| callbacks.enter_state(callback))
    }

    pub fn set_post_event_callback<F>(&self, callback: F) -> Result<(), FsmError>
    where
        F: Fn(&Event, bool) + Send + Sync + 'static,
    {
        self.update_callbacks(|callbacks| callbacks.post_event(callback))
    }

    /// Use `handler` for every role without a closure callback.
    pub fn set_handler(&self, handler: Arc<dyn StateEventHandler>) -> Result<(), FsmError> {
        self.update_callbacks(|callbacks| callbacks.delegate_to(handler))
    }

    /// Replace the whole callback set.
    pub fn set_callbacks(&self, callbacks: Callbacks) -> Result<(), FsmError> {
        self.update_callbacks(|_| callbacks)
    }

    fn update_callbacks<F>(&self, update: F) -> Result<(), FsmError>
    where
        F: FnOnce(Callbacks) -> Callbacks,
    {
        let _control = lock(&self.control);
        if self.is_running() {
            return Err(FsmError::CallbacksLocked);
        }
        let mut callbacks = lock(&self.callbacks);
        *callbacks = update(std::mem::take(&mut *callbacks));
        Ok(())
    }
}

impl Drop for FiniteStateMachine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FiniteStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiniteStateMachine")
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle())
            .field("current_state", &self.current_state())
            .finish_non_exhaustive()
    }
}
