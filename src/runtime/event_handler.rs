//! Event processing and synthetic event generation.
//!
//! Two workers live here. The event worker takes events one at a time,
//! finds the first satisfied rule walking from the current state up
//! through its ancestors, and commits the transition. The trigger worker
//! receives condition changes, re-checks every event definition to derive
//! edge and level events, and then enqueues [`INTERNAL_EVENT`].
//!
//! [`INTERNAL_EVENT`]: crate::core::INTERNAL_EVENT

use super::{lock, read, write, ConditionChange, ConditionManager, StateManager};
use super::{TransitionManager, WorkQueue, Workers};
use crate::core::{
    is_reserved_event, ConditionInfo, Event, EventDefinition, TransitionHistory, TransitionRecord,
    TransitionRule, TriggerMode,
};
use crate::error::FsmError;
use crate::machine::{DefaultHandler, StateEventHandler};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn, Span};

/// Event queue, event worker and synthetic event generator.
pub struct EventHandler {
    states: Arc<StateManager>,
    conditions: Arc<ConditionManager>,
    transitions: Arc<TransitionManager>,
    events: Arc<WorkQueue<Event>>,
    changes: Arc<WorkQueue<ConditionChange>>,
    definitions: RwLock<Vec<EventDefinition>>,
    handler: RwLock<Arc<dyn StateEventHandler>>,
    history: Mutex<TransitionHistory>,
    running: AtomicBool,
    workers: Workers,
    span: Span,
}

impl EventHandler {
    /// Wire the handler to the other components.
    ///
    /// Condition changes and state timeouts are forwarded into this
    /// handler's queues, replacing any callback installed before.
    pub fn new(
        states: Arc<StateManager>,
        conditions: Arc<ConditionManager>,
        transitions: Arc<TransitionManager>,
        span: Span,
    ) -> Self {
        let events = Arc::new(WorkQueue::new());
        let changes = Arc::new(WorkQueue::new());

        let change_queue = Arc::clone(&changes);
        conditions.install_change_callback(Arc::new(move |change: &ConditionChange| {
            change_queue.push(change.clone());
        }));

        let timeout_queue = Arc::clone(&events);
        states.install_timeout_callback(Arc::new(move |state: &str, _timeout: Duration| {
            timeout_queue.push(Event::state_timeout(state));
        }));

        Self {
            states,
            conditions,
            transitions,
            events,
            changes,
            definitions: RwLock::new(Vec::new()),
            handler: RwLock::new(Arc::new(DefaultHandler)),
            history: Mutex::new(TransitionHistory::new()),
            running: AtomicBool::new(false),
            workers: Workers::default(),
            span,
        }
    }

    /// Register a synthetic event definition and its tracking value.
    pub fn add_event_definition(&self, definition: EventDefinition) -> Result<(), FsmError> {
        if self.is_running() {
            return Err(FsmError::RegistrationClosed);
        }
        if is_reserved_event(&definition.name) {
            return Err(FsmError::ReservedEventName(definition.name));
        }
        let mut definitions = write(&self.definitions);
        if definitions.iter().any(|known| known.name == definition.name) {
            return Err(FsmError::DuplicateEventDefinition(definition.name));
        }
        if !self.conditions.contains(&definition.name) {
            self.conditions.store_value(&definition.name, 0);
        }
        definitions.push(definition);
        Ok(())
    }

    pub fn event_definitions(&self) -> Vec<EventDefinition> {
        read(&self.definitions).clone()
    }

    /// Install the callback handler. Only allowed while stopped.
    pub fn set_handler(&self, handler: Arc<dyn StateEventHandler>) -> Result<(), FsmError> {
        if self.is_running() {
            return Err(FsmError::RegistrationClosed);
        }
        *write(&self.handler) = handler;
        Ok(())
    }

    /// Queue an event. Never blocks.
    pub fn handle_event(&self, event: Event) {
        self.events.push(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn history(&self) -> TransitionHistory {
        lock(&self.history).clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the event worker and the trigger worker.
    pub fn start(self: &Arc<Self>) -> Result<(), FsmError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.events.open();
        self.changes.open();

        let handler = Arc::clone(self);
        let events = self.workers.spawn("statewire-events", &self.span, move || {
            while let Some(event) = handler.events.pop() {
                handler.process_event(event);
            }
        });
        let handler = Arc::clone(self);
        let spawned = events.and_then(|_| {
            self.workers
                .spawn("statewire-event-trigger", &self.span, move || {
                    while let Some(change) = handler.changes.pop() {
                        handler.derive_events(&change);
                    }
                })
        });

        if spawned.is_err() {
            self.stop();
        }
        spawned
    }

    /// Stop both workers and join them. Does nothing when already stopped.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.events.close();
        self.changes.close();
        self.workers.join_all();
    }

    /// Run one event through filtering, rule resolution and commit.
    pub(crate) fn process_event(&self, event: Event) {
        let handler = read(&self.handler).clone();

        let Some(current) = self.states.current_state() else {
            warn!(event = %event, "no current state, event dropped");
            handler.on_post_event(&event, false);
            return;
        };

        if let Some(origin) = event.origin_state() {
            if event.is_state_timeout() && origin != current {
                debug!(origin, current = %current, "stale state timeout dropped");
                return;
            }
        }

        if !handler.on_pre_event(&current, &event) {
            debug!(state = %current, event = %event, "event rejected by pre-event filter");
            handler.on_post_event(&event, false);
            return;
        }

        let handled = match self.resolve(&current, &event) {
            Some((rule, matched)) => self.commit(&current, &rule, &event, &matched, handler.as_ref()),
            None => false,
        };
        handler.on_post_event(&event, handled);
    }

    /// First satisfied rule for `event`, searching `current` and then each ancestor.
    fn resolve(
        &self,
        current: &str,
        event: &Event,
    ) -> Option<(Arc<TransitionRule>, Vec<ConditionInfo>)> {
        let mut lineage = self.states.state_hierarchy(current);
        if lineage.is_empty() {
            lineage.push(current.to_string());
        }

        for state in &lineage {
            for rule in self.transitions.find_transition(state, event.name()) {
                match self.conditions.check_conditions(&rule.conditions, rule.operator) {
                    Ok(evaluation) if evaluation.met => return Some((rule, evaluation.matched)),
                    Ok(_) => {}
                    Err(err) => {
                        error!(from = %rule.from, to = %rule.to, error = %err, "rule check failed");
                    }
                }
            }
        }
        None
    }

    fn commit(
        &self,
        current: &str,
        rule: &TransitionRule,
        event: &Event,
        matched: &[ConditionInfo],
        handler: &dyn StateEventHandler,
    ) -> bool {
        let path = self.states.transition_path(current, &rule.to);
        info!(from = current, to = %rule.to, event = %event, "transition");
        for info in matched {
            debug!(
                condition = %info.name,
                value = info.value,
                elapsed_ms = info.elapsed.as_millis() as u64,
                "satisfied condition"
            );
        }

        handler.on_transition(&path.exit, event, &path.enter);
        handler.on_exit_state(&path.exit);
        if let Err(err) = self.states.set_state(&rule.to) {
            error!(to = %rule.to, error = %err, "failed to commit state");
            return false;
        }
        handler.on_enter_state(&path.enter);

        lock(&self.history).record(TransitionRecord {
            from: current.to_string(),
            to: rule.to.clone(),
            event: event.name().to_string(),
            exited: path.exit,
            entered: path.enter,
            timestamp: Utc::now(),
        });
        true
    }

    /// Re-check every event definition after a condition change, then
    /// enqueue the internal event carrying the change.
    pub(crate) fn derive_events(&self, change: &ConditionChange) {
        debug!(
            condition = %change.name,
            value = change.value,
            meets_condition = change.meets_condition,
            "condition change received"
        );

        let definitions = read(&self.definitions).clone();
        for definition in &definitions {
            let armed = self.conditions.condition_value(&definition.name) != 0;
            let evaluation =
                match self.conditions.check_conditions(&definition.conditions, definition.operator) {
                    Ok(evaluation) => evaluation,
                    Err(err) => {
                        error!(event = %definition.name, error = %err, "event definition check failed");
                        continue;
                    }
                };

            match (evaluation.met, armed) {
                (true, false) => {
                    self.conditions.store_value(&definition.name, 1);
                    self.emit(Event::new(&definition.name).with_conditions(evaluation.matched));
                }
                (true, true) if definition.trigger_mode == TriggerMode::Level => {
                    self.emit(Event::new(&definition.name).with_conditions(evaluation.matched));
                }
                (false, true) => {
                    self.conditions.store_value(&definition.name, 0);
                    if definition.trigger_mode == TriggerMode::Edge {
                        self.emit(Event::new(definition.reset_event_name()));
                    }
                }
                _ => {}
            }
        }

        self.events.push(Event::internal(ConditionInfo::new(
            &change.name,
            change.value,
            change.duration,
        )));
    }

    fn emit(&self, event: Event) {
        debug!(event = %event, "synthetic event generated");
        self.events.push(event);
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("pending_events", &self.pending_events())
            .field("definitions", &read(&self.definitions).len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Condition, Operator, StateInfo, INTERNAL_EVENT, STATE_TIMEOUT_EVENT};
    use crate::machine::Callbacks;

    struct Fixture {
        states: Arc<StateManager>,
        conditions: Arc<ConditionManager>,
        transitions: Arc<TransitionManager>,
        handler: EventHandler,
    }

    fn fixture() -> Fixture {
        let states = Arc::new(StateManager::new(Span::none()));
        let conditions = Arc::new(ConditionManager::new(Span::none()));
        let transitions = Arc::new(TransitionManager::new());
        for info in [
            StateInfo::new("A"),
            StateInfo::new("A1").with_parent("A"),
            StateInfo::new("A1a").with_parent("A1"),
            StateInfo::new("A2").with_parent("A"),
            StateInfo::new("A2a").with_parent("A2"),
            StateInfo::new("B"),
        ] {
            states.add_state_info(info).unwrap();
        }
        let handler = EventHandler::new(
            Arc::clone(&states),
            Arc::clone(&conditions),
            Arc::clone(&transitions),
            Span::none(),
        );
        Fixture {
            states,
            conditions,
            transitions,
            handler,
        }
    }

    fn drain_names(handler: &EventHandler) -> Vec<String> {
        handler.events.open();
        let names = handler
            .events
            .drain()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        handler.events.close();
        names
    }

    #[test]
    fn hierarchy_paths_reach_callbacks() {
        let fx = fixture();
        fx.states.set_state("A1a").unwrap();
        fx.transitions
            .add_transition(TransitionRule::new("A1a", "A2a").on("go"))
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        fx.handler
            .set_handler(Arc::new(Callbacks::new().transition(move |exit, _, enter| {
                log.lock().unwrap().push((exit.to_vec(), enter.to_vec()));
            })))
            .unwrap();

        fx.handler.process_event(Event::new("go"));

        assert_eq!(fx.states.current_state().as_deref(), Some("A2a"));
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, vec!["A1a", "A1"]);
        assert_eq!(seen[0].1, vec!["A2", "A2a"]);
    }

    #[test]
    fn rule_on_ancestor_matches_when_leaf_has_none() {
        let fx = fixture();
        fx.states.set_state("A1a").unwrap();
        fx.transitions.add_transition(TransitionRule::new("A", "B").on("leave")).unwrap();

        fx.handler.process_event(Event::new("leave"));

        assert_eq!(fx.states.current_state().as_deref(), Some("B"));
        let history = fx.handler.history();
        let record = history.last().unwrap();
        assert_eq!(record.exited, vec!["A1a", "A1", "A"]);
        assert_eq!(record.entered, vec!["B"]);
    }

    #[test]
    fn first_satisfied_rule_at_lowest_level_wins() {
        let fx = fixture();
        fx.conditions.add_condition(&Condition::equals("flag", 1)).unwrap();
        fx.states.set_state("A1").unwrap();
        fx.transitions
            .add_transition(
                TransitionRule::new("A1", "A2").on("go").with_condition(Condition::equals("flag", 1)),
            )
            .unwrap();
        fx.transitions.add_transition(TransitionRule::new("A1", "A1a").on("go")).unwrap();
        fx.transitions.add_transition(TransitionRule::new("A", "B").on("go")).unwrap();

        fx.handler.process_event(Event::new("go"));
        assert_eq!(fx.states.current_state().as_deref(), Some("A1a"));
    }

    #[test]
    fn unknown_condition_is_treated_as_unsatisfied() {
        let fx = fixture();
        fx.states.set_state("B").unwrap();
        fx.transitions
            .add_transition(
                TransitionRule::new("B", "A").on("go").with_condition(Condition::equals("ghost", 1)),
            )
            .unwrap();

        let handled = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&handled);
        fx.handler
            .set_handler(Arc::new(Callbacks::new().post_event(move |_, ok| {
                *slot.lock().unwrap() = Some(ok);
            })))
            .unwrap();

        fx.handler.process_event(Event::new("go"));
        assert_eq!(fx.states.current_state().as_deref(), Some("B"));
        assert_eq!(*handled.lock().unwrap(), Some(false));
    }

    #[test]
    fn stale_state_timeout_is_dropped() {
        let fx = fixture();
        fx.states.set_state("B").unwrap();
        fx.transitions
            .add_transition(TransitionRule::new("B", "A").on(STATE_TIMEOUT_EVENT))
            .unwrap();

        fx.handler.process_event(Event::state_timeout("A2"));
        assert_eq!(fx.states.current_state().as_deref(), Some("B"));

        fx.handler.process_event(Event::state_timeout("B"));
        assert_eq!(fx.states.current_state().as_deref(), Some("A"));
    }

    #[test]
    fn edge_definition_fires_once_then_resets() {
        let fx = fixture();
        fx.conditions.add_condition(&Condition::equals("smoke", 1)).unwrap();
        let mut alarm = EventDefinition::new("alarm", TriggerMode::Edge);
        alarm.conditions.push(Condition::equals("smoke", 1));
        fx.handler.add_event_definition(alarm).unwrap();

        let change = |value| ConditionChange {
            name: "smoke".to_string(),
            value,
            duration: Duration::ZERO,
            meets_condition: value == 1,
        };

        fx.conditions.store_value("smoke", 1);
        fx.handler.derive_events(&change(1));
        fx.handler.derive_events(&change(1));
        fx.conditions.store_value("smoke", 0);
        fx.handler.derive_events(&change(0));

        assert_eq!(
            drain_names(&fx.handler),
            vec!["alarm", INTERNAL_EVENT, INTERNAL_EVENT, "alarm_RESET", INTERNAL_EVENT]
        );
    }

    #[test]
    fn level_definition_fires_while_armed() {
        let fx = fixture();
        fx.conditions.add_condition(&Condition::new("temp", 50, 100)).unwrap();
        let mut hot = EventDefinition::new("hot", TriggerMode::Level);
        hot.conditions.push(Condition::new("temp", 50, 100));
        hot.operator = Operator::Or;
        fx.handler.add_event_definition(hot).unwrap();

        let change = ConditionChange {
            name: "temp".to_string(),
            value: 70,
            duration: Duration::ZERO,
            meets_condition: true,
        };
        fx.conditions.store_value("temp", 70);
        fx.handler.derive_events(&change);
        fx.handler.derive_events(&change);
        fx.conditions.store_value("temp", 10);
        fx.handler.derive_events(&change);

        assert_eq!(
            drain_names(&fx.handler),
            vec!["hot", INTERNAL_EVENT, "hot", INTERNAL_EVENT, INTERNAL_EVENT]
        );
        assert_eq!(fx.conditions.condition_value("hot"), 0);
    }

    #[test]
    fn reserved_and_duplicate_definitions_are_rejected() {
        let fx = fixture();
        assert!(matches!(
            fx.handler
                .add_event_definition(EventDefinition::new(INTERNAL_EVENT, TriggerMode::Edge)),
            Err(FsmError::ReservedEventName(_))
        ));

        fx.handler
            .add_event_definition(EventDefinition::new("dup", TriggerMode::Edge))
            .unwrap();
        assert!(matches!(
            fx.handler
                .add_event_definition(EventDefinition::new("dup", TriggerMode::Level)),
            Err(FsmError::DuplicateEventDefinition(_))
        ));
    }
}
