//! Callback interface invoked by the event worker.
//!
//! Applications either implement [`StateEventHandler`] or fill the
//! closure slots of [`Callbacks`] one role at a time. Every role has a
//! default: the pre-event filter accepts everything and the notifications
//! do nothing.

use crate::core::Event;
use std::fmt;
use std::sync::Arc;

/// Receiver of state machine notifications.
///
/// All methods run on the machine's event worker, one event at a time,
/// and never while an internal lock is held. A panic unwinds only the
/// event worker.
///
/// # Example
///
/// ```rust
/// use statewire::core::Event;
/// use statewire::machine::StateEventHandler;
///
/// struct OnlyWhenArmed;
///
/// impl StateEventHandler for OnlyWhenArmed {
///     fn on_pre_event(&self, current_state: &str, _event: &Event) -> bool {
///         current_state != "DISARMED"
///     }
/// }
///
/// assert!(!OnlyWhenArmed.on_pre_event("DISARMED", &Event::new("trip")));
/// ```
pub trait StateEventHandler: Send + Sync {
    /// Decide whether `event` is processed at all. Returning `false`
    /// skips rule matching and reports the event as unhandled.
    fn on_pre_event(&self, _current_state: &str, _event: &Event) -> bool {
        true
    }

    /// Called first when a rule matched, before any state is exited.
    fn on_transition(&self, _exited: &[String], _event: &Event, _entered: &[String]) {}

    /// States being left, most specific first.
    fn on_exit_state(&self, _exited: &[String]) {}

    /// States entered, least specific first. The new state is already current.
    fn on_enter_state(&self, _entered: &[String]) {}

    /// Called last for every processed event.
    fn on_post_event(&self, _event: &Event, _handled: bool) {}
}

/// Handler using every default.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHandler;

impl StateEventHandler for DefaultHandler {}

pub type PreEventFn = Arc<dyn Fn(&str, &Event) -> bool + Send + Sync>;
pub type TransitionFn = Arc<dyn Fn(&[String], &Event, &[String]) + Send + Sync>;
pub type StatesFn = Arc<dyn Fn(&[String]) + Send + Sync>;
pub type PostEventFn = Arc<dyn Fn(&Event, bool) + Send + Sync>;

/// Closure slots for each callback role.
///
/// An empty slot falls back to the delegate handler when one is set, and
/// to the default behavior otherwise.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub(crate) pre_event: Option<PreEventFn>,
    pub(crate) transition: Option<TransitionFn>,
    pub(crate) exit_state: Option<StatesFn>,
    pub(crate) enter_state: Option<StatesFn>,
    pub(crate) post_event: Option<PostEventFn>,
    pub(crate) delegate: Option<Arc<dyn StateEventHandler>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &Event) -> bool + Send + Sync + 'static,
    {
        self.pre_event = Some(Arc::new(callback));
        self
    }

    pub fn transition<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[String], &Event, &[String]) + Send + Sync + 'static,
    {
        self.transition = Some(Arc::new(callback));
        self
    }

    pub fn exit_state<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.exit_state = Some(Arc::new(callback));
        self
    }

    pub fn enter_state<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.enter_state = Some(Arc::new(callback));
        self
    }

    pub fn post_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Event, bool) + Send + Sync + 'static,
    {
        self.post_event = Some(Arc::new(callback));
        self
    }

    /// Handler consulted for every role without a closure.
    pub fn delegate_to(mut self, handler: Arc<dyn StateEventHandler>) -> Self {
        self.delegate = Some(handler);
        self
    }

    fn fallback(&self) -> &dyn StateEventHandler {
        match &self.delegate {
            Some(handler) => handler.as_ref(),
            None => &DefaultHandler,
        }
    }
}

impl StateEventHandler for Callbacks {
    fn on_pre_event(&self, current_state: &str, event: &Event) -> bool {
        match &self.pre_event {
            Some(callback) => callback(current_state, event),
            None => self.fallback().on_pre_event(current_state, event),
        }
    }

    fn on_transition(&self, exited: &[String], event: &Event, entered: &[String]) {
        match &self.transition {
            Some(callback) => callback(exited, event, entered),
            None => self.fallback().on_transition(exited, event, entered),
        }
    }

    fn on_exit_state(&self, exited: &[String]) {
        match &self.exit_state {
            Some(callback) => callback(exited),
            None => self.fallback().on_exit_state(exited),
        }
    }

    fn on_enter_state(&self, entered: &[String]) {
        match &self.enter_state {
            Some(callback) => callback(entered),
            None => self.fallback().on_enter_state(entered),
        }
    }

    fn on_post_event(&self, event: &Event, handled: bool) {
        match &self.post_event {
            Some(callback) => callback(event, handled),
            None => self.fallback().on_post_event(event, handled),
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("pre_event", &self.pre_event.is_some())
            .field("transition", &self.transition.is_some())
            .field("exit_state", &self.exit_state.is_some())
            .field("enter_state", &self.enter_state.is_some())
            .field("post_event", &self.post_event.is_some())
            .field("delegate", &self.delegate.is_some())
            .finish()
    }
}
