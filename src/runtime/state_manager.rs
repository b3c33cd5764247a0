//! State table, current state and the state-timeout watchdog.

use super::{lock, read, write, Workers};
use crate::core::{transition_path, StateInfo, TransitionPath};
use crate::error::FsmError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, Span};

/// Called with the state and its timeout each time the watchdog fires.
pub type TimeoutCallback = Arc<dyn Fn(&str, Duration) + Send + Sync>;

#[derive(Debug)]
struct StateNode {
    info: StateInfo,
    /// The state itself followed by every ancestor up to the root
    lineage: Vec<String>,
}

#[derive(Debug, Default)]
struct StateTable {
    states: HashMap<String, StateNode>,
    current: Option<String>,
}

#[derive(Debug, Clone)]
struct ArmedTimeout {
    state: String,
    timeout: Duration,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct Watchdog {
    armed: Option<ArmedTimeout>,
    running: bool,
}

/// Owner of the state hierarchy and the current state.
///
/// States are registered before the machine starts and never change
/// afterwards, so each state's ancestor chain is computed once at
/// registration. Entering a state with a timeout arms a watchdog that
/// fires periodically for as long as the state stays current.
///
/// # Example
///
/// ```rust
/// use statewire::core::StateInfo;
/// use statewire::runtime::StateManager;
///
/// let states = StateManager::new(tracing::Span::none());
/// states.add_state_info(StateInfo::new("A")).unwrap();
/// states.add_state_info(StateInfo::new("A1").with_parent("A")).unwrap();
/// states.add_state_info(StateInfo::new("A2").with_parent("A")).unwrap();
/// states.set_state("A1").unwrap();
///
/// assert_eq!(states.state_hierarchy("A1"), vec!["A1", "A"]);
///
/// let path = states.transition_path("A1", "A2");
/// assert_eq!(path.exit, vec!["A1"]);
/// assert_eq!(path.enter, vec!["A2"]);
/// ```
pub struct StateManager {
    table: Mutex<StateTable>,
    watchdog: Mutex<Watchdog>,
    rearmed: Condvar,
    on_timeout: RwLock<Option<TimeoutCallback>>,
    running: AtomicBool,
    workers: Workers,
    span: Span,
}

impl StateManager {
    pub fn new(span: Span) -> Self {
        Self {
            table: Mutex::new(StateTable::default()),
            watchdog: Mutex::new(Watchdog::default()),
            rearmed: Condvar::new(),
            on_timeout: RwLock::new(None),
            running: AtomicBool::new(false),
            workers: Workers::default(),
            span,
        }
    }

    /// Register a state. Its parent, if any, must already be registered.
    ///
    /// An empty parent name means the state is a root. Children listed on
    /// `info` are ignored; they are collected as child states register.
    pub fn add_state_info(&self, info: StateInfo) -> Result<(), FsmError> {
        if self.is_running() {
            return Err(FsmError::RegistrationClosed);
        }
        let mut info = info;
        info.parent = info.parent.filter(|parent| !parent.is_empty());
        info.children.clear();

        let mut table = lock(&self.table);
        if table.states.contains_key(&info.name) {
            return Err(FsmError::DuplicateState(info.name));
        }

        let mut lineage = vec![info.name.clone()];
        if let Some(parent) = info.parent.as_deref() {
            let parent_node = table
                .states
                .get_mut(parent)
                .ok_or_else(|| FsmError::UnknownParent {
                    state: info.name.clone(),
                    parent: parent.to_string(),
                })?;
            parent_node.info.children.push(info.name.clone());
            lineage.extend(parent_node.lineage.iter().cloned());
        }

        table
            .states
            .insert(info.name.clone(), StateNode { info, lineage });
        Ok(())
    }

    /// Commit `name` as the current state and arm or disarm the watchdog.
    pub fn set_state(&self, name: &str) -> Result<(), FsmError> {
        let timeout = {
            let mut table = lock(&self.table);
            let timeout = table
                .states
                .get(name)
                .map(|node| node.info.timeout)
                .ok_or_else(|| FsmError::UnknownState(name.to_string()))?;
            table.current = Some(name.to_string());
            timeout
        };

        self.arm(name, timeout);
        debug!(
            state = name,
            timeout_ms = timeout.as_millis() as u64,
            "state committed"
        );
        Ok(())
    }

    fn arm(&self, state: &str, timeout: Duration) {
        {
            let mut watchdog = lock(&self.watchdog);
            watchdog.armed = (!timeout.is_zero()).then(|| ArmedTimeout {
                state: state.to_string(),
                timeout,
                deadline: Instant::now() + timeout,
            });
        }
        self.rearmed.notify_all();
    }

    pub fn current_state(&self) -> Option<String> {
        lock(&self.table).current.clone()
    }

    /// Ancestor chain of `state`, child to root. Empty for an unknown state.
    pub fn state_hierarchy(&self, state: &str) -> Vec<String> {
        lock(&self.table)
            .states
            .get(state)
            .map(|node| node.lineage.clone())
            .unwrap_or_default()
    }

    /// States to exit and enter when moving from `from` to `to`.
    pub fn transition_path(&self, from: &str, to: &str) -> TransitionPath {
        let (from_lineage, to_lineage) = {
            let table = lock(&self.table);
            let lineage = |name: &str| {
                table
                    .states
                    .get(name)
                    .map(|node| node.lineage.clone())
                    .unwrap_or_else(|| vec![name.to_string()])
            };
            (lineage(from), lineage(to))
        };
        transition_path(&from_lineage, &to_lineage)
    }

    pub fn contains(&self, state: &str) -> bool {
        lock(&self.table).states.contains_key(state)
    }

    pub fn state_info(&self, state: &str) -> Option<StateInfo> {
        lock(&self.table)
            .states
            .get(state)
            .map(|node| node.info.clone())
    }

    /// Registered state names, sorted.
    pub fn state_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.table).states.keys().cloned().collect();
        names.sort();
        names
    }

    /// Install the callback the watchdog fires. Only allowed while stopped.
    pub fn register_timeout_callback(&self, callback: TimeoutCallback) -> Result<(), FsmError> {
        if self.is_running() {
            return Err(FsmError::RegistrationClosed);
        }
        self.install_timeout_callback(callback);
        Ok(())
    }

    pub(crate) fn install_timeout_callback(&self, callback: TimeoutCallback) {
        *write(&self.on_timeout) = Some(callback);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the watchdog. The current state's timeout is re-armed from now.
    pub fn start(self: &Arc<Self>) -> Result<(), FsmError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let current = self
            .current_state()
            .map(|state| {
                let timeout = self.state_info(&state).map(|i| i.timeout).unwrap_or_default();
                (state, timeout)
            });
        if let Some((state, timeout)) = current {
            self.arm(&state, timeout);
        }
        lock(&self.watchdog).running = true;

        let manager = Arc::clone(self);
        let spawned = self
            .workers
            .spawn("statewire-state-timeout", &self.span, move || manager.watch_timeouts());
        if spawned.is_err() {
            self.stop();
        }
        spawned
    }

    /// Stop the watchdog and join it. Does nothing when already stopped.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        lock(&self.watchdog).running = false;
        self.rearmed.notify_all();
        self.workers.join_all();
    }

    fn watch_timeouts(&self) {
        while let Some((state, timeout)) = self.next_timeout() {
            info!(state = %state, timeout_ms = timeout.as_millis() as u64, "state timeout");
            let callback = read(&self.on_timeout).clone();
            if let Some(callback) = callback {
                callback(&state, timeout);
            }
        }
    }

    /// Block until the armed timeout expires, then re-arm it one period later.
    fn next_timeout(&self) -> Option<(String, Duration)> {
        let mut watchdog = lock(&self.watchdog);
        loop {
            if !watchdog.running {
                return None;
            }
            let now = Instant::now();
            let deadline = watchdog.armed.as_ref().map(|armed| armed.deadline);
            watchdog = match deadline {
                Some(deadline) if deadline <= now => {
                    let armed = watchdog.armed.as_mut()?;
                    armed.deadline = now + armed.timeout;
                    return Some((armed.state.clone(), armed.timeout));
                }
                Some(deadline) => {
                    self.rearmed
                        .wait_timeout(watchdog, deadline - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0
                }
                None => self
                    .rearmed
                    .wait(watchdog)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            };
        }
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("current", &self.current_state())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
