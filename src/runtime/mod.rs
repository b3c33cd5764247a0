//! Runtime components and the worker plumbing they share.
//!
//! Each component owns its data behind its own lock and runs one or more
//! long-lived worker threads. Workers block on a condition variable until
//! work arrives or the component stops; none of them poll.
//!
//! - [`StateManager`]: state table, current state and the timeout watchdog
//! - [`ConditionManager`]: condition values, the update worker and duration timers
//! - [`TransitionManager`]: rule index keyed by `(state, event)`
//! - [`EventHandler`]: event worker and synthetic event generation

mod condition_manager;
mod event_handler;
mod queue;
mod state_manager;
mod timer;
mod transition_manager;

pub use condition_manager::{ChangeCallback, ConditionChange, ConditionManager};
pub use event_handler::EventHandler;
pub use queue::WorkQueue;
pub use state_manager::{StateManager, TimeoutCallback};
pub use timer::DeadlineQueue;
pub use transition_manager::TransitionManager;

use crate::error::FsmError;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use tracing::{error, Span};

// No user code runs under an internal lock, so poisoned data is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Join handles of the worker threads a component spawned.
#[derive(Debug, Default)]
pub(crate) struct Workers {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Workers {
    /// Spawn a named worker that runs `body` inside `span`.
    pub(crate) fn spawn<F>(&self, name: &str, span: &Span, body: F) -> Result<(), FsmError>
    where
        F: FnOnce() + Send + 'static,
    {
        let span = span.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _entered = span.entered();
                body();
            })
            .map_err(FsmError::WorkerSpawn)?;
        lock(&self.handles).push(handle);
        Ok(())
    }

    /// Join every worker, logging any that panicked.
    ///
    /// A worker never joins itself: when called from one of the workers
    /// (a callback stopping its own machine) that handle is detached.
    pub(crate) fn join_all(&self) {
        let handles = std::mem::take(&mut *lock(&self.handles));
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "worker thread panicked");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        lock(&self.handles).is_empty()
    }
}
