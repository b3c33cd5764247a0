//! Condition values, the asynchronous update pipeline and duration timers.

use super::{lock, read, write, DeadlineQueue, WorkQueue, Workers};
use crate::core::{evaluate, Condition, ConditionValue, Evaluation, Operator};
use crate::error::FsmError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn, Span};

/// Notification that a condition value was written or a duration elapsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionChange {
    pub name: String,
    pub value: i64,
    /// Duration that was confirmed, zero for plain writes
    pub duration: Duration,
    /// Whether the value lies in a range of some registered condition
    pub meets_condition: bool,
}

/// Receiver of every [`ConditionChange`].
pub type ChangeCallback = Arc<dyn Fn(&ConditionChange) + Send + Sync>;

#[derive(Debug)]
struct ConditionUpdate {
    name: String,
    value: i64,
    at: Instant,
}

#[derive(Debug)]
struct DurationTimer {
    name: String,
    value: i64,
    duration: Duration,
    generation: u64,
}

/// Sole owner of the live condition values.
///
/// Writes are queued and applied by a dedicated worker, so
/// [`set_condition_value`](Self::set_condition_value) never blocks. When a
/// write moves a value into the range of a duration-qualified condition, a
/// timer is scheduled instead of notifying right away; the timer worker
/// confirms the value held and then notifies.
///
/// # Example
///
/// ```rust
/// use statewire::core::{Condition, Operator};
/// use statewire::runtime::ConditionManager;
///
/// let conditions = ConditionManager::new(tracing::Span::none());
/// conditions.add_condition(&Condition::equals("door", 1)).unwrap();
///
/// assert_eq!(conditions.condition_value("door"), 0);
///
/// let check = conditions
///     .check_conditions(&[Condition::equals("door", 0)], Operator::And)
///     .unwrap();
/// assert!(check.met);
/// ```
pub struct ConditionManager {
    values: Mutex<HashMap<String, ConditionValue>>,
    registry: RwLock<HashMap<String, Vec<Condition>>>,
    updates: WorkQueue<ConditionUpdate>,
    timers: DeadlineQueue<DurationTimer>,
    on_change: RwLock<Option<ChangeCallback>>,
    running: AtomicBool,
    workers: Workers,
    span: Span,
}

impl ConditionManager {
    pub fn new(span: Span) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            registry: RwLock::new(HashMap::new()),
            updates: WorkQueue::new(),
            timers: DeadlineQueue::new(),
            on_change: RwLock::new(None),
            running: AtomicBool::new(false),
            workers: Workers::default(),
            span,
        }
    }

    /// Register the ranges of a condition and create its value (0) if new.
    pub fn add_condition(&self, condition: &Condition) -> Result<(), FsmError> {
        if self.is_running() {
            return Err(FsmError::RegistrationClosed);
        }
        if condition.ranges.is_empty() {
            return Err(FsmError::MissingRanges(condition.name.clone()));
        }
        if let Some(range) = condition.ranges.iter().find(|range| !range.is_valid()) {
            return Err(FsmError::InvalidRange {
                name: condition.name.clone(),
                min: range.min,
                max: range.max,
            });
        }

        {
            let mut registry = write(&self.registry);
            let known = registry.entry(condition.name.clone()).or_default();
            if !known.contains(condition) {
                known.push(condition.clone());
            }
        }
        lock(&self.values)
            .entry(condition.name.clone())
            .or_insert_with(|| ConditionValue::new(0, Instant::now()));
        Ok(())
    }

    /// Install the change callback. Only allowed while stopped.
    pub fn register_change_callback(&self, callback: ChangeCallback) -> Result<(), FsmError> {
        if self.is_running() {
            return Err(FsmError::RegistrationClosed);
        }
        self.install_change_callback(callback);
        Ok(())
    }

    pub(crate) fn install_change_callback(&self, callback: ChangeCallback) {
        *write(&self.on_change) = Some(callback);
    }

    /// Queue a new value for `name`. Never blocks.
    pub fn set_condition_value(&self, name: &str, value: i64) {
        trace!(condition = name, value, "condition update queued");
        self.updates.push(ConditionUpdate {
            name: name.to_string(),
            value,
            at: Instant::now(),
        });
    }

    /// Live value of `name`, or 0 when the name is unknown.
    pub fn condition_value(&self, name: &str) -> i64 {
        let value = lock(&self.values).get(name).map(|current| current.value);
        value.unwrap_or_else(|| {
            warn!(condition = name, "condition value not set, returning 0");
            0
        })
    }

    /// Full runtime record of `name`.
    pub fn condition_snapshot(&self, name: &str) -> Option<ConditionValue> {
        lock(&self.values).get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.values).contains_key(name)
    }

    /// Evaluate `conditions` against the latest committed values.
    pub fn check_conditions(
        &self,
        conditions: &[Condition],
        operator: Operator,
    ) -> Result<Evaluation, FsmError> {
        let values = lock(&self.values);
        evaluate(conditions, operator, &values, Instant::now())
    }

    /// Write a value directly, without queueing or notifying.
    pub(crate) fn store_value(&self, name: &str, value: i64) {
        let now = Instant::now();
        lock(&self.values)
            .entry(name.to_string())
            .or_insert_with(|| ConditionValue::new(value, now))
            .write(value, now);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of updates waiting for the worker.
    pub fn pending_updates(&self) -> usize {
        self.updates.len()
    }

    /// Start the update worker and the duration timer worker.
    pub fn start(self: &Arc<Self>) -> Result<(), FsmError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.updates.open();
        self.timers.open();

        let manager = Arc::clone(self);
        let updates = self
            .workers
            .spawn("statewire-conditions", &self.span, move || {
                manager.process_updates()
            });
        let manager = Arc::clone(self);
        let spawned = updates.and_then(|_| {
            self.workers
                .spawn("statewire-duration-timer", &self.span, move || {
                    manager.process_timers()
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
        self.updates.close();
        self.timers.close();
        self.workers.join_all();
    }

    fn process_updates(&self) {
        loop {
            let batch = self.updates.drain();
            if batch.is_empty() {
                break;
            }
            for update in batch {
                self.apply_update(update);
            }
        }
    }

    fn apply_update(&self, update: ConditionUpdate) {
        let (changed, generation) = {
            let mut values = lock(&self.values);
            let current = values
                .entry(update.name.clone())
                .or_insert_with(|| ConditionValue::new(0, update.at));
            let changed = current.write(update.value, update.at);
            (changed, current.generation)
        };

        let mut durations: Vec<Duration> = Vec::new();
        let mut accepted_now = false;
        let mut meets_condition = false;
        if let Some(conditions) = read(&self.registry).get(&update.name) {
            for condition in conditions.iter().filter(|c| c.accepts(update.value)) {
                meets_condition = true;
                if !condition.is_timed() {
                    accepted_now = true;
                } else if changed && !durations.contains(&condition.duration) {
                    durations.push(condition.duration);
                }
            }
        }

        for duration in &durations {
            self.timers.schedule(
                update.at + *duration,
                DurationTimer {
                    name: update.name.clone(),
                    value: update.value,
                    duration: *duration,
                    generation,
                },
            );
        }

        if changed {
            debug!(condition = %update.name, value = update.value, timers = durations.len(), "condition changed");
        }

        if durations.is_empty() || accepted_now {
            self.notify(ConditionChange {
                name: update.name,
                value: update.value,
                duration: Duration::ZERO,
                meets_condition,
            });
        }
    }

    fn process_timers(&self) {
        while let Some(timer) = self.timers.next_expired() {
            self.fire_timer(timer);
        }
    }

    fn fire_timer(&self, timer: DurationTimer) {
        let confirmed = {
            let mut values = lock(&self.values);
            match values.get_mut(&timer.name) {
                Some(current)
                    if current.generation == timer.generation
                        && current.value == timer.value
                        && current.held_for(Instant::now()) >= timer.duration =>
                {
                    current.triggered = true;
                    true
                }
                _ => false,
            }
        };

        if !confirmed {
            debug!(condition = %timer.name, value = timer.value, "stale duration timer discarded");
            return;
        }

        info!(
            condition = %timer.name,
            value = timer.value,
            duration_ms = timer.duration.as_millis() as u64,
            "duration condition triggered"
        );
        self.notify(ConditionChange {
            name: timer.name,
            value: timer.value,
            duration: timer.duration,
            meets_condition: true,
        });
    }

    fn notify(&self, change: ConditionChange) {
        let callback = read(&self.on_change).clone();
        if let Some(callback) = callback {
            callback(&change);
        }
    }
}

impl std::fmt::Debug for ConditionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionManager")
            .field("conditions", &lock(&self.values).len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
