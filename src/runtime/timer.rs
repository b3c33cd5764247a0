//! Min-heap of deadlines with a single blocking waiter.

use super::lock;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};
use std::time::Instant;

#[derive(Debug)]
struct Deadline<T> {
    at: Instant,
    seq: u64,
    item: T,
}

// Ties on `at` fall back to scheduling order.
impl<T> Ord for Deadline<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

impl<T> PartialOrd for Deadline<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Deadline<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Deadline<T> {}

#[derive(Debug)]
struct Inner<T> {
    heap: BinaryHeap<Reverse<Deadline<T>>>,
    next_seq: u64,
    open: bool,
}

/// Items released strictly in deadline order.
///
/// The waiter sleeps until the earliest deadline, or until an earlier one
/// is scheduled, and never polls.
///
/// # Example
///
/// ```rust
/// use statewire::runtime::DeadlineQueue;
/// use std::time::{Duration, Instant};
///
/// let timers = DeadlineQueue::new();
/// timers.open();
///
/// let now = Instant::now();
/// timers.schedule(now + Duration::from_millis(20), "late");
/// timers.schedule(now + Duration::from_millis(5), "early");
///
/// assert_eq!(timers.next_expired(), Some("early"));
/// assert_eq!(timers.next_expired(), Some("late"));
/// ```
#[derive(Debug)]
pub struct DeadlineQueue<T> {
    inner: Mutex<Inner<T>>,
    changed: Condvar,
}

impl<T> Default for DeadlineQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeadlineQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                open: false,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn schedule(&self, at: Instant, item: T) {
        {
            let mut inner = lock(&self.inner);
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.heap.push(Reverse(Deadline { at, seq, item }));
        }
        self.changed.notify_one();
    }

    /// Block until the earliest deadline passes and return its item.
    /// Returns `None` once closed.
    pub fn next_expired(&self) -> Option<T> {
        let mut inner = lock(&self.inner);
        loop {
            if !inner.open {
                return None;
            }
            let now = Instant::now();
            let next_at = inner.heap.peek().map(|Reverse(deadline)| deadline.at);
            inner = match next_at {
                Some(at) if at <= now => {
                    return inner.heap.pop().map(|Reverse(deadline)| deadline.item);
                }
                Some(at) => {
                    self.changed
                        .wait_timeout(inner, at - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0
                }
                None => self
                    .changed
                    .wait(inner)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            };
        }
    }

    pub fn open(&self) {
        lock(&self.inner).open = true;
    }

    /// Wake the waiter and make it return `None`. Pending deadlines are kept.
    pub fn close(&self) {
        lock(&self.inner).open = false;
        self.changed.notify_all();
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).heap.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).heap.is_empty()
    }

    pub fn clear(&self) {
        lock(&self.inner).heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn equal_deadlines_keep_schedule_order() {
        let timers = DeadlineQueue::new();
        timers.open();
        let at = Instant::now();
        timers.schedule(at, 1);
        timers.schedule(at, 2);
        timers.schedule(at, 3);

        assert_eq!(timers.next_expired(), Some(1));
        assert_eq!(timers.next_expired(), Some(2));
        assert_eq!(timers.next_expired(), Some(3));
    }

    #[test]
    fn waits_until_deadline() {
        let timers = DeadlineQueue::new();
        timers.open();
        let start = Instant::now();
        timers.schedule(start + Duration::from_millis(30), ());

        assert_eq!(timers.next_expired(), Some(()));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn earlier_deadline_wakes_waiter() {
        let timers = Arc::new(DeadlineQueue::new());
        timers.open();
        timers.schedule(Instant::now() + Duration::from_secs(10), "slow");

        let waiter = {
            let timers = Arc::clone(&timers);
            thread::spawn(move || timers.next_expired())
        };

        thread::sleep(Duration::from_millis(20));
        timers.schedule(Instant::now(), "fast");
        assert_eq!(waiter.join().unwrap(), Some("fast"));
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn close_releases_waiter() {
        let timers: Arc<DeadlineQueue<u8>> = Arc::new(DeadlineQueue::new());
        timers.open();

        let waiter = {
            let timers = Arc::clone(&timers);
            thread::spawn(move || timers.next_expired())
        };

        thread::sleep(Duration::from_millis(20));
        timers.close();
        assert_eq!(waiter.join().unwrap(), None);
    }
}
