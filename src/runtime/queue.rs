//! Blocking FIFO work queue shared by a producer side and one worker.

use super::lock;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    open: bool,
}

/// FIFO queue whose consumer blocks until an item arrives or the queue closes.
///
/// Pushing never blocks and is accepted whether or not the queue is open,
/// so items submitted before start (or after stop) are buffered and
/// processed once a worker runs again.
///
/// # Example
///
/// ```rust
/// use statewire::runtime::WorkQueue;
///
/// let queue = WorkQueue::new();
/// queue.open();
/// queue.push(1);
/// queue.push(2);
///
/// assert_eq!(queue.pop(), Some(1));
/// assert_eq!(queue.drain(), vec![2]);
///
/// queue.close();
/// assert_eq!(queue.pop(), None);
/// ```
#[derive(Debug)]
pub struct WorkQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                open: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        lock(&self.inner).items.push_back(item);
        self.available.notify_one();
    }

    /// Block until an item is available. Returns `None` once closed.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.wait_for_work();
        if !inner.open {
            return None;
        }
        inner.items.pop_front()
    }

    /// Block until work is available, then take everything queued.
    /// Returns an empty batch once closed.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.wait_for_work();
        if !inner.open {
            return Vec::new();
        }
        inner.items.drain(..).collect()
    }

    fn wait_for_work(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        let inner = lock(&self.inner);
        self.available
            .wait_while(inner, |inner| inner.open && inner.items.is_empty())
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Let consumers take items.
    pub fn open(&self) {
        lock(&self.inner).open = true;
    }

    /// Wake every blocked consumer and make them return empty-handed.
    /// Queued items are kept.
    pub fn close(&self) {
        lock(&self.inner).open = false;
        self.available.notify_all();
    }

    pub fn is_open(&self) -> bool {
        lock(&self.inner).open
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).items.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).items.is_empty()
    }
}
