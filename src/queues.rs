//! Bounded record queues: the only blocking points in the pipeline.
//!
//! Two flavours, both built once on the same `parking_lot::Mutex` +
//! `parking_lot::Condvar` vocabulary (design note 9): a circular queue of
//! `Bundle`s, and a byte-buffer queue for the suffix-writer path. Both
//! support explicit completion (`finish`) and forced abort (`abort`); a
//! blocked `push`/`pop` on an aborted or finished-and-drained queue returns
//! immediately rather than waiting forever.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    cap: usize,
    /// No more items will ever be pushed.
    finished: AtomicBool,
    /// A consumer gave up; producers should stop and return `false`.
    aborted: AtomicBool,
}

/// A bounded FIFO queue of `T`, shared between exactly one producer role and
/// one consumer role (may be cloned as an `Arc` for multi-producer use).
pub struct BoundedQueue<T> {
    inner: std::sync::Arc<Inner<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> BoundedQueue<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: std::sync::Arc::new(Inner {
                items: Mutex::new(VecDeque::with_capacity(cap)),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                cap,
                finished: AtomicBool::new(false),
                aborted: AtomicBool::new(false),
            }),
        }
    }

    /// Blocks until there is room or the queue is aborted. Returns `false`
    /// (without enqueuing) if the queue was aborted.
    pub fn push(&self, item: T) -> bool {
        let mut items = self.inner.items.lock();
        loop {
            if self.inner.aborted.load(Ordering::Acquire) {
                return false;
            }
            if items.len() < self.inner.cap {
                items.push_back(item);
                self.inner.not_empty.notify_one();
                return true;
            }
            self.inner.not_full.wait(&mut items);
        }
    }

    /// Blocks until an item is available, the queue is finished and drained,
    /// or the queue is aborted. Returns `None` in the latter two cases.
    pub fn pop(&self) -> Option<T> {
        let mut items = self.inner.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                self.inner.not_full.notify_one();
                return Some(item);
            }
            if self.inner.aborted.load(Ordering::Acquire) {
                return None;
            }
            if self.inner.finished.load(Ordering::Acquire) {
                return None;
            }
            self.inner.not_empty.wait(&mut items);
        }
    }

    /// Marks that no more items will be pushed; wakes any blocked consumers
    /// so they can observe end-of-stream once the backlog drains.
    pub fn finish(&self) {
        self.inner.finished.store(true, Ordering::Release);
        let _items = self.inner.items.lock();
        self.inner.not_empty.notify_all();
    }

    /// Forces every blocked `push`/`pop` to return immediately. Used by
    /// `ignore_rest` to unwind a pipeline without leaking a blocked thread.
    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::Release);
        let _items = self.inner.items.lock();
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A circular queue of `Bundle`s: the producer/consumer vocabulary used
/// between every reader stage and between operator nodes.
pub type BundleQueue = BoundedQueue<crate::bundle::Bundle>;

/// A byte-buffer queue: used on the suffix-writer path and by I/O threads
/// handing raw section/suffix buffers downstream.
pub type ByteQueue = BoundedQueue<Vec<u8>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn push_pop_preserves_fifo_order() {
        let q: BoundedQueue<i32> = BoundedQueue::new(4);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn finish_drains_then_returns_none() {
        let q: BoundedQueue<i32> = BoundedQueue::new(4);
        q.push(1);
        q.finish();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn abort_unblocks_waiting_push() {
        let q: BoundedQueue<i32> = BoundedQueue::new(1);
        assert!(q.push(10));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.push(20));
        thread::sleep(Duration::from_millis(30));
        q.abort();
        assert_eq!(handle.join().unwrap(), false);
    }

    #[test]
    fn abort_unblocks_waiting_pop() {
        let q: BoundedQueue<i32> = BoundedQueue::new(1);
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop());
        thread::sleep(Duration::from_millis(30));
        q.abort();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn push_blocks_until_consumer_pops() {
        let q: BoundedQueue<i32> = BoundedQueue::new(1);
        q.push(1);
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.push(2));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.pop(), Some(1));
        assert!(handle.join().unwrap());
        assert_eq!(q.pop(), Some(2));
    }
}
