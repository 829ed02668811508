//! Work queues for the evaluation and dispatch pools.
//!
//! `EvalQueue` keeps one FIFO per user and drains them round-robin, so a
//! single user flooding transactions cannot starve everyone else. The global
//! depth is bounded; hitting the bound surfaces as HTTP 429 upstream.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq)]
pub enum EnqueueError {
    Full,
    Closed,
}

struct EvalQueueInner {
    per_user: HashMap<Uuid, VecDeque<Uuid>>,
    round_robin: VecDeque<Uuid>,
    len: usize,
    closed: bool,
}

pub struct EvalQueue {
    inner: Mutex<EvalQueueInner>,
    notify: Notify,
    capacity: usize,
}

impl EvalQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(EvalQueueInner {
                per_user: HashMap::new(),
                round_robin: VecDeque::new(),
                len: 0,
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("eval queue poisoned").len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn try_enqueue(&self, user_id: Uuid, transaction_id: Uuid) -> Result<(), EnqueueError> {
        {
            let mut inner = self.inner.lock().expect("eval queue poisoned");
            if inner.closed {
                return Err(EnqueueError::Closed);
            }
            if inner.len >= self.capacity {
                return Err(EnqueueError::Full);
            }
            let first_for_user = {
                let queue = inner.per_user.entry(user_id).or_default();
                let was_empty = queue.is_empty();
                queue.push_back(transaction_id);
                was_empty
            };
            if first_for_user {
                inner.round_robin.push_back(user_id);
            }
            inner.len += 1;
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Pops the next transaction, rotating between users with pending work.
    pub fn try_pop(&self) -> Option<(Uuid, Uuid)> {
        let mut inner = self.inner.lock().expect("eval queue poisoned");
        let user_id = inner.round_robin.pop_front()?;
        let queue = inner.per_user.get_mut(&user_id)?;
        let transaction_id = queue.pop_front()?;
        if queue.is_empty() {
            inner.per_user.remove(&user_id);
        } else {
            inner.round_robin.push_back(user_id);
        }
        inner.len -= 1;
        Some((user_id, transaction_id))
    }

    /// Waits for an item or queue closure. None means closed and drained.
    pub async fn pop(&self) -> Option<(Uuid, Uuid)> {
        loop {
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.inner.lock().expect("eval queue poisoned").closed {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Stops accepting work; pending items remain poppable for draining.
    pub fn close(&self) {
        self.inner.lock().expect("eval queue poisoned").closed = true;
        self.notify.notify_waiters();
    }
}

/// Plain bounded FIFO with the same close-and-drain semantics, used by the
/// dispatch pool.
pub struct WorkQueue<T> {
    inner: Mutex<WorkQueueInner<T>>,
    notify: Notify,
    capacity: usize,
}

struct WorkQueueInner<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(WorkQueueInner {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("work queue poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn try_enqueue(&self, item: T) -> Result<(), EnqueueError> {
        {
            let mut inner = self.inner.lock().expect("work queue poisoned");
            if inner.closed {
                return Err(EnqueueError::Closed);
            }
            if inner.items.len() >= self.capacity {
                return Err(EnqueueError::Full);
            }
            inner.items.push_back(item);
        }
        self.notify.notify_one();
        Ok(())
    }

    pub fn try_pop(&self) -> Option<T> {
        self.inner
            .lock()
            .expect("work queue poisoned")
            .items
            .pop_front()
    }

    pub async fn pop(&self) -> Option<T> {
        loop {
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.inner.lock().expect("work queue poisoned").closed {
                return None;
            }
            self.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.inner.lock().expect("work queue poisoned").closed = true;
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_when_full() {
        let queue = EvalQueue::new(2);
        let user = Uuid::new_v4();
        queue.try_enqueue(user, Uuid::new_v4()).unwrap();
        queue.try_enqueue(user, Uuid::new_v4()).unwrap();
        assert_eq!(
            queue.try_enqueue(user, Uuid::new_v4()),
            Err(EnqueueError::Full)
        );
    }

    #[test]
    fn drains_users_round_robin() {
        let queue = EvalQueue::new(16);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let a = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let b = [Uuid::new_v4()];
        for txn in a {
            queue.try_enqueue(alice, txn).unwrap();
        }
        queue.try_enqueue(bob, b[0]).unwrap();

        // bob's single txn must come out second, not last
        assert_eq!(queue.try_pop(), Some((alice, a[0])));
        assert_eq!(queue.try_pop(), Some((bob, b[0])));
        assert_eq!(queue.try_pop(), Some((alice, a[1])));
        assert_eq!(queue.try_pop(), Some((alice, a[2])));
        assert_eq!(queue.try_pop(), None);
    }

    #[tokio::test]
    async fn close_lets_pending_work_drain() {
        let queue = EvalQueue::new(4);
        let user = Uuid::new_v4();
        let txn = Uuid::new_v4();
        queue.try_enqueue(user, txn).unwrap();
        queue.close();

        assert_eq!(
            queue.try_enqueue(user, Uuid::new_v4()),
            Err(EnqueueError::Closed)
        );
        assert_eq!(queue.pop().await, Some((user, txn)));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn work_queue_fifo_and_close() {
        let queue: WorkQueue<u32> = WorkQueue::new(8);
        queue.try_enqueue(1).unwrap();
        queue.try_enqueue(2).unwrap();
        assert_eq!(queue.pop().await, Some(1));
        queue.close();
        assert_eq!(queue.pop().await, Some(2));
        assert_eq!(queue.pop().await, None);
    }
}
