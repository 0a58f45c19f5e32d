//! Mutex-protected FIFO used as one worker's task queue.
//!
//! `try_*` operations never block: they fail if the lock is contended or the
//! queue has nothing to give. `wait_*` operations block until they succeed or
//! the queue is closed. A closed queue rejects pushes but still hands out the
//! items it holds, so consumers drain it before seeing "closed".

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError},
};

#[derive(Debug)]
pub struct TaskQueue<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
    drained: Condvar,
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> TaskQueue<T> {
        TaskQueue {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Pushes without waiting for the lock. Gives the item back if the lock
    /// is held elsewhere or the queue is closed.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut state = match self.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(item),
        };
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Pops without waiting for the lock. `None` if the lock is held
    /// elsewhere or nothing is queued.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = match self.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        let item = state.items.pop_front();
        if item.is_some() && state.items.is_empty() {
            self.drained.notify_all();
        }
        item
    }

    /// Pushes, waiting for the lock. Gives the item back only if the queue is
    /// closed.
    pub fn wait_push(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Blocks until an item is available. Returns `None` once the queue is
    /// closed and empty.
    pub fn wait_pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                if state.items.is_empty() {
                    self.drained.notify_all();
                }
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.drained.notify_all();
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until the queue holds no items. Only a snapshot: another
    /// thread may push right after this returns.
    pub fn wait_until_empty(&self) {
        let state = self.lock();
        let _state = self
            .drained
            .wait_while(state, |s| !s.items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Rejects further pushes and wakes every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
        self.drained.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
