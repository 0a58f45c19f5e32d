//! Single-assignment result slot shared by a task and whoever submitted it.
//!
//! The worker side holds a [`Promise`], the caller a [`TaskFuture`]. The
//! promise writes exactly once; dropping it unfulfilled (the task was never
//! run) resolves the future to [`Error::PoolShutdown`], so a waiter can never
//! hang on a task that will not execute.

use std::{
    mem,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::error::{Error, Result};

pub fn promise<R>() -> (Promise<R>, TaskFuture<R>) {
    let slot = Arc::new(Slot::new(State::Pending));
    (
        Promise {
            slot: Some(slot.clone()),
        },
        TaskFuture { slot },
    )
}

pub struct Promise<R> {
    slot: Option<Arc<Slot<R>>>,
}

impl<R> Promise<R> {
    pub fn set(mut self, value: Result<R>) {
        if let Some(slot) = self.slot.take() {
            slot.fulfil(value);
        }
    }
}

impl<R> Drop for Promise<R> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.fulfil(Err(Error::PoolShutdown));
        }
    }
}

/// The result of a submitted task, observed exactly once via [`get`](Self::get).
pub struct TaskFuture<R> {
    slot: Arc<Slot<R>>,
}

impl<R> TaskFuture<R> {
    /// A future that is already resolved.
    pub fn ready(value: Result<R>) -> TaskFuture<R> {
        TaskFuture {
            slot: Arc::new(Slot::new(State::Ready(value))),
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.slot.lock().is_pending()
    }

    /// Blocks until the result is available.
    pub fn wait(&self) {
        let state = self.slot.lock();
        let _state = self
            .slot
            .ready
            .wait_while(state, |s| s.is_pending())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks for at most `timeout`; returns whether the result is available.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let state = self.slot.lock();
        let (state, _) = self
            .slot
            .ready
            .wait_timeout_while(state, timeout, |s| s.is_pending())
            .unwrap_or_else(PoisonError::into_inner);
        !state.is_pending()
    }

    /// Blocks until the result is available and takes it.
    pub fn get(self) -> Result<R> {
        let state = self.slot.lock();
        let mut state = self
            .slot
            .ready
            .wait_while(state, |s| s.is_pending())
            .unwrap_or_else(PoisonError::into_inner);
        match mem::replace(&mut *state, State::Taken) {
            State::Ready(value) => value,
            State::Pending | State::Taken => Err(Error::PoolShutdown),
        }
    }
}

struct Slot<R> {
    state: Mutex<State<R>>,
    ready: Condvar,
}

impl<R> Slot<R> {
    fn new(state: State<R>) -> Slot<R> {
        Slot {
            state: Mutex::new(state),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fulfil(&self, value: Result<R>) {
        let mut state = self.lock();
        if state.is_pending() {
            *state = State::Ready(value);
        }
        drop(state);
        self.ready.notify_all();
    }
}

enum State<R> {
    Pending,
    Ready(Result<R>),
    Taken,
}

impl<R> State<R> {
    fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }
}

#[cfg(test)]
mod test {
    use std::{thread, time::Duration};

    use super::{promise, TaskFuture};
    use crate::error::Error;

    #[test]
    fn future_and_promise_are_send() {
        fn is_send<T: Send>() {}
        is_send::<TaskFuture<Vec<u8>>>();
        is_send::<super::Promise<Vec<u8>>>();
    }

    #[test]
    fn value_crosses_threads() {
        let (tx, rx) = promise::<u32>();
        assert!(!rx.is_ready());
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.set(Ok(7));
        });
        rx.wait();
        assert!(rx.is_ready());
        assert_eq!(rx.get().unwrap(), 7);
    }

    #[test]
    fn dropped_promise_poisons_future() {
        let (tx, rx) = promise::<u32>();
        drop(tx);
        assert!(rx.is_ready());
        assert!(matches!(rx.get(), Err(Error::PoolShutdown)));
    }

    #[test]
    fn errors_are_delivered() {
        let (tx, rx) = promise::<u32>();
        tx.set(Err(Error::TaskPanic("boom".into())));
        match rx.get() {
            Err(Error::TaskPanic(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected task panic, got {other:?}"),
        }
    }

    #[test]
    fn ready_future() {
        let f = TaskFuture::ready(Ok("done"));
        assert!(f.is_ready());
        assert!(f.wait_for(Duration::ZERO));
        assert_eq!(f.get().unwrap(), "done");
    }
}
