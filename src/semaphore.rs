use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Counting semaphore bounding how many tasks are in flight.
///
/// Permits are RAII guards: a permit moved into a task is released when the
/// task drops it, including while unwinding from a panic, so every acquire is
/// matched by exactly one release.
#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<Counts>,
    released: Condvar,
    capacity: usize,
}

#[derive(Debug)]
struct Counts {
    held: usize,
    peak: usize,
}

impl Semaphore {
    pub fn new(capacity: usize) -> Arc<Semaphore> {
        Arc::new(Semaphore {
            state: Mutex::new(Counts { held: 0, peak: 0 }),
            released: Condvar::new(),
            capacity: capacity.max(1),
        })
    }

    /// Blocks until a permit is free.
    pub fn acquire(self: &Arc<Self>) -> Permit {
        let state = self.lock();
        let mut state = self
            .released
            .wait_while(state, |s| s.held >= self.capacity)
            .unwrap_or_else(PoisonError::into_inner);
        state.held += 1;
        state.peak = state.peak.max(state.held);
        Permit {
            semaphore: self.clone(),
        }
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<Permit> {
        let mut state = self.lock();
        if state.held >= self.capacity {
            return None;
        }
        state.held += 1;
        state.peak = state.peak.max(state.held);
        Some(Permit {
            semaphore: self.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held.
    pub fn held(&self) -> usize {
        self.lock().held
    }

    /// Highest number of permits ever held at once.
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    fn release(&self) {
        let mut state = self.lock();
        debug_assert!(state.held > 0, "released more permits than acquired");
        state.held = state.held.saturating_sub(1);
        drop(state);
        self.released.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, Counts> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One admission slot; released on drop.
#[derive(Debug)]
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit {
    semaphore: Arc<Semaphore>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}
