//! Fixed-size worker pool with one task queue per worker.
//!
//! Submission starts at a rotating slot and probes queues with `try_push`
//! for `spins × workers` attempts before blocking on the slot's own queue.
//! Workers mirror this: they probe every queue with `try_pop`, starting at
//! their own, and only then block on their own queue. Under load both sides
//! mostly take uncontended locks; when idle, workers sleep on a condvar.
//!
//! Dropping the dispatcher closes every queue and joins the workers. Queued
//! tasks are still run, since a closed queue keeps handing out what it holds.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crate::{
    config::Config,
    error::{Error, Result},
    future::{self, TaskFuture},
    queue::TaskQueue,
};

/// A unit of work; receives the index of the worker running it.
pub type Task = Box<dyn FnOnce(usize) + Send + 'static>;

pub struct Dispatcher {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

struct Shared {
    queues: Box<[TaskQueue<Task>]>,
    spins: usize,
    next_slot: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl Dispatcher {
    /// Starts `workers` threads (at least one).
    pub fn new(workers: usize, spins: usize) -> Result<Dispatcher> {
        let count = workers.max(1);
        let shared = Arc::new(Shared {
            queues: (0..count).map(|_| TaskQueue::new()).collect(),
            spins: spins.max(1),
            next_slot: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        });

        let mut this = Dispatcher {
            shared,
            workers: Vec::with_capacity(count),
        };
        for index in 0..count {
            let shared = this.shared.clone();
            // on failure, `this` drops and joins the workers started so far
            let handle = thread::Builder::new()
                .name(format!("uq-worker-{index}"))
                .spawn(move || worker_loop(&shared, index))
                .map_err(Error::Spawn)?;
            this.workers.push(handle);
        }
        log::debug!("dispatcher started with {count} workers");
        Ok(this)
    }

    pub fn from_config(config: &Config) -> Result<Dispatcher> {
        Dispatcher::new(config.workers, config.spins)
    }

    pub fn workers(&self) -> usize {
        self.shared.queues.len()
    }

    /// Queues `task` for execution on some worker.
    ///
    /// Only fails to queue once the pool is shutting down, in which case the
    /// task is dropped unexecuted.
    pub fn submit(&self, task: Task) {
        let shared = &*self.shared;
        let n = shared.queues.len();
        let slot = shared.next_slot.fetch_add(1, Ordering::Relaxed);
        let now = shared.active.fetch_add(1, Ordering::AcqRel) + 1;
        shared.peak_active.fetch_max(now, Ordering::Relaxed);

        let mut task = task;
        for i in 0..shared.spins * n {
            match shared.queues[(slot + i) % n].try_push(task) {
                Ok(()) => return,
                Err(t) => task = t,
            }
        }
        if let Err(task) = shared.queues[slot % n].wait_push(task) {
            shared.active.fetch_sub(1, Ordering::AcqRel);
            log::warn!("dispatcher is shutting down, dropping submitted task");
            drop(task);
        }
    }

    /// Runs `f` on a worker and returns a future for its result.
    ///
    /// A panic inside `f` is caught on the worker and delivered as
    /// [`Error::TaskPanic`]; a task that never runs resolves to
    /// [`Error::PoolShutdown`].
    pub fn spawn<F, R>(&self, f: F) -> TaskFuture<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (promise, future) = future::promise();
        self.submit(Box::new(move |_worker: usize| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f))
                .unwrap_or_else(|payload| Err(Error::TaskPanic(panic_message(&*payload))));
            promise.set(outcome);
        }));
        future
    }

    /// Blocks until every queue is empty. Tasks may still be running, and new
    /// ones may be submitted right after this returns.
    pub fn wait_for_all(&self) {
        for queue in self.shared.queues.iter() {
            queue.wait_until_empty();
        }
    }

    /// Tasks submitted but not yet finished.
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Most tasks that were ever submitted but not yet finished at once.
    pub fn peak_active(&self) -> usize {
        self.shared.peak_active.load(Ordering::Relaxed)
    }

    /// Closes all queues, lets the workers drain them and joins the workers.
    /// Called on drop; idempotent.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        for queue in self.shared.queues.iter() {
            queue.close();
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("dispatcher worker exited with a panic");
            }
        }
        log::debug!("dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared, index: usize) {
    let n = shared.queues.len();
    log::trace!("worker {index} started");
    loop {
        let stolen = (0..shared.spins * n).find_map(|i| shared.queues[(index + i) % n].try_pop());
        let task = match stolen {
            Some(task) => task,
            None => match shared.queues[index].wait_pop() {
                Some(task) => task,
                None => break,
            },
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(index))) {
            log::error!("task on worker {index} panicked: {}", panic_message(&*payload));
        }
        shared.active.fetch_sub(1, Ordering::AcqRel);
    }
    log::trace!("worker {index} exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
