use std::thread;

use crate::{
    error::{Error, Result},
    mmap::{align_down, allocation_granularity},
};

/// What the chunk reader does when a window holds no delimiter at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OversizedPolicy {
    /// Keep doubling the window for that call until a delimiter or the end of
    /// the file is inside it.
    #[default]
    Grow,
    /// Stop with [`Error::OversizedToken`].
    Fail,
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Target bytes per chunk, rounded down to the allocation granularity.
    pub chunk_size: usize,
    /// Number of dispatcher worker threads.
    pub workers: usize,
    /// Scan or merge tasks allowed in flight per worker.
    pub load_factor: usize,
    /// Probe rounds over all queues before blocking, both in submit and in
    /// the worker loop.
    pub spins: usize,
    pub delimiter: u8,
    pub oversized: OversizedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            workers: default_workers(),
            load_factor: 128,
            spins: 32,
            delimiter: b' ',
            oversized: OversizedPolicy::Grow,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be > 0".into()));
        }
        if self.load_factor == 0 {
            return Err(Error::InvalidConfig("load factor must be > 0".into()));
        }
        if self.spins == 0 {
            return Err(Error::InvalidConfig("spins must be > 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be > 0".into()));
        }
        Ok(())
    }

    /// Chunk size actually used: rounded down to the allocation granularity,
    /// but never below one granule.
    pub fn aligned_chunk_size(&self) -> u64 {
        align_down(self.chunk_size as u64).max(allocation_granularity() as u64)
    }

    /// Maximum number of scan or merge tasks in flight at once.
    pub fn admission_capacity(&self) -> usize {
        self.workers.saturating_mul(self.load_factor)
    }
}

fn default_workers() -> usize {
    match thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            log::warn!("couldn't query the available parallelism ({e}), going single-threaded");
            1
        }
    }
}
