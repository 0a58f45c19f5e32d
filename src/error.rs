use std::{io, path::PathBuf};

use crate::{mmap::MappingError, trie::TrieError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can stop a run.
///
/// Per-task failures travel through the task's future and surface here on the
/// thread that waits for it; none of them cross a thread boundary as a panic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open `{}`: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Map(#[from] MappingError),

    /// A single token did not fit into the mapped window starting at `offset`.
    #[error("token starting at byte {offset} is larger than the {window} byte chunk window")]
    OversizedToken { offset: u64, window: u64 },

    /// The dispatcher shut down before the task producing this result ran.
    #[error("dispatcher shut down before the task completed")]
    PoolShutdown,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("task panicked: {0}")]
    TaskPanic(String),

    #[error(transparent)]
    Trie(#[from] TrieError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
