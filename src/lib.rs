//! Counts the distinct space-separated tokens of a large file.
//!
//! The file is memory-mapped in delimiter-aligned chunks ([`chunk`]), each
//! chunk is scanned into a partial [`WordSet`] on a fixed worker pool
//! ([`dispatch`]), and partial sets are merged pairwise until one remains
//! ([`reduce`]). Two set backends are provided: a hash set of owned tokens
//! and a compact arena trie for lowercase words ([`trie`]).

pub mod chunk;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod future;
pub mod input;
pub mod mmap;
pub mod queue;
pub mod reduce;
pub mod semaphore;
pub mod trie;
pub mod word_set;

use std::path::Path;

pub use crate::{
    config::{Config, OversizedPolicy},
    error::{Error, Result},
    reduce::SplitReduce,
    trie::TrieWordSet,
    word_set::{HashWordSet, WordSet},
};

/// Runs a fresh engine over `path` and returns the number of distinct tokens.
pub fn count_distinct_words<S: WordSet>(path: impl AsRef<Path>, config: Config) -> Result<usize> {
    let engine = SplitReduce::new(config)?;
    let words: S = engine.apply_to_file_at_path(path)?;
    Ok(words.len())
}
