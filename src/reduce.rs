//! Turns a file into one [`WordSet`] with a balanced tree of pairwise merges.
//!
//! The calling thread drives everything: it reads chunks, submits scan tasks,
//! and whenever two partial results are finished it submits a merge of them
//! instead of reading further. Every scan or merge task holds one admission
//! permit for its whole lifetime, so at most `workers × load_factor` partial
//! sets exist in flight at once, however far the reader is ahead of the
//! workers.

use std::{collections::VecDeque, path::Path, sync::Arc};

use crate::{
    chunk::ChunkReader,
    config::Config,
    dispatch::Dispatcher,
    error::Result,
    future::TaskFuture,
    semaphore::{Permit, Semaphore},
    word_set::WordSet,
};

pub struct SplitReduce {
    config: Config,
    dispatcher: Dispatcher,
    admission: Arc<Semaphore>,
}

impl SplitReduce {
    pub fn new(config: Config) -> Result<SplitReduce> {
        config.validate()?;
        let dispatcher = Dispatcher::from_config(&config)?;
        let admission = Semaphore::new(config.admission_capacity());
        Ok(SplitReduce {
            config,
            dispatcher,
            admission,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Most scan or merge tasks that were ever in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.admission.peak()
    }

    pub fn apply_to_file_at_path<S: WordSet>(&self, path: impl AsRef<Path>) -> Result<S> {
        let reader = ChunkReader::open(path, &self.config)?;
        self.apply(reader)
    }

    /// Scans every chunk `reader` produces and unions the results.
    ///
    /// The first failing chunk read, scan or merge ends the run with that
    /// error; there is no partial result.
    pub fn apply<S: WordSet>(&self, mut reader: ChunkReader) -> Result<S> {
        let delimiter = self.config.delimiter;
        let mut pending: VecDeque<TaskFuture<S>> = VecDeque::new();
        let (mut scans, mut merges) = (0usize, 0usize);

        while !reader.is_empty() {
            let permit = self.admission.acquire();

            if let Some((a, b)) = take_two_ready(&mut pending) {
                pending.push_back(self.spawn_merge(a.get()?, b.get()?, permit));
                merges += 1;
                continue;
            }

            let Some(chunk) = reader.next_delimited(delimiter)? else {
                break;
            };
            pending.push_back(self.dispatcher.spawn(move || {
                let _permit = permit;
                S::from_words(chunk.words(delimiter))
            }));
            scans += 1;
        }

        // input exhausted: fold what is left pairwise, oldest first
        while let Some(a) = pending.pop_front() {
            let Some(b) = pending.pop_front() else {
                let result = a.get()?;
                log::debug!(
                    "reduced {scans} chunks with {merges} merges, peak {} tasks in flight",
                    self.admission.peak()
                );
                return Ok(result);
            };
            let (a, b) = (a.get()?, b.get()?);
            let permit = self.admission.acquire();
            pending.push_back(self.spawn_merge(a, b, permit));
            merges += 1;
        }

        log::debug!("no input, nothing to reduce");
        Ok(S::default())
    }

    fn spawn_merge<S: WordSet>(&self, mut a: S, b: S, permit: Permit) -> TaskFuture<S> {
        self.dispatcher.spawn(move || {
            let _permit = permit;
            a.merge(b)?;
            Ok(a)
        })
    }
}

/// Removes the two oldest finished futures, if there are two.
///
/// Only the scheduling thread touches `pending`, so checking and removing
/// happen under one exclusive borrow and a result can't be claimed twice.
fn take_two_ready<S>(
    pending: &mut VecDeque<TaskFuture<S>>,
) -> Option<(TaskFuture<S>, TaskFuture<S>)> {
    let mut ready = pending
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_ready())
        .map(|(i, _)| i);
    let first = ready.next()?;
    let second = ready.next()?;
    // remove the later one first so `first` stays valid
    let b = pending.remove(second)?;
    let a = pending.remove(first)?;
    Some((a, b))
}

#[cfg(test)]
mod test {
    use std::{collections::VecDeque, io::Write};

    use tempfile::NamedTempFile;

    use super::{take_two_ready, SplitReduce};
    use crate::{
        config::{Config, OversizedPolicy},
        error::Error,
        future::{promise, TaskFuture},
        mmap::allocation_granularity,
        trie::{TrieError, TrieWordSet},
        word_set::{HashWordSet, WordSet},
    };

    fn file_with(contents: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(contents).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    fn small_config(workers: usize) -> Config {
        Config {
            workers,
            chunk_size: allocation_granularity(),
            load_factor: 4,
            ..Config::default()
        }
    }

    fn distinct<S: WordSet>(contents: &[u8], config: Config) -> usize {
        let tmp = file_with(contents);
        let engine = SplitReduce::new(config).unwrap();
        engine.apply_to_file_at_path::<S>(tmp.path()).unwrap().len()
    }

    #[test]
    fn counts_small_input() {
        for workers in [1, 2, 8] {
            assert_eq!(distinct::<HashWordSet>(b"a b a c b a", small_config(workers)), 3);
            assert_eq!(distinct::<TrieWordSet>(b"a b a c b a", small_config(workers)), 3);
        }
    }

    #[test]
    fn repeated_word_is_counted_once() {
        let contents = b"x ".repeat(100_000);
        for workers in [1, 4] {
            assert_eq!(distinct::<HashWordSet>(&contents, small_config(workers)), 1);
            assert_eq!(distinct::<TrieWordSet>(&contents, small_config(workers)), 1);
        }
    }

    #[test]
    fn empty_file_gives_empty_set() {
        assert_eq!(distinct::<HashWordSet>(b"", small_config(2)), 0);
        assert_eq!(distinct::<TrieWordSet>(b"", small_config(2)), 0);
        // only delimiters: one chunk, no words
        assert_eq!(distinct::<HashWordSet>(b"     ", small_config(2)), 0);
    }

    #[test]
    fn engine_is_reusable() {
        let engine = SplitReduce::new(small_config(2)).unwrap();
        let first = file_with(b"one two three");
        let second = file_with(b"four four");
        let a: HashWordSet = engine.apply_to_file_at_path(first.path()).unwrap();
        let b: HashWordSet = engine.apply_to_file_at_path(second.path()).unwrap();
        assert_eq!((a.len(), b.len()), (3, 1));
    }

    #[test]
    fn invalid_letters_fail_the_trie_run() {
        let tmp = file_with(b"fine words then Capital ones");
        let engine = SplitReduce::new(small_config(2)).unwrap();
        match engine.apply_to_file_at_path::<TrieWordSet>(tmp.path()) {
            Err(Error::Trie(TrieError::InvalidLetter { byte: b'C' })) => {}
            other => panic!("expected invalid letter, got {:?}", other.map(|s| s.len())),
        }
        // the hash backend takes any bytes
        let words: HashWordSet = engine.apply_to_file_at_path(tmp.path()).unwrap();
        assert_eq!(words.len(), 5);
    }

    #[test]
    fn oversized_token_fails_run_when_configured() {
        let g = allocation_granularity();
        let mut contents = vec![b'a'; 2 * g];
        contents.extend_from_slice(b" b c");
        let config = Config {
            oversized: OversizedPolicy::Fail,
            ..small_config(2)
        };
        let tmp = file_with(&contents);
        let engine = SplitReduce::new(config).unwrap();
        assert!(matches!(
            engine.apply_to_file_at_path::<HashWordSet>(tmp.path()),
            Err(Error::OversizedToken { offset: 0, .. })
        ));

        // the default policy grows the window instead
        assert_eq!(distinct::<HashWordSet>(&contents, small_config(2)), 3);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let engine = SplitReduce::new(small_config(1)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            engine.apply_to_file_at_path::<HashWordSet>(dir.path().join("missing")),
            Err(Error::Open { .. })
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            SplitReduce::new(Config { load_factor: 0, ..Config::default() }),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn take_two_ready_pairs_oldest_ready() {
        let (p0, f0) = promise::<u32>();
        let (_p1, f1) = promise::<u32>();
        let mut pending: VecDeque<TaskFuture<u32>> =
            VecDeque::from([f0, f1, TaskFuture::ready(Ok(2))]);
        assert!(take_two_ready(&mut pending).is_none(), "only one result is ready");
        assert_eq!(pending.len(), 3);

        p0.set(Ok(0));
        pending.push_back(TaskFuture::ready(Ok(3)));
        let (a, b) = take_two_ready(&mut pending).unwrap();
        assert_eq!((a.get().unwrap(), b.get().unwrap()), (0, 2));
        assert_eq!(pending.len(), 2, "the pending and the newest result stay behind");
    }
}
