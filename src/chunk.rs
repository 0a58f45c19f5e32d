//! Splits a file into delimiter-aligned chunks without copying its contents.
//!
//! Each chunk is a [`MappedView`] whose last byte is either a delimiter or the
//! last byte of the file, so no token is ever split across two chunks. The
//! bytes after the last delimiter of a window are mapped again as the head of
//! the next window.

use std::path::Path;

use crate::{
    config::{Config, OversizedPolicy},
    error::{Error, Result},
    input::InputFile,
    mmap::{align_down, allocation_granularity, Access, MappedView},
};

/// A word-aligned, read-only view of the input. Owns its mapping, so it can be
/// moved into a task on another thread.
#[derive(Debug)]
pub struct Chunk {
    view: MappedView,
}

impl Chunk {
    pub fn as_bytes(&self) -> &[u8] {
        self.view.as_bytes()
    }

    /// File offset of the first byte.
    pub fn offset(&self) -> u64 {
        self.view.offset()
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Non-empty tokens separated by `delimiter`, borrowed from the mapping.
    pub fn words(&self, delimiter: u8) -> impl Iterator<Item = &[u8]> + '_ {
        self.as_bytes()
            .split(move |b| *b == delimiter)
            .filter(|word| !word.is_empty())
    }
}

/// Single-pass producer of [`Chunk`]s over one file.
///
/// Also an [`Iterator`] over `Result<Chunk>` using the configured delimiter;
/// iteration stops after the first error.
#[derive(Debug)]
pub struct ChunkReader {
    file: InputFile,
    chunk_size: u64,
    bytes_left: u64,
    delimiter: u8,
    oversized: OversizedPolicy,
    failed: bool,
}

impl ChunkReader {
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<ChunkReader> {
        let file = InputFile::open(path)?;
        Ok(ChunkReader::new(file, config))
    }

    pub fn new(file: InputFile, config: &Config) -> ChunkReader {
        ChunkReader::with_chunk_size(file, config.chunk_size as u64)
            .with_delimiter(config.delimiter)
            .with_oversized_policy(config.oversized)
    }

    /// `chunk_size` is rounded down to the allocation granularity, with a
    /// minimum of one granule.
    pub fn with_chunk_size(file: InputFile, chunk_size: u64) -> ChunkReader {
        let chunk_size = align_down(chunk_size).max(allocation_granularity() as u64);
        let bytes_left = file.size();
        ChunkReader {
            file,
            chunk_size,
            bytes_left,
            delimiter: b' ',
            oversized: OversizedPolicy::default(),
            failed: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> ChunkReader {
        self.delimiter = delimiter;
        self
    }

    pub fn with_oversized_policy(mut self, oversized: OversizedPolicy) -> ChunkReader {
        self.oversized = oversized;
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn bytes_left(&self) -> u64 {
        self.bytes_left
    }

    pub fn is_empty(&self) -> bool {
        self.bytes_left == 0
    }

    pub fn file(&self) -> &InputFile {
        &self.file
    }

    /// Produces the next chunk ending at `delimiter` (or at the end of the
    /// file), or `None` once every byte has been handed out.
    ///
    /// On error nothing is consumed.
    pub fn next_delimited(&mut self, delimiter: u8) -> Result<Option<Chunk>> {
        if self.bytes_left == 0 {
            return Ok(None);
        }

        let start = self.file.size() - self.bytes_left;
        let mut window = self.chunk_size.min(self.bytes_left);
        loop {
            let mut view = self
                .file
                .map_range(start, start + window, Access::Shared)?;

            let take = if window == self.bytes_left {
                // the end of the file terminates the last token
                view.len()
            } else if let Some(pos) = memchr::memrchr(delimiter, view.as_bytes()) {
                pos + 1
            } else {
                match self.oversized {
                    OversizedPolicy::Fail => {
                        return Err(Error::OversizedToken {
                            offset: start,
                            window,
                        });
                    }
                    OversizedPolicy::Grow => {
                        window = window.saturating_mul(2).min(self.bytes_left);
                        log::debug!("no delimiter in window at {start}, growing to {window} bytes");
                        continue;
                    }
                }
            };

            view.truncate(take);
            self.bytes_left -= take as u64;
            log::trace!("chunk [{start}..{}), {} bytes left", start + take as u64, self.bytes_left);
            return Ok(Some(Chunk { view }));
        }
    }
}

impl Iterator for ChunkReader {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_delimited(self.delimiter) {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
