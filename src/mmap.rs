//! Read-only memory mappings over byte ranges of an [`InputFile`].
//!
//! A [`MappedRegion`] owns one mapping and unmaps it when dropped. A
//! [`MappedView`] pairs a region with the exact `[begin, end)` byte range a
//! caller asked for: the region itself is widened to allocation-granularity
//! boundaries, the view is not.

use std::{io, ops::Range, sync::OnceLock};

use memmap2::{Mmap, MmapOptions};

use crate::input::InputFile;

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("range of {length} bytes at offset {offset} exceeds the {file_size} byte file")]
    OutOfBounds {
        offset: u64,
        length: u64,
        file_size: u64,
    },

    #[error("mmap failed: {0}")]
    Os(#[source] io::Error),
}

/// How the pages of a mapping are backed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Access {
    /// Pages are shared with the page cache.
    #[default]
    Shared,
    /// Private copy-on-write pages, still mapped read-only.
    Private,
}

/// Granularity that mapping offsets must be aligned to. Always a power of two.
pub fn allocation_granularity() -> usize {
    static GRANULE: OnceLock<usize> = OnceLock::new();
    *GRANULE.get_or_init(query_granularity)
}

#[cfg(unix)]
fn query_granularity() -> usize {
    // SAFETY: sysconf has no preconditions.
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page > 0 && (page as usize).is_power_of_two() {
        page as usize
    } else {
        4096
    }
}

#[cfg(not(unix))]
fn query_granularity() -> usize {
    // windows hands out address space in 64 KiB units
    64 * 1024
}

/// Rounds `value` down to a multiple of the allocation granularity.
pub fn align_down(value: u64) -> u64 {
    value & !(allocation_granularity() as u64 - 1)
}

/// Rounds `value` up to a multiple of the allocation granularity.
pub fn align_up(value: u64) -> u64 {
    let mask = allocation_granularity() as u64 - 1;
    value.saturating_add(mask) & !mask
}

/// A mapping of `[offset, offset + len)` of a file.
///
/// The region is the sole owner of its mapping; it is unmapped exactly once,
/// on drop, and only if something was mapped. Empty regions own nothing.
#[derive(Debug)]
pub struct MappedRegion {
    map: Option<Mmap>,
    offset: u64,
}

impl MappedRegion {
    /// Maps `length` bytes of `file` starting at `offset`; `length == 0` maps
    /// everything from `offset` to the end of the file.
    pub fn map(
        file: &InputFile,
        length: usize,
        offset: u64,
        access: Access,
    ) -> Result<MappedRegion, MappingError> {
        let file_size = file.size();
        let length = if length == 0 {
            file_size.saturating_sub(offset)
        } else {
            length as u64
        };
        let out_of_bounds = MappingError::OutOfBounds {
            offset,
            length,
            file_size,
        };
        match offset.checked_add(length) {
            Some(end) if end <= file_size => {}
            _ => return Err(out_of_bounds),
        }
        if length == 0 {
            return Ok(MappedRegion::empty(offset));
        }
        let Ok(len) = usize::try_from(length) else {
            return Err(out_of_bounds);
        };

        let mut options = MmapOptions::new();
        options.offset(offset).len(len);
        // SAFETY: the file is opened read-only and callers must not modify it
        // while any mapping over it is alive.
        let map = unsafe {
            match access {
                Access::Shared => options.map(file.as_file()),
                Access::Private => options.map_copy_read_only(file.as_file()),
            }
        }
        .map_err(MappingError::Os)?;

        Ok(MappedRegion {
            map: Some(map),
            offset,
        })
    }

    pub fn empty(offset: u64) -> MappedRegion {
        MappedRegion { map: None, offset }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// File offset of the first mapped byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_none()
    }
}

/// An exact byte range of a file, backed by a granularity-aligned region.
#[derive(Debug)]
pub struct MappedView {
    region: MappedRegion,
    range: Range<usize>,
}

impl MappedView {
    /// Maps the bytes `[begin, end)` of `file`.
    ///
    /// The underlying mapping starts at `begin` rounded down and ends at `end`
    /// rounded up (clamped to the file size), so consecutive calls over
    /// adjacent ranges touch at most one shared page at their seam.
    pub fn map_range(
        file: &InputFile,
        begin: u64,
        end: u64,
        access: Access,
    ) -> Result<MappedView, MappingError> {
        let file_size = file.size();
        if begin > end || end > file_size {
            return Err(MappingError::OutOfBounds {
                offset: begin,
                length: end.saturating_sub(begin),
                file_size,
            });
        }
        if begin == end {
            return Ok(MappedView {
                region: MappedRegion::empty(begin),
                range: 0..0,
            });
        }

        let map_begin = align_down(begin);
        let map_end = align_up(end).min(file_size);
        let length = usize::try_from(map_end - map_begin).map_err(|_| {
            MappingError::OutOfBounds {
                offset: map_begin,
                length: map_end - map_begin,
                file_size,
            }
        })?;
        let region = MappedRegion::map(file, length, map_begin, access)?;

        let start = (begin - map_begin) as usize;
        let len = (end - begin) as usize;
        debug_assert!(start + len <= region.len());
        Ok(MappedView {
            region,
            range: start..start + len,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.region.as_bytes()[self.range.clone()]
    }

    /// File offset of the first byte of the view.
    pub fn offset(&self) -> u64 {
        self.region.offset() + self.range.start as u64
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Shortens the view to its first `len` bytes. No effect if `len` is not
    /// shorter than the view.
    pub fn truncate(&mut self, len: usize) {
        if len < self.range.len() {
            self.range.end = self.range.start + len;
        }
    }

    pub fn region(&self) -> &MappedRegion {
        &self.region
    }
}
