use std::{
    fs::File,
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    mmap::{Access, MappedRegion, MappedView, MappingError},
};

/// A read-only input file and its size at open time.
///
/// The file must not be modified while it is open; mappings handed out by
/// [`InputFile::map`] and [`InputFile::map_range`] rely on that.
#[derive(Debug)]
pub struct InputFile {
    file: File,
    path: PathBuf,
    size: u64,
}

impl InputFile {
    pub fn open(path: impl AsRef<Path>) -> Result<InputFile> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| Error::Open {
            path: path.clone(),
            source,
        };
        let file = File::open(&path).map_err(open_err)?;
        let size = file.metadata().map_err(open_err)?.len();
        Ok(InputFile { file, path, size })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// See [`MappedRegion::map`].
    pub fn map(
        &self,
        length: usize,
        offset: u64,
        access: Access,
    ) -> Result<MappedRegion, MappingError> {
        MappedRegion::map(self, length, offset, access)
    }

    /// See [`MappedView::map_range`].
    pub fn map_range(&self, begin: u64, end: u64, access: Access) -> Result<MappedView, MappingError> {
        MappedView::map_range(self, begin, end, access)
    }

    pub(crate) fn as_file(&self) -> &File {
        &self.file
    }
}
