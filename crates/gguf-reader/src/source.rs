//! Random-access byte sources the reader walks over.
//!
//! The reader never keeps a cursor inside the source: every read names an
//! absolute offset, so one source can back several readers at once.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::error::{GGUFError, Result};

/// Immutable, randomly addressable bytes.
pub trait ByteSource {
    fn size(&self) -> u64;

    /// Borrow `len` bytes starting at `offset`.
    ///
    /// Fails with [`GGUFError::OutOfBounds`] when `offset + len > size()`.
    fn read_at(&self, offset: u64, len: u64) -> Result<&[u8]>;
}

fn slice_at(bytes: &[u8], offset: u64, len: u64) -> Result<&[u8]> {
    let size = bytes.len() as u64;
    let oob = || GGUFError::OutOfBounds { offset, len, size };
    let end = offset.checked_add(len).filter(|&end| end <= size).ok_or_else(oob)?;
    // Both bounds are <= bytes.len(), so they fit in usize.
    Ok(&bytes[offset as usize..end as usize])
}

impl ByteSource for [u8] {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, len: u64) -> Result<&[u8]> {
        slice_at(self, offset, len)
    }
}

impl ByteSource for Vec<u8> {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, len: u64) -> Result<&[u8]> {
        slice_at(self, offset, len)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read_at(&self, offset: u64, len: u64) -> Result<&[u8]> {
        (**self).read_at(offset, len)
    }
}

/// A read-only memory map of a file on disk.
pub struct MappedFile {
    path: PathBuf,
    mmap: Mmap,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and never handed out mutably.
        // Concurrent truncation of the file by another process is outside
        // what a reader can guard against.
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(path = %path.display(), size = mmap.len(), "mapped file");
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}

impl ByteSource for MappedFile {
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_at(&self, offset: u64, len: u64) -> Result<&[u8]> {
        slice_at(&self.mmap, offset, len)
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("size", &self.mmap.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn slice_reads_are_bounds_checked() {
        let bytes: &[u8] = &[1, 2, 3, 4];
        assert_eq!(bytes.size(), 4);
        assert_eq!(bytes.read_at(1, 2).unwrap(), &[2, 3]);
        assert_eq!(bytes.read_at(4, 0).unwrap(), &[] as &[u8]);

        let err = bytes.read_at(3, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        assert_eq!(err.offset(), Some(3));
    }

    #[test]
    fn overflowing_range_is_out_of_bounds() {
        let bytes = vec![0u8; 8];
        let err = bytes.read_at(u64::MAX, 2).unwrap_err();
        assert!(matches!(err, GGUFError::OutOfBounds { size: 8, .. }));
    }

    #[test]
    fn mapped_file_reads() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"GGUFrest").unwrap();
        tmp.flush().unwrap();

        let mapped = MappedFile::open(tmp.path()).unwrap();
        assert_eq!(mapped.size(), 8);
        assert_eq!(mapped.read_at(0, 4).unwrap(), b"GGUF");
        assert!(mapped.read_at(6, 4).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = MappedFile::open(Path::new("/definitely/not/here.gguf")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
