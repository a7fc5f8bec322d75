//! File-backed storage strategy
//!
//! Same contract as [`MemoryFile`](super::MemoryFile), but the bytes live in
//! a regular file. Durability is whatever the OS gives us; nothing here syncs.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Result, VfsError};

use super::{FileSlot, OpenFn, StorageStrategy};

/// A logical file stored on disk
#[derive(Debug)]
pub struct DiskFile {
    path: PathBuf,

    /// `None` after unlink; reopened lazily on the next write
    file: Option<File>,

    /// Cached logical size
    size: u64,
}

impl DiskFile {
    /// Open or create the file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = Self::open_file(path)?;
        let size = file.metadata()?.len();

        debug!(path = %path.display(), size, "opened disk file");

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            size,
        })
    }

    /// Factory storing each slot as `{dir}/{db_name}{suffix}`
    pub fn factory(dir: impl Into<PathBuf>, db_name: impl Into<String>) -> OpenFn {
        let dir = dir.into();
        let db_name = db_name.into();
        Box::new(move |slot: FileSlot| {
            let path = dir.join(slot.file_name(&db_name));
            Ok(Box::new(DiskFile::open(&path)?) as Box<dyn StorageStrategy>)
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(path: &Path) -> Result<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }
}

impl StorageStrategy for DiskFile {
    fn read(&mut self, start: u64, end: u64) -> Result<Vec<u8>> {
        if start > end {
            return Err(VfsError::InvalidRange { start, end });
        }

        trace!(path = %self.path.display(), start, end, "disk read");

        let len = usize::try_from(end - start)
            .map_err(|_| VfsError::Allocation { requested: end - start })?;
        let mut out = vec![0u8; len];

        let file = match self.file.as_mut() {
            Some(file) if start < self.size => file,
            _ => return Ok(out),
        };

        // Only the stored prefix is read; the rest stays zero
        let stored = (end.min(self.size) - start) as usize;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut out[..stored])?;

        Ok(out)
    }

    fn write(&mut self, start: u64, bytes: &[u8]) -> Result<()> {
        let end = start
            .checked_add(bytes.len() as u64)
            .ok_or(VfsError::OffsetOverflow {
                offset: start,
                len: bytes.len() as u64,
            })?;

        trace!(path = %self.path.display(), start, len = bytes.len(), "disk write");

        let file = match self.file.take() {
            Some(file) => file,
            None => Self::open_file(&self.path)?,
        };
        let file = self.file.insert(file);

        // Seeking past EOF and writing leaves a zero-filled hole
        file.seek(SeekFrom::Start(start))?;
        file.write_all(bytes)?;

        if end > self.size {
            self.size = end;
        }

        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn unlink(&mut self) -> Result<()> {
        debug!(path = %self.path.display(), "unlinking disk file");

        self.file = None;
        self.size = 0;

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
