//! Growable buffer store
//!
//! Default storage strategy: one owned byte buffer per slot.
//!
//! ## Growth
//! Capacity starts at [`INITIAL_CAPACITY`] and doubles until it covers the
//! end of a write. The logical size tracks the furthest byte ever written and
//! is always `<= capacity`. Bytes between the logical size and the capacity
//! are zero and never handed out.

use tracing::{debug, trace};

use crate::error::{Result, VfsError};

use super::StorageStrategy;

/// Capacity floor for the first allocation
pub const INITIAL_CAPACITY: usize = 4096;

/// In-memory growable buffer backing one logical file
#[derive(Debug, Default)]
pub struct MemoryFile {
    /// Allocated bytes; `buffer.len()` is the capacity
    buffer: Vec<u8>,

    /// Logical (externally visible) size
    size: usize,

    /// Number of times the buffer was reallocated
    reallocations: usize,
}

impl MemoryFile {
    /// Create an empty buffer (no allocation until the first write)
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical size in bytes
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Allocated capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// How many times the buffer has been reallocated
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Read `[start, end)`, zero-padded past the logical size
    pub fn read_range(&self, start: usize, end: usize) -> Result<Vec<u8>> {
        if start > end {
            return Err(VfsError::InvalidRange {
                start: start as u64,
                end: end as u64,
            });
        }

        let mut out = vec![0u8; end - start];
        if start < self.size {
            let stored_end = end.min(self.size);
            out[..stored_end - start].copy_from_slice(&self.buffer[start..stored_end]);
        }

        Ok(out)
    }

    /// Write `bytes` at `start`, growing the buffer geometrically if needed
    pub fn write_at(&mut self, start: usize, bytes: &[u8]) -> Result<()> {
        let end = start
            .checked_add(bytes.len())
            .ok_or(VfsError::OffsetOverflow {
                offset: start as u64,
                len: bytes.len() as u64,
            })?;

        // A failed allocation leaves buffer and size untouched
        self.ensure_capacity(end)?;

        self.buffer[start..end].copy_from_slice(bytes);
        if end > self.size {
            self.size = end;
        }

        Ok(())
    }

    /// Drop all contents and release the allocation
    pub fn clear(&mut self) {
        self.buffer = Vec::new();
        self.size = 0;
    }

    /// Snapshot every page-sized chunk of the allocated buffer.
    ///
    /// Yields `(page_index, bytes)`; the last chunk may be short only if the
    /// capacity is not a multiple of `page_size`.
    pub fn pages(&self, page_size: usize) -> Vec<(u64, Vec<u8>)> {
        if page_size == 0 {
            return Vec::new();
        }

        self.buffer
            .chunks(page_size)
            .enumerate()
            .map(|(index, chunk)| (index as u64, chunk.to_vec()))
            .collect()
    }

    /// Target capacity for a write ending at `end`: the current capacity (or
    /// the floor) doubled until it covers `end`.
    fn grown_capacity(&self, end: usize) -> Option<usize> {
        let mut capacity = if self.buffer.is_empty() {
            INITIAL_CAPACITY
        } else {
            self.buffer.len()
        };

        while capacity < end {
            capacity = capacity.checked_mul(2)?;
        }

        Some(capacity)
    }

    fn ensure_capacity(&mut self, end: usize) -> Result<()> {
        if end <= self.buffer.len() {
            return Ok(());
        }

        let capacity = self.grown_capacity(end).ok_or(VfsError::Allocation {
            requested: end as u64,
        })?;

        let additional = capacity - self.buffer.len();
        self.buffer
            .try_reserve_exact(additional)
            .map_err(|_| VfsError::Allocation {
                requested: capacity as u64,
            })?;

        debug!(
            old_capacity = self.buffer.len(),
            new_capacity = capacity,
            "growing memory file"
        );

        self.buffer.resize(capacity, 0);
        self.reallocations += 1;

        Ok(())
    }
}

impl StorageStrategy for MemoryFile {
    fn read(&mut self, start: u64, end: u64) -> Result<Vec<u8>> {
        trace!(start, end, size = self.size, "memory read");
        self.read_range(to_usize(start)?, to_usize(end)?)
    }

    fn write(&mut self, start: u64, bytes: &[u8]) -> Result<()> {
        trace!(start, len = bytes.len(), size = self.size, "memory write");
        self.write_at(to_usize(start)?, bytes)
    }

    fn size(&self) -> u64 {
        self.size as u64
    }

    fn unlink(&mut self) -> Result<()> {
        debug!(size = self.size, capacity = self.buffer.len(), "unlinking memory file");
        self.clear();
        Ok(())
    }
}

fn to_usize(offset: u64) -> Result<usize> {
    usize::try_from(offset).map_err(|_| VfsError::Allocation { requested: offset })
}
