//! VFS Module
//!
//! Storage backend the SQL engine delegates all durable I/O to.
//!
//! ## Responsibilities
//! - Route byte-range operations to one of a fixed set of logical files
//! - Open a storage strategy lazily, once per slot, via an injected factory
//! - Zero-pad reads past the logical end of a file
//! - Marshal 64-bit sizes in an explicit byte order
//!
//! ## Layout
//! ```text
//!   engine ──(slot, op, range)──► Backend
//!                                   │
//!                      ┌────────────┼────────────┬────────────┐
//!                      ▼            ▼            ▼            ▼
//!                    MAIN        JOURNAL        WAL          SHM
//!                      │            │            │            │
//!              Box<dyn StorageStrategy> (opened lazily by the factory)
//! ```

mod backend;
mod disk;
mod memory;
mod slot;

pub use backend::{Backend, ByteOrder, WriteObserver};
pub use disk::DiskFile;
pub use memory::{MemoryFile, INITIAL_CAPACITY};
pub use slot::{FileSlot, SlotRegistry, SLOT_COUNT};

use crate::error::Result;

/// Pluggable storage backing a single logical file.
///
/// Implementations own their bytes exclusively; a strategy instance is never
/// shared between slots.
pub trait StorageStrategy: Send {
    /// Read `[start, end)`, zero-padded past the logical size.
    ///
    /// Always returns exactly `end - start` bytes.
    fn read(&mut self, start: u64, end: u64) -> Result<Vec<u8>>;

    /// Write `bytes` at `start`, extending the logical size if needed.
    fn write(&mut self, start: u64, bytes: &[u8]) -> Result<()>;

    /// Logical size in bytes.
    fn size(&self) -> u64;

    /// Release the underlying storage.
    ///
    /// Strategies without anything to release keep the default no-op.
    fn unlink(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Factory invoked to open the strategy for a slot on first touch.
pub type OpenFn = Box<dyn FnMut(FileSlot) -> Result<Box<dyn StorageStrategy>> + Send>;

/// Factory that backs every slot with a fresh in-memory buffer.
pub fn memory_factory() -> OpenFn {
    Box::new(|_slot| Ok(Box::new(MemoryFile::new()) as Box<dyn StorageStrategy>))
}
