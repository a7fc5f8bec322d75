//! Storage backend multiplexer
//!
//! Routes every engine call to the strategy owning the target slot.
//!
//! ## Slot Lifecycle
//! ```text
//!   empty ──read/write──► open (factory called once) ──delete──► empty
//! ```
//! `access` never opens a slot; `read` and `write` do.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{Result, VfsError};

use super::{FileSlot, OpenFn, SlotRegistry, StorageStrategy};

/// Callback invoked after every successful write with
/// (logical file name, written bytes, byte offset)
pub type WriteObserver = Box<dyn FnMut(&str, &[u8], u64) + Send>;

/// Byte order used to marshal 64-bit sizes into caller buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Probe the host byte order from the in-memory layout of a 16-bit value
    pub fn detect() -> Self {
        let probe = 0x0102u16.to_ne_bytes();
        if probe[0] == 0x02 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    /// Host byte order, probed once per process
    pub fn host() -> Self {
        static HOST: OnceLock<ByteOrder> = OnceLock::new();
        *HOST.get_or_init(Self::detect)
    }

    /// Encode a u64 in this byte order
    pub fn encode_u64(self, value: u64) -> [u8; 8] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    /// Decode a u64 in this byte order
    pub fn decode_u64(self, bytes: [u8; 8]) -> u64 {
        match self {
            ByteOrder::Little => u64::from_le_bytes(bytes),
            ByteOrder::Big => u64::from_be_bytes(bytes),
        }
    }
}

/// The storage backend handed to the SQL engine
///
/// ## Concurrency
/// None internally. The engine serializes its own calls per database handle,
/// so every method takes `&mut self` and completes before returning.
pub struct Backend {
    /// Base name used to derive logical file names
    db_name: String,

    /// Byte order for `size_into`
    byte_order: ByteOrder,

    /// Factory opening a strategy for a slot on first touch
    open: OpenFn,

    /// One strategy per touched slot
    files: SlotRegistry<Box<dyn StorageStrategy>>,

    /// Optional write tap (page tracing)
    observer: Option<WriteObserver>,
}

impl Backend {
    /// Create a backend with the host byte order
    pub fn new(db_name: impl Into<String>, open: OpenFn) -> Self {
        Self {
            db_name: db_name.into(),
            byte_order: ByteOrder::host(),
            open,
            files: SlotRegistry::new(),
            observer: None,
        }
    }

    /// Create a backend from a validated config
    pub fn from_config(config: &Config, open: OpenFn) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.db_name.clone(), open).with_byte_order(config.byte_order))
    }

    /// Override the byte order used for size marshaling
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Install a write observer, replacing any previous one
    pub fn set_observer(&mut self, observer: WriteObserver) {
        self.observer = Some(observer);
    }

    /// Remove the write observer
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    // =========================================================================
    // Engine-facing Operations
    // =========================================================================

    /// Whether the slot currently has an open strategy
    pub fn access(&self, slot: FileSlot) -> bool {
        self.files.is_occupied(slot)
    }

    /// Logical size of the slot (0 when unopened)
    pub fn size(&self, slot: FileSlot) -> u64 {
        self.files.get(slot).map(|file| file.size()).unwrap_or(0)
    }

    /// Write the slot's size into a caller-owned buffer in the backend's byte order
    pub fn size_into(&self, slot: FileSlot, out: &mut [u8; 8]) {
        *out = self.byte_order.encode_u64(self.size(slot));
    }

    /// Read exactly `len` bytes at `offset`, zero-padded past the logical end
    pub fn read(&mut self, slot: FileSlot, offset: u64, len: usize) -> Result<Vec<u8>> {
        let end = checked_end(offset, len)?;
        trace!(%slot, offset, len, "backend read");

        let file = self.open_slot(slot)?;
        file.read(offset, end)
    }

    /// Fill `buf` from `offset`, zero-padded past the logical end
    pub fn read_into(&mut self, slot: FileSlot, offset: u64, buf: &mut [u8]) -> Result<()> {
        let stored = self.read(slot, offset, buf.len())?;
        buf.copy_from_slice(&stored);
        Ok(())
    }

    /// Write `bytes` at `offset`, extending the logical size as needed
    pub fn write(&mut self, slot: FileSlot, offset: u64, bytes: &[u8]) -> Result<()> {
        checked_end(offset, bytes.len())?;
        trace!(%slot, offset, len = bytes.len(), "backend write");

        self.open_slot(slot)?.write(offset, bytes)?;

        if let Some(observer) = self.observer.as_mut() {
            let name = slot.file_name(&self.db_name);
            observer(&name, bytes, offset);
        }

        Ok(())
    }

    /// Release the slot's storage and reset it to unopened
    pub fn delete(&mut self, slot: FileSlot) -> Result<()> {
        if let Some(mut file) = self.files.take(slot) {
            debug!(%slot, size = file.size(), "deleting slot");
            file.unlink()?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Base database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Logical file name for a slot
    pub fn file_name(&self, slot: FileSlot) -> String {
        slot.file_name(&self.db_name)
    }

    /// Byte order used by `size_into`
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Slots that currently have an open strategy
    pub fn open_slots(&self) -> Vec<FileSlot> {
        self.files.occupied().map(|(slot, _)| slot).collect()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn open_slot(&mut self, slot: FileSlot) -> Result<&mut Box<dyn StorageStrategy>> {
        let open = &mut self.open;
        self.files.get_or_try_insert_with(slot, || {
            debug!(%slot, "opening slot");
            open(slot)
        })
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        debug!(db = %self.db_name, open_slots = self.open_slots().len(), "tearing down backend");
    }
}

fn checked_end(offset: u64, len: usize) -> Result<u64> {
    offset
        .checked_add(len as u64)
        .ok_or(VfsError::OffsetOverflow {
            offset,
            len: len as u64,
        })
}
