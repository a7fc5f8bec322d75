//! File slots
//!
//! The engine only ever talks about a handful of logical files per database.
//! Each one gets a fixed slot; the registry is sized to the enumeration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VfsError};

/// Number of logical file slots
pub const SLOT_COUNT: usize = 4;

/// A logical file within one database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum FileSlot {
    /// Main database file
    Main = 0,

    /// Rollback journal
    Journal = 1,

    /// Write-ahead log
    Wal = 2,

    /// Shared-memory index
    Shm = 3,
}

impl FileSlot {
    /// All slots, in index order
    pub const ALL: [FileSlot; SLOT_COUNT] =
        [FileSlot::Main, FileSlot::Journal, FileSlot::Wal, FileSlot::Shm];

    /// Resolve a slot from its integer index
    pub fn from_index(index: u32) -> Result<Self> {
        match index {
            0 => Ok(FileSlot::Main),
            1 => Ok(FileSlot::Journal),
            2 => Ok(FileSlot::Wal),
            3 => Ok(FileSlot::Shm),
            _ => Err(VfsError::UnknownSlot(index)),
        }
    }

    /// Resolve a slot from a file name the engine asked for.
    ///
    /// "app.db-journal" → Journal, "app.db-wal" → Wal, "app.db-shm" → Shm,
    /// anything else → Main.
    pub fn from_file_name(name: &str) -> Self {
        FileSlot::ALL
            .into_iter()
            .skip(1)
            .find(|slot| name.ends_with(slot.suffix()))
            .unwrap_or(FileSlot::Main)
    }

    /// Integer index of this slot
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name suffix appended to the database name
    pub fn suffix(self) -> &'static str {
        match self {
            FileSlot::Main => "",
            FileSlot::Journal => "-journal",
            FileSlot::Wal => "-wal",
            FileSlot::Shm => "-shm",
        }
    }

    /// Full logical file name for a database
    pub fn file_name(self, db_name: &str) -> String {
        format!("{}{}", db_name, self.suffix())
    }
}

impl fmt::Display for FileSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileSlot::Main => "main",
            FileSlot::Journal => "journal",
            FileSlot::Wal => "wal",
            FileSlot::Shm => "shm",
        };
        f.write_str(name)
    }
}

/// Fixed-size table of per-slot state.
///
/// A slot is empty until first touched and goes back to empty on `take`.
pub struct SlotRegistry<T> {
    slots: [Option<T>; SLOT_COUNT],
}

impl<T> SlotRegistry<T> {
    /// Create a registry with every slot empty
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Whether the slot currently holds a value
    pub fn is_occupied(&self, slot: FileSlot) -> bool {
        self.slots[slot.index()].is_some()
    }

    pub fn get(&self, slot: FileSlot) -> Option<&T> {
        self.slots[slot.index()].as_ref()
    }

    /// Get the slot's value, creating it with `init` if the slot is empty.
    ///
    /// `init` runs at most once per occupancy; an error leaves the slot empty.
    pub fn get_or_try_insert_with<F>(&mut self, slot: FileSlot, init: F) -> Result<&mut T>
    where
        F: FnOnce() -> Result<T>,
    {
        let entry = &mut self.slots[slot.index()];
        let value = match entry.take() {
            Some(value) => value,
            None => init()?,
        };
        Ok(entry.insert(value))
    }

    /// Remove and return the slot's value, leaving it empty
    pub fn take(&mut self, slot: FileSlot) -> Option<T> {
        self.slots[slot.index()].take()
    }

    /// Iterate over occupied slots
    pub fn occupied(&self) -> impl Iterator<Item = (FileSlot, &T)> {
        FileSlot::ALL
            .into_iter()
            .zip(self.slots.iter())
            .filter_map(|(slot, value)| value.as_ref().map(|v| (slot, v)))
    }

    /// Empty every slot
    pub fn clear(&mut self) {
        for entry in self.slots.iter_mut() {
            *entry = None;
        }
    }
}

impl<T> Default for SlotRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
