//! Configuration for memvfs
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, VfsError};
use crate::vfs::ByteOrder;

/// Smallest page size the codec accepts
pub const MIN_PAGE_SIZE: usize = 512;

/// Largest page size the codec accepts
pub const MAX_PAGE_SIZE: usize = 65536;

/// Default page size
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Main configuration for a memvfs session
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Naming
    // -------------------------------------------------------------------------
    /// Base name of the database. Logical file names derive from it:
    ///   {db_name}            (main database)
    ///   {db_name}-journal    (rollback journal)
    ///   {db_name}-wal        (write-ahead log)
    ///   {db_name}-shm        (shared-memory index)
    pub db_name: String,

    // -------------------------------------------------------------------------
    // Page Configuration
    // -------------------------------------------------------------------------
    /// Page size in bytes (power of two, 512..=65536)
    pub page_size: usize,

    /// Byte order used when marshaling 64-bit sizes
    pub byte_order: ByteOrder,

    // -------------------------------------------------------------------------
    // Tracing Configuration
    // -------------------------------------------------------------------------
    /// Decode and diff every page-aligned write to the main database
    pub trace_pages: bool,

    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory for file-backed slots. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_name: "main.db".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            byte_order: ByteOrder::host(),
            trace_pages: false,
            data_dir: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two()
            || self.page_size < MIN_PAGE_SIZE
            || self.page_size > MAX_PAGE_SIZE
        {
            return Err(VfsError::Config(format!(
                "page size must be a power of two in {}..={}, got {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.db_name.is_empty() {
            return Err(VfsError::Config("database name must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database base name
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.config.db_name = name.into();
        self
    }

    /// Set the page size (in bytes)
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Override the byte order used for size marshaling
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.config.byte_order = order;
        self
    }

    /// Enable or disable page tracing
    pub fn trace_pages(mut self, enabled: bool) -> Self {
        self.config.trace_pages = enabled;
        self
    }

    /// Store slots as files under this directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
