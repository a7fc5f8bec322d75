//! Error types for memvfs
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using VfsError
pub type Result<T> = std::result::Result<T, VfsError>;

/// Unified error type for memvfs operations
#[derive(Debug, Error)]
pub enum VfsError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Precondition Violations
    // -------------------------------------------------------------------------
    #[error("Invalid byte range: start {start} > end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("Unknown file slot index: {0}")]
    UnknownSlot(u32),

    #[error("Offset overflow: {offset} + {len} exceeds addressable range")]
    OffsetOverflow { offset: u64, len: u64 },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Allocation failed: could not grow buffer to {requested} bytes")]
    Allocation { requested: u64 },

    // -------------------------------------------------------------------------
    // Page Decode Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt page: {0}")]
    Corrupt(String),

    #[error("Invalid page size: {0} bytes")]
    InvalidPageSize(usize),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
