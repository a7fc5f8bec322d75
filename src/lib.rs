//! # memvfs
//!
//! Storage backend for an embedded SQL engine, with:
//! - A fixed set of logical file slots (main, journal, WAL, shared memory)
//! - Pluggable per-slot storage, opened lazily (in-memory buffer by default)
//! - Zero-padded reads and geometrically growing writes
//! - A B-tree page decoder and a page diff engine for write tracing
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SQL Engine                              │
//! │              (access / size / read / write / delete)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Backend (slot router)                      │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │ write observer
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │ StorageStrategy │                │   PageTracer    │
//!   │ (MemoryFile /   │                │ codec → diff    │
//!   │  DiskFile)      │                └─────────────────┘
//!   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod page;
pub mod trace;
pub mod vfs;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use error::{Result, VfsError};
pub use trace::{PageEvent, PageTracer, TraceSession};
pub use vfs::{Backend, FileSlot, MemoryFile, StorageStrategy};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of memvfs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
