//! Page Module
//!
//! Decoding and diffing of B-tree page images.
//!
//! ## Responsibilities
//! - Decode the variable-length integers used inside cells
//! - Decode a page's header, cell pointer array and cells
//! - Split table-leaf cells into row key, inline payload and overflow
//! - Compute an edit script between two decodes of the same page

pub mod codec;
pub mod diff;
pub mod varint;

pub use codec::{
    decode_page, decode_page_at, Cell, DecodedPage, PageBuilder, PageCodec, PageHeader, PageType,
    TableLeafPayload,
};
pub use diff::{apply, diff_cells, diff_pages, Change};
