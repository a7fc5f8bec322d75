//! B-tree page codec
//!
//! Decodes one raw page image into its header and cells.
//!
//! ## Page Layout
//! ```text
//! ┌──────────────────────────────┐ 0 (or 100 on page 1)
//! │ Header (8 B leaf, 12 B int.) │
//! ├──────────────────────────────┤
//! │ Cell pointer array (2 B each)│
//! ├──────────────────────────────┤
//! │ Unallocated                  │
//! ├──────────────────────────────┤ cell_content_start
//! │ Cell N-1 ... Cell 1, Cell 0  │ packed back-to-front
//! └──────────────────────────────┘ page_size
//! ```
//!
//! The pointer array is in key order, which need not match content order
//! once rows are inserted out of sequence. A cell runs from its pointer to
//! the next higher cell start on the page, or to the page end.

use bytes::Bytes;
use serde::Serialize;
use tracing::trace;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{Result, VfsError};

use super::varint;

/// Size of the database file header on page 1
pub const DB_HEADER_SIZE: usize = 100;

/// Magic string opening the database file header
pub const DB_HEADER_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Header size of leaf pages
pub const LEAF_HEADER_SIZE: usize = 8;

/// Header size of interior pages (adds the right-most pointer)
pub const INTERIOR_HEADER_SIZE: usize = 12;

/// Size of one cell pointer
pub const CELL_POINTER_SIZE: usize = 2;

/// Size of an overflow page number at the end of a spilled cell
pub const OVERFLOW_POINTER_SIZE: usize = 4;

// =============================================================================
// Page Type
// =============================================================================

/// Page type from the first header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageType {
    /// 0x02
    InteriorIndex,
    /// 0x05
    InteriorTable,
    /// 0x0A
    LeafIndex,
    /// 0x0D
    LeafTable,
    /// Anything else (free pages, never-written zero pages, ...)
    Unknown(u8),
}

impl PageType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            2 => PageType::InteriorIndex,
            5 => PageType::InteriorTable,
            10 => PageType::LeafIndex,
            13 => PageType::LeafTable,
            other => PageType::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            PageType::InteriorIndex => 2,
            PageType::InteriorTable => 5,
            PageType::LeafIndex => 10,
            PageType::LeafTable => 13,
            PageType::Unknown(byte) => byte,
        }
    }

    /// Interior pages carry a right-most child pointer
    pub fn is_interior(self) -> bool {
        matches!(self, PageType::InteriorIndex | PageType::InteriorTable)
    }

    pub fn header_size(self) -> usize {
        if self.is_interior() {
            INTERIOR_HEADER_SIZE
        } else {
            LEAF_HEADER_SIZE
        }
    }
}

// =============================================================================
// Decoded Structures
// =============================================================================

/// Fixed page header fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageHeader {
    pub page_type: PageType,
    pub first_freeblock: u16,
    pub cell_count: u16,
    pub cell_content_start: u16,
    pub fragmented_free_bytes: u8,
    /// Only meaningful for interior pages; 0 otherwise
    pub right_most_pointer: u32,
}

/// Structured payload of a table-leaf cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLeafPayload {
    /// Declared total payload length
    pub length: u64,
    /// Integer row key
    pub rowid: u64,
    /// Bytes of payload that live on overflow pages
    pub overflow_bytes: u64,
    /// First overflow page (0 when nothing spilled)
    pub overflow_page: u32,
    /// Payload bytes stored on this page
    pub initial: Bytes,
}

impl TableLeafPayload {
    pub fn has_overflow(&self) -> bool {
        self.overflow_bytes > 0
    }
}

/// One cell on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    /// Byte offset of the cell within the page
    pub offset: usize,
    /// Byte length of the cell's content region
    pub length: usize,
    /// Raw cell bytes
    pub raw: Bytes,
    /// Decoded payload, table-leaf pages only
    pub payload: Option<TableLeafPayload>,
}

/// A page decoded into header and cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedPage {
    pub header: PageHeader,
    pub cells: Vec<Cell>,
}

impl DecodedPage {
    pub fn page_type(&self) -> PageType {
        self.header.page_type
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Raw bytes of every cell, in pointer-array order
    pub fn payloads(&self) -> Vec<Bytes> {
        self.cells.iter().map(|cell| cell.raw.clone()).collect()
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Page decoder bound to a fixed page size
#[derive(Debug, Clone, Copy)]
pub struct PageCodec {
    page_size: usize,
}

impl PageCodec {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Decode one page image of exactly `page_size` bytes.
    ///
    /// Page 1 (`page_index == 0`) starting with the database file header has
    /// its B-tree header after those 100 bytes.
    pub fn decode(&self, page_index: u64, page: &[u8]) -> Result<DecodedPage> {
        if page.len() != self.page_size {
            return Err(VfsError::InvalidPageSize(page.len()));
        }

        let header_offset = if page_index == 0 && page.starts_with(DB_HEADER_MAGIC) {
            DB_HEADER_SIZE
        } else {
            0
        };

        decode_page_at(page, header_offset)
    }
}

impl Default for PageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Decode a page whose B-tree header starts at offset 0
pub fn decode_page(page: &[u8]) -> Result<DecodedPage> {
    decode_page_at(page, 0)
}

/// Decode a page whose B-tree header starts at `header_offset`.
///
/// Cell pointers stay relative to the start of `page`.
pub fn decode_page_at(page: &[u8], header_offset: usize) -> Result<DecodedPage> {
    let header = decode_header(page, header_offset)?;

    let array_start = header_offset + header.page_type.header_size();
    let array_len = usize::from(header.cell_count) * CELL_POINTER_SIZE;
    let array_end = array_start + array_len;
    if array_end > page.len() {
        return Err(VfsError::Corrupt(format!(
            "cell pointer array of {} cells ends at {}, past page end {}",
            header.cell_count,
            array_end,
            page.len()
        )));
    }

    let mut starts = Vec::with_capacity(usize::from(header.cell_count));
    for (i, pointer) in page[array_start..array_end]
        .chunks_exact(CELL_POINTER_SIZE)
        .enumerate()
    {
        let start = usize::from(u16::from_be_bytes([pointer[0], pointer[1]]));

        if start >= page.len() {
            return Err(VfsError::Corrupt(format!(
                "cell {} pointer {} outside page of {} bytes",
                i,
                start,
                page.len()
            )));
        }
        if start < array_end {
            return Err(VfsError::Corrupt(format!(
                "cell {} pointer {} overlaps header or pointer array (ends at {})",
                i, start, array_end
            )));
        }

        starts.push(start);
    }

    // Pointers follow key order, not content order
    let mut by_address = starts.clone();
    by_address.sort_unstable();

    let is_table_leaf = header.page_type == PageType::LeafTable;
    let mut cells = Vec::with_capacity(starts.len());

    for (i, &start) in starts.iter().enumerate() {
        let next = by_address.partition_point(|&other| other <= start);
        let end = by_address.get(next).copied().unwrap_or(page.len());

        let raw = &page[start..end];
        let payload = if is_table_leaf {
            Some(decode_table_leaf(raw).map_err(|e| match e {
                VfsError::Corrupt(detail) => VfsError::Corrupt(format!("cell {}: {}", i, detail)),
                other => other,
            })?)
        } else {
            None
        };

        cells.push(Cell {
            offset: start,
            length: raw.len(),
            raw: Bytes::copy_from_slice(raw),
            payload,
        });
    }

    trace!(
        page_type = ?header.page_type,
        cells = cells.len(),
        "decoded page"
    );

    Ok(DecodedPage { header, cells })
}

fn decode_header(page: &[u8], offset: usize) -> Result<PageHeader> {
    let h = page.get(offset..).unwrap_or(&[]);
    if h.len() < LEAF_HEADER_SIZE {
        return Err(VfsError::Corrupt(format!(
            "page too small for header: {} bytes at offset {}",
            h.len(),
            offset
        )));
    }

    let page_type = PageType::from_byte(h[0]);

    let right_most_pointer = if page_type.is_interior() {
        if h.len() < INTERIOR_HEADER_SIZE {
            return Err(VfsError::Corrupt(
                "page too small for interior header".to_string(),
            ));
        }
        u32::from_be_bytes([h[8], h[9], h[10], h[11]])
    } else {
        0
    };

    Ok(PageHeader {
        page_type,
        first_freeblock: u16::from_be_bytes([h[1], h[2]]),
        cell_count: u16::from_be_bytes([h[3], h[4]]),
        cell_content_start: u16::from_be_bytes([h[5], h[6]]),
        fragmented_free_bytes: h[7],
        right_most_pointer,
    })
}

/// Decode `[length varint][rowid varint][payload...][overflow page?]`
///
/// The payload is inline when its declared length fits in the bytes after
/// the two varints; otherwise the last 4 bytes are the overflow page number.
fn decode_table_leaf(raw: &[u8]) -> Result<TableLeafPayload> {
    let (length, len_size) = varint::decode(raw)?;
    let (rowid, rowid_size) = varint::decode(&raw[len_size..])?;

    let body = &raw[len_size + rowid_size..];
    let available = body.len() as u64;

    if length <= available {
        return Ok(TableLeafPayload {
            length,
            rowid,
            overflow_bytes: 0,
            overflow_page: 0,
            initial: Bytes::copy_from_slice(&body[..length as usize]),
        });
    }

    if body.len() < OVERFLOW_POINTER_SIZE {
        return Err(VfsError::Corrupt(format!(
            "payload of {} bytes spills but cell has only {} bytes for the overflow pointer",
            length,
            body.len()
        )));
    }

    let local = body.len() - OVERFLOW_POINTER_SIZE;
    let tail = &body[local..];

    Ok(TableLeafPayload {
        length,
        rowid,
        overflow_bytes: length - local as u64,
        overflow_page: u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]),
        initial: Bytes::copy_from_slice(&body[..local]),
    })
}

// =============================================================================
// Encoding (fixtures, benchmarks)
// =============================================================================

/// Encode a table-leaf cell whose payload fits on the page
pub fn table_leaf_cell(rowid: u64, payload: &[u8]) -> Vec<u8> {
    let mut cell = varint::encode(payload.len() as u64);
    cell.extend_from_slice(&varint::encode(rowid));
    cell.extend_from_slice(payload);
    cell
}

/// Encode a table-leaf cell that keeps `local` on the page and spills the
/// remaining `total_len - local.len()` bytes to `overflow_page`
pub fn table_leaf_overflow_cell(
    rowid: u64,
    total_len: u64,
    local: &[u8],
    overflow_page: u32,
) -> Vec<u8> {
    let mut cell = varint::encode(total_len);
    cell.extend_from_slice(&varint::encode(rowid));
    cell.extend_from_slice(local);
    cell.extend_from_slice(&overflow_page.to_be_bytes());
    cell
}

/// Builds a page image, packing content back-to-front in the order cells
/// were added
#[derive(Debug, Clone)]
pub struct PageBuilder {
    page_type: PageType,
    page_size: usize,
    right_most_pointer: u32,

    /// Cell bytes in content (append) order
    cells: Vec<Vec<u8>>,

    /// Pointer-array order as indices into `cells`
    order: Vec<usize>,
}

impl PageBuilder {
    pub fn new(page_type: PageType, page_size: usize) -> Self {
        Self {
            page_type,
            page_size,
            right_most_pointer: 0,
            cells: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Set the right-most child pointer (interior pages)
    pub fn right_most_pointer(mut self, page: u32) -> Self {
        self.right_most_pointer = page;
        self
    }

    /// Append a cell at the end of the pointer array
    pub fn cell(self, bytes: impl Into<Vec<u8>>) -> Self {
        let position = self.order.len();
        self.insert_cell(position, bytes)
    }

    /// Add a cell below all existing content but at `position` in the
    /// pointer array, the way an out-of-sequence row insert lands.
    ///
    /// Positions past the end append.
    pub fn insert_cell(mut self, position: usize, bytes: impl Into<Vec<u8>>) -> Self {
        let position = position.min(self.order.len());
        self.order.insert(position, self.cells.len());
        self.cells.push(bytes.into());
        self
    }

    pub fn build(self) -> Result<Vec<u8>> {
        let mut page = vec![0u8; self.page_size];
        let header_size = self.page_type.header_size();
        let array_end = header_size + self.cells.len() * CELL_POINTER_SIZE;
        let content: usize = self.cells.iter().map(Vec::len).sum();

        if self.cells.len() > usize::from(u16::MAX)
            || self.page_size > usize::from(u16::MAX) + 1
            || array_end + content > self.page_size
        {
            return Err(VfsError::Corrupt(format!(
                "{} cells ({} content bytes) do not fit a {}-byte page",
                self.cells.len(),
                content,
                self.page_size
            )));
        }

        if let Some(i) = self.cells.iter().position(Vec::is_empty) {
            return Err(VfsError::Corrupt(format!("cell {} is empty", i)));
        }

        let mut starts = Vec::with_capacity(self.cells.len());
        let mut end = self.page_size;
        for cell in &self.cells {
            let start = end - cell.len();
            page[start..end].copy_from_slice(cell);
            starts.push(start);
            end = start;
        }

        for (i, &cell) in self.order.iter().enumerate() {
            let pointer = header_size + i * CELL_POINTER_SIZE;
            page[pointer..pointer + CELL_POINTER_SIZE]
                .copy_from_slice(&(starts[cell] as u16).to_be_bytes());
        }

        page[0] = self.page_type.as_byte();
        page[3..5].copy_from_slice(&(self.cells.len() as u16).to_be_bytes());
        // 65536 is stored as 0
        page[5..7].copy_from_slice(&(end as u16).to_be_bytes());
        if self.page_type.is_interior() {
            page[8..12].copy_from_slice(&self.right_most_pointer.to_be_bytes());
        }

        Ok(page)
    }
}
