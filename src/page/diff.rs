//! Page diff engine
//!
//! Explains how a page's cell sequence changed between two decodes as an
//! ordered edit script. Applying the script to the old cells, change by
//! change, yields the new cells.
//!
//! ## Algorithm
//! 1. Delete every old cell whose bytes no longer appear in the new page.
//! 2. Walk the new cells by position against the working copy:
//!    in place → nothing, found later → move, missing → insert.
//! 3. Drop surplus trailing cells (duplicate payloads).
//! 4. Collapse `delete(i)` directly followed by `insert(i, _)` into an
//!    overwrite.
//!
//! Matching is a linear scan over raw cell bytes.
// TODO: binary-search table-leaf cells by rowid instead of scanning.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use tracing::trace;

use super::DecodedPage;

/// One step of an edit script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    /// Insert `payload` so it ends up at `position`
    Insert { position: usize, payload: Bytes },

    /// Remove the cell at `position`
    Delete { position: usize },

    /// Relocate the cell at `from` to `to`
    Move { from: usize, to: usize },

    /// Replace the cell at `position` with `payload`
    Overwrite { position: usize, payload: Bytes },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Insert { position, payload } => {
                write!(f, "insert  @{} ({} bytes)", position, payload.len())
            }
            Change::Delete { position } => write!(f, "delete  @{}", position),
            Change::Move { from, to } => write!(f, "move    @{} -> @{}", from, to),
            Change::Overwrite { position, payload } => {
                write!(f, "overwrite @{} ({} bytes)", position, payload.len())
            }
        }
    }
}

/// Diff two decodes of the same page; `old` is `None` on first sight
pub fn diff_pages(old: Option<&DecodedPage>, new: &DecodedPage) -> Vec<Change> {
    let old_cells = old.map(DecodedPage::payloads);
    diff_cells(old_cells.as_deref(), &new.payloads())
}

/// Diff two ordered cell sequences
pub fn diff_cells(old: Option<&[Bytes]>, new: &[Bytes]) -> Vec<Change> {
    let old = match old {
        Some(old) => old,
        None => {
            return new
                .iter()
                .enumerate()
                .map(|(position, payload)| Change::Insert {
                    position,
                    payload: payload.clone(),
                })
                .collect()
        }
    };

    let mut changes = Vec::new();

    // Pass 1: deletions. A dropped cell sits right after the kept prefix.
    let mut working: Vec<Bytes> = Vec::with_capacity(old.len().max(new.len()));
    for cell in old {
        if new.contains(cell) {
            working.push(cell.clone());
        } else {
            changes.push(Change::Delete {
                position: working.len(),
            });
        }
    }

    // Pass 2: working[..pos] already equals new[..pos]
    for (pos, cell) in new.iter().enumerate() {
        match working[pos..].iter().position(|c| c == cell) {
            Some(0) => {}
            Some(offset) => {
                let from = pos + offset;
                let moved = working.remove(from);
                working.insert(pos, moved);
                changes.push(Change::Move { from, to: pos });
            }
            None => {
                working.insert(pos, cell.clone());
                changes.push(Change::Insert {
                    position: pos,
                    payload: cell.clone(),
                });
            }
        }
    }

    // Pass 3: surplus duplicates left at the tail
    while working.len() > new.len() {
        working.pop();
        changes.push(Change::Delete {
            position: new.len(),
        });
    }

    let changes = collapse_overwrites(changes);
    trace!(old = old.len(), new = new.len(), changes = changes.len(), "diffed page");
    changes
}

/// Replay an edit script. Returns `None` if a change is out of range.
pub fn apply(old: &[Bytes], changes: &[Change]) -> Option<Vec<Bytes>> {
    let mut cells = old.to_vec();

    for change in changes {
        match change {
            Change::Insert { position, payload } => {
                if *position > cells.len() {
                    return None;
                }
                cells.insert(*position, payload.clone());
            }
            Change::Delete { position } => {
                if *position >= cells.len() {
                    return None;
                }
                cells.remove(*position);
            }
            Change::Move { from, to } => {
                if *from >= cells.len() || *to >= cells.len() {
                    return None;
                }
                let moved = cells.remove(*from);
                cells.insert(*to, moved);
            }
            Change::Overwrite { position, payload } => {
                *cells.get_mut(*position)? = payload.clone();
            }
        }
    }

    Some(cells)
}

/// Fold every adjacent delete(i) + insert(i) pair into overwrite(i), wherever
/// it occurs in the script
fn collapse_overwrites(changes: Vec<Change>) -> Vec<Change> {
    let mut out = Vec::with_capacity(changes.len());
    let mut iter = changes.into_iter().peekable();

    while let Some(change) = iter.next() {
        let pairs = matches!(
            (&change, iter.peek()),
            (Change::Delete { position }, Some(Change::Insert { position: at, .. })) if at == position
        );

        match (change, pairs) {
            (Change::Delete { position }, true) => {
                if let Some(Change::Insert { payload, .. }) = iter.next() {
                    out.push(Change::Overwrite { position, payload });
                }
            }
            (change, _) => out.push(change),
        }
    }

    out
}
