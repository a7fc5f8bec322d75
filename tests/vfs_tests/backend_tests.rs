//! Backend Tests
//!
//! Tests verify:
//! - Slot lifecycle (access before/after touch and delete)
//! - Lazy, once-per-slot factory invocation
//! - Zero-padded reads and size reporting
//! - Byte-order marshaling of sizes
//! - Write observer callbacks

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memvfs::vfs::{memory_factory, Backend, ByteOrder, FileSlot, MemoryFile, OpenFn, StorageStrategy};
use memvfs::{Config, Result, VfsError};
use parking_lot::Mutex;

// =============================================================================
// Helper Functions
// =============================================================================

fn memory_backend() -> Backend {
    Backend::new("example.db", memory_factory())
}

/// Memory factory that counts how often each slot is opened
fn counting_factory(counts: Arc<[AtomicUsize; 4]>) -> OpenFn {
    Box::new(move |slot: FileSlot| {
        counts[slot.index()].fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryFile::new()) as Box<dyn StorageStrategy>)
    })
}

/// Strategy without an unlink of its own
struct FixedFile {
    bytes: Vec<u8>,
}

impl StorageStrategy for FixedFile {
    fn read(&mut self, start: u64, end: u64) -> Result<Vec<u8>> {
        let mut out = vec![0u8; (end - start) as usize];
        for (i, b) in out.iter_mut().enumerate() {
            *b = self.bytes.get(start as usize + i).copied().unwrap_or(0);
        }
        Ok(out)
    }

    fn write(&mut self, start: u64, bytes: &[u8]) -> Result<()> {
        let end = start as usize + bytes.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[start as usize..end].copy_from_slice(bytes);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// =============================================================================
// Slot Lifecycle Tests
// =============================================================================

#[test]
fn test_access_false_before_first_touch() {
    let backend = memory_backend();

    for slot in FileSlot::ALL {
        assert!(!backend.access(slot));
        assert_eq!(backend.size(slot), 0);
    }
}

#[test]
fn test_access_true_after_read() {
    let mut backend = memory_backend();

    backend.read(FileSlot::Main, 0, 100).unwrap();

    assert!(backend.access(FileSlot::Main));
    assert!(!backend.access(FileSlot::Wal));
}

#[test]
fn test_access_true_after_write() {
    let mut backend = memory_backend();

    backend.write(FileSlot::Wal, 0, b"frame").unwrap();

    assert!(backend.access(FileSlot::Wal));
    assert_eq!(backend.open_slots(), vec![FileSlot::Wal]);
}

#[test]
fn test_access_false_after_delete() {
    let mut backend = memory_backend();
    backend.write(FileSlot::Journal, 0, b"journal").unwrap();

    backend.delete(FileSlot::Journal).unwrap();

    assert!(!backend.access(FileSlot::Journal));
    assert_eq!(backend.size(FileSlot::Journal), 0);
}

#[test]
fn test_delete_unopened_slot_is_noop() {
    let mut backend = memory_backend();

    backend.delete(FileSlot::Shm).unwrap();

    assert!(!backend.access(FileSlot::Shm));
}

#[test]
fn test_access_does_not_open() {
    let counts = Arc::new([(); 4].map(|_| AtomicUsize::new(0)));
    let backend = Backend::new("example.db", counting_factory(Arc::clone(&counts)));

    backend.access(FileSlot::Main);
    backend.size(FileSlot::Main);

    assert_eq!(counts[0].load(Ordering::SeqCst), 0);
}

#[test]
fn test_factory_called_once_per_slot() {
    let counts = Arc::new([(); 4].map(|_| AtomicUsize::new(0)));
    let mut backend = Backend::new("example.db", counting_factory(Arc::clone(&counts)));

    backend.write(FileSlot::Main, 0, b"a").unwrap();
    backend.read(FileSlot::Main, 0, 1).unwrap();
    backend.write(FileSlot::Main, 100, b"b").unwrap();
    backend.read(FileSlot::Wal, 0, 1).unwrap();

    assert_eq!(counts[FileSlot::Main.index()].load(Ordering::SeqCst), 1);
    assert_eq!(counts[FileSlot::Wal.index()].load(Ordering::SeqCst), 1);
    assert_eq!(counts[FileSlot::Journal.index()].load(Ordering::SeqCst), 0);
}

#[test]
fn test_delete_then_touch_reopens_from_factory() {
    let counts = Arc::new([(); 4].map(|_| AtomicUsize::new(0)));
    let mut backend = Backend::new("example.db", counting_factory(Arc::clone(&counts)));

    backend.write(FileSlot::Main, 0, b"old").unwrap();
    backend.delete(FileSlot::Main).unwrap();
    let bytes = backend.read(FileSlot::Main, 0, 3).unwrap();

    assert_eq!(bytes, vec![0u8; 3]);
    assert_eq!(counts[FileSlot::Main.index()].load(Ordering::SeqCst), 2);
}

#[test]
fn test_factory_error_propagates_and_slot_stays_empty() {
    let open: OpenFn = Box::new(|_slot| Err(VfsError::Config("no storage".to_string())));
    let mut backend = Backend::new("example.db", open);

    let result = backend.write(FileSlot::Main, 0, b"x");

    assert!(matches!(result, Err(VfsError::Config(_))));
    assert!(!backend.access(FileSlot::Main));
}

#[test]
fn test_delete_without_unlink_still_clears_slot() {
    let open: OpenFn =
        Box::new(|_slot| Ok(Box::new(FixedFile { bytes: Vec::new() }) as Box<dyn StorageStrategy>));
    let mut backend = Backend::new("example.db", open);
    backend.write(FileSlot::Main, 0, b"kept").unwrap();

    backend.delete(FileSlot::Main).unwrap();

    assert!(!backend.access(FileSlot::Main));
    assert_eq!(backend.read(FileSlot::Main, 0, 4).unwrap(), vec![0u8; 4]);
}

// =============================================================================
// Read / Write / Size Tests
// =============================================================================

#[test]
fn test_read_returns_exact_length() {
    let mut backend = memory_backend();
    backend.write(FileSlot::Main, 0, b"short").unwrap();

    let bytes = backend.read(FileSlot::Main, 0, 4096).unwrap();

    assert_eq!(bytes.len(), 4096);
    assert_eq!(&bytes[..5], b"short");
    assert!(bytes[5..].iter().all(|&b| b == 0));
}

#[test]
fn test_read_into_fills_buffer() {
    let mut backend = memory_backend();
    backend.write(FileSlot::Main, 2, b"xy").unwrap();
    let mut buf = [0xffu8; 6];

    backend.read_into(FileSlot::Main, 0, &mut buf).unwrap();

    assert_eq!(buf, [0, 0, b'x', b'y', 0, 0]);
}

#[test]
fn test_end_to_end_size_and_tail_read() {
    let mut backend = memory_backend();
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 200) as u8 + 1).collect();

    backend.write(FileSlot::Main, 0, &data).unwrap();

    assert_eq!(backend.size(FileSlot::Main), 5000);
    let tail = backend.read(FileSlot::Main, 4990, 20).unwrap();
    assert_eq!(&tail[..10], &data[4990..]);
    assert_eq!(&tail[10..], &[0u8; 10]);
}

#[test]
fn test_slots_do_not_share_storage() {
    let mut backend = memory_backend();

    backend.write(FileSlot::Main, 0, b"main").unwrap();
    backend.write(FileSlot::Wal, 0, b"wal!").unwrap();

    assert_eq!(backend.read(FileSlot::Main, 0, 4).unwrap(), b"main");
    assert_eq!(backend.read(FileSlot::Wal, 0, 4).unwrap(), b"wal!");
}

#[test]
fn test_offset_overflow_rejected() {
    let mut backend = memory_backend();

    let result = backend.write(FileSlot::Main, u64::MAX, b"x");

    assert!(matches!(result, Err(VfsError::OffsetOverflow { .. })));
    assert!(!backend.access(FileSlot::Main));
}

// =============================================================================
// Byte Order Tests
// =============================================================================

#[test]
fn test_detect_matches_target_endianness() {
    let expected = if cfg!(target_endian = "little") {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    };

    assert_eq!(ByteOrder::detect(), expected);
    assert_eq!(ByteOrder::host(), expected);
}

#[test]
fn test_size_into_little_endian() {
    let mut backend = memory_backend().with_byte_order(ByteOrder::Little);
    backend.write(FileSlot::Main, 0, &[1u8; 0x0102]).unwrap();
    let mut out = [0u8; 8];

    backend.size_into(FileSlot::Main, &mut out);

    assert_eq!(out, [0x02, 0x01, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_size_into_big_endian() {
    let mut backend = memory_backend().with_byte_order(ByteOrder::Big);
    backend.write(FileSlot::Main, 0, &[1u8; 0x0102]).unwrap();
    let mut out = [0u8; 8];

    backend.size_into(FileSlot::Main, &mut out);

    assert_eq!(out, [0, 0, 0, 0, 0, 0, 0x01, 0x02]);
    assert_eq!(ByteOrder::Big.decode_u64(out), 0x0102);
}

#[test]
fn test_size_into_unopened_slot_is_zero() {
    let backend = memory_backend();
    let mut out = [0xffu8; 8];

    backend.size_into(FileSlot::Shm, &mut out);

    assert_eq!(out, [0u8; 8]);
}

#[test]
fn test_from_config_uses_configured_byte_order() {
    let config = Config::builder()
        .db_name("cfg.db")
        .byte_order(ByteOrder::Big)
        .build();

    let backend = Backend::from_config(&config, memory_factory()).unwrap();

    assert_eq!(backend.byte_order(), ByteOrder::Big);
    assert_eq!(backend.file_name(FileSlot::Wal), "cfg.db-wal");
}

#[test]
fn test_from_config_rejects_bad_page_size() {
    let config = Config::builder().page_size(1000).build();

    let result = Backend::from_config(&config, memory_factory());

    assert!(matches!(result, Err(VfsError::Config(_))));
}

// =============================================================================
// Observer Tests
// =============================================================================

#[test]
fn test_observer_sees_every_write() {
    let seen: Arc<Mutex<Vec<(String, usize, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut backend = memory_backend();
    backend.set_observer(Box::new(move |name: &str, bytes: &[u8], offset: u64| {
        sink.lock().push((name.to_string(), bytes.len(), offset));
    }));

    backend.write(FileSlot::Main, 4096, &[0u8; 4096]).unwrap();
    backend.write(FileSlot::Journal, 0, b"hdr").unwrap();
    backend.read(FileSlot::Main, 0, 10).unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            ("example.db".to_string(), 4096, 4096),
            ("example.db-journal".to_string(), 3, 0),
        ]
    );
}

#[test]
fn test_cleared_observer_is_not_called() {
    let calls = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&calls);
    let mut backend = memory_backend();
    backend.set_observer(Box::new(move |_: &str, _: &[u8], _: u64| {
        sink.fetch_add(1, Ordering::SeqCst);
    }));

    backend.write(FileSlot::Main, 0, b"a").unwrap();
    backend.clear_observer();
    backend.write(FileSlot::Main, 0, b"b").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
