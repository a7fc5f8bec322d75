//! Varint Tests
//!
//! Tests verify:
//! - Width boundaries of every prefix class
//! - Exact byte layout at the class edges
//! - Non-canonical wide forms still decode
//! - Truncated input is reported, never read past

use memvfs::page::varint::{decode, encode, encoded_len, MAX_VARINT_LEN};
use memvfs::VfsError;
use proptest::prelude::*;

// =============================================================================
// Boundary Tests
// =============================================================================

#[test]
fn test_boundary_values_round_trip_with_expected_width() {
    let cases: [(u64, usize); 12] = [
        (0, 1),
        (240, 1),
        (241, 2),
        (2287, 2),
        (2288, 3),
        (2288 + 65535, 3),
        (2288 + 65536, 4),
        ((1 << 24) - 1, 4),
        (1 << 24, 5),
        ((1 << 32) - 1, 5),
        (1 << 56, 9),
        (u64::MAX, 9),
    ];

    for (value, width) in cases {
        let encoded = encode(value);
        assert_eq!(encoded.len(), width, "width of {}", value);
        assert_eq!(encoded_len(value), width, "encoded_len of {}", value);
        assert_eq!(decode(&encoded).unwrap(), (value, width), "decode of {}", value);
    }
}

#[test]
fn test_exact_layout_at_edges() {
    assert_eq!(encode(240), vec![240]);
    assert_eq!(encode(241), vec![241, 0]);
    assert_eq!(encode(2287), vec![248, 255]);
    assert_eq!(encode(2288), vec![249, 0, 0]);
    assert_eq!(encode(67823), vec![249, 255, 255]);
    assert_eq!(encode(67824), vec![250, 0x01, 0x08, 0xf0]);
    assert_eq!(encode(u64::MAX), vec![255; 9]);
}

#[test]
fn test_two_byte_class_formula() {
    // 240 + 256 * (b0 - 241) + b1
    assert_eq!(decode(&[242, 10]).unwrap(), (240 + 256 + 10, 2));
    assert_eq!(decode(&[248, 0]).unwrap(), (240 + 256 * 7, 2));
}

#[test]
fn test_three_byte_class_formula() {
    // 2288 + 256 * b1 + b2
    assert_eq!(decode(&[249, 1, 2]).unwrap(), (2288 + 256 + 2, 3));
}

#[test]
fn test_wide_forms_are_big_endian() {
    assert_eq!(decode(&[250, 0x12, 0x34, 0x56]).unwrap(), (0x123456, 4));
    assert_eq!(decode(&[251, 0x12, 0x34, 0x56, 0x78]).unwrap(), (0x12345678, 5));
    assert_eq!(
        decode(&[254, 1, 2, 3, 4, 5, 6, 7]).unwrap(),
        (0x01020304050607, 8)
    );
    assert_eq!(
        decode(&[255, 1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
        (0x0102030405060708, 9)
    );
}

#[test]
fn test_non_canonical_wide_form_decodes() {
    assert_eq!(decode(&[250, 0, 0, 5]).unwrap(), (5, 4));
}

#[test]
fn test_trailing_bytes_are_not_consumed() {
    let mut bytes = encode(3000);
    bytes.extend_from_slice(&[0xde, 0xad]);

    assert_eq!(decode(&bytes).unwrap(), (3000, 3));
}

#[test]
fn test_max_len_covers_widest_form() {
    assert_eq!(encoded_len(u64::MAX), MAX_VARINT_LEN);
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_empty_input_is_corrupt() {
    assert!(matches!(decode(&[]), Err(VfsError::Corrupt(_))));
}

#[test]
fn test_truncated_inputs_are_corrupt() {
    let truncated: [&[u8]; 5] = [
        &[241],
        &[249, 1],
        &[250, 1, 2],
        &[254, 1, 2, 3],
        &[255, 1, 2, 3, 4, 5, 6, 7],
    ];

    for bytes in truncated {
        assert!(
            matches!(decode(bytes), Err(VfsError::Corrupt(_))),
            "expected truncation error for {:?}",
            bytes
        );
    }
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #[test]
    fn prop_round_trip(value in any::<u64>()) {
        let encoded = encode(value);

        prop_assert_eq!(encoded.len(), encoded_len(value));
        prop_assert_eq!(decode(&encoded).unwrap(), (value, encoded.len()));
    }

    #[test]
    fn prop_encoding_is_shortest(value in any::<u64>()) {
        let width = encoded_len(value);
        let expected = if value <= 240 {
            1
        } else if value <= 2287 {
            2
        } else if value <= 67823 {
            3
        } else {
            let significant = 8 - (value.leading_zeros() as usize / 8);
            1 + significant.max(3)
        };

        prop_assert_eq!(width, expected);
    }
}
