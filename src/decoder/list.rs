//! List parser (spec.md §4.5): walks a homogeneous run of `T`, either a
//! fixed count, a byte-bounded run (STR, TEXTITEM8/16 embed their own
//! padding), or (see `format::list_of_value`) a VALUE-bitmask-driven run.

use crate::decoder::align::pad;
use crate::decoder::byteorder::{Reader, Truncated};

/// Parse exactly `count` elements.
pub fn fixed_count<T>(
    reader: &mut Reader,
    count: usize,
    mut parse_one: impl FnMut(&mut Reader) -> Result<T, Truncated>,
) -> Result<Vec<T>, Truncated> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(parse_one(reader)?);
    }
    Ok(out)
}

/// Parse elements until the padded byte offset (relative to `start_offset`)
/// reaches `total_bytes`. Used for STR/TEXTITEM8/16 runs whose per-element
/// padding means the element count isn't known up front.
pub fn byte_bounded<T>(
    reader: &mut Reader,
    start_offset: usize,
    total_bytes: usize,
    mut parse_one: impl FnMut(&mut Reader) -> Result<T, Truncated>,
) -> Result<Vec<T>, Truncated> {
    let mut out = Vec::new();
    while pad(reader.offset() - start_offset) < total_bytes {
        out.push(parse_one(reader)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::byteorder::ByteOrder;

    #[test]
    fn fixed_count_reads_exactly_n() {
        let data = [1u8, 2, 3, 4];
        let mut r = Reader::new(&data, ByteOrder::Little);
        let v = fixed_count(&mut r, 4, |r| r.read_u8()).unwrap();
        assert_eq!(v, vec![1, 2, 3, 4]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn byte_bounded_stops_once_padded_offset_reaches_total() {
        // A single 1-byte element: pad(1) == 4 == total_bytes, so the loop
        // stops after one element, leaving the alignment padding unread.
        let data = [0xAAu8, 0, 0, 0];
        let mut r = Reader::new(&data, ByteOrder::Little);
        let start = r.offset();
        let v = byte_bounded(&mut r, start, 4, |r| r.read_u8()).unwrap();
        assert_eq!(v, vec![0xAA]);
        assert_eq!(r.remaining(), 3);
    }

    #[test]
    fn byte_bounded_reads_multiple_elements_before_padded_end() {
        // Four 1-byte elements exactly fill the 4-byte bound; no padding.
        let data = [1u8, 2, 3, 4];
        let mut r = Reader::new(&data, ByteOrder::Little);
        let start = r.offset();
        let v = byte_bounded(&mut r, start, 4, |r| r.read_u8()).unwrap();
        assert_eq!(v, vec![1, 2, 3, 4]);
        assert_eq!(r.remaining(), 0);
    }
}
