//! Shared helpers for building binary format 4 subtables in tests.

#![allow(dead_code)]

use vero_cmap::Segment;

/// Encodes segments and a glyph index array as a format 4 subtable.
///
/// `id_range_offset` is given in words, as `Segment` stores it, and written
/// out as the byte distance the binary format uses.
pub fn encode_subtable(segments: &[Segment], glyph_index_array: &[u16]) -> Vec<u8> {
    let seg_count = segments.len() as u16;
    let entry_selector = if seg_count == 0 { 0 } else { seg_count.ilog2() as u16 };
    let search_range = if seg_count == 0 { 0 } else { 2 << entry_selector };
    let range_shift = seg_count * 2 - search_range;
    let length = 16 + segments.len() * 8 + glyph_index_array.len() * 2;

    let mut data = Vec::with_capacity(length);
    for field in [
        4,
        length as u16,
        0,
        seg_count * 2,
        search_range,
        entry_selector,
        range_shift,
    ] {
        data.extend_from_slice(&field.to_be_bytes());
    }

    for segment in segments {
        data.extend_from_slice(&segment.end_code.to_be_bytes());
    }
    data.extend_from_slice(&[0, 0]);
    for segment in segments {
        data.extend_from_slice(&segment.start_code.to_be_bytes());
    }
    for segment in segments {
        data.extend_from_slice(&segment.id_delta.to_be_bytes());
    }
    for segment in segments {
        data.extend_from_slice(&(segment.id_range_offset * 2).to_be_bytes());
    }
    for glyph in glyph_index_array {
        data.extend_from_slice(&glyph.to_be_bytes());
    }

    data
}

pub fn delta_segment(start_code: u16, end_code: u16, id_delta: i16) -> Segment {
    Segment {
        start_code,
        end_code,
        id_delta,
        id_range_offset: 0,
    }
}

/// A segment whose first code point reads glyph index array entry `slot`
pub fn array_segment(
    start_code: u16,
    end_code: u16,
    slot: usize,
    ordinal: usize,
    segment_count: usize,
) -> Segment {
    Segment {
        start_code,
        end_code,
        id_delta: 0,
        id_range_offset: (slot + segment_count + 1 - ordinal) as u16,
    }
}
