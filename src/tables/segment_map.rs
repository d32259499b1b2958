//! The [format 4](https://learn.microsoft.com/en-us/typography/opentype/spec/cmap#format-4-segment-mapping-to-delta-values)
//! "segment mapping to delta values" character map.
//!
//! Covers the Basic Multilingual Plane with a sorted list of contiguous
//! segments. Each segment either adds a fixed delta to the code point or
//! looks the glyph up in a shared glyph index array.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    io::{Cursor, Read, Seek},
};

use thiserror::Error;

use crate::{MISSING_GLYPH, VeroCmapError, buffer::FontReader, config::ParseOptions};

use super::TableEncodingError;

/// format, length, language, segCountX2, searchRange, entrySelector, rangeShift
const HEADER_LENGTH: usize = 14;

const FORMAT: u16 = 4;

/// Raised when a segment table cannot be used for lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedTable {
    #[error(
        "Segment arrays disagree in length: {end_codes} end codes, {start_codes} start codes, \
         {id_deltas} deltas, {id_range_offsets} range offsets"
    )]
    InconsistentArrays {
        end_codes: usize,
        start_codes: usize,
        id_deltas: usize,
        id_range_offsets: usize,
    },

    #[error("Search range {search_range} is not a power of two within {segment_count} segments")]
    InvalidSearchRange {
        search_range: u32,
        segment_count: usize,
    },

    #[error(
        "Glyph index {index} for U+{code_point:04X} in segment {segment} is outside \
         the {len} entry glyph index array"
    )]
    GlyphIndexOutOfBounds {
        code_point: u32,
        /// 1-based segment ordinal
        segment: usize,
        index: i64,
        len: usize,
    },
}

/// A single `[start_code, end_code]` range and its resolution rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start_code: u16,
    pub end_code: u16,
    pub id_delta: i16,
    /// Distance in 16-bit words from this segment's range offset slot
    /// to its first glyph index array entry, 0 for simple delta mapping
    pub id_range_offset: u16,
}

/// The decoded parallel arrays of a format 4 subtable, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTable {
    /// Largest power of two not above the segment count, in segments
    pub search_range: u32,
    /// Binary search steps, `entrySelector + 1`
    pub search_iterations: u32,
    pub end_codes: Vec<u16>,
    pub start_codes: Vec<u16>,
    pub id_deltas: Vec<i16>,
    /// Word distances, see [`Segment::id_range_offset`]
    pub id_range_offsets: Vec<u16>,
    pub glyph_index_array: Vec<u16>,
}

impl SegmentTable {
    /// Builds the arrays from a list of segments and derives the search
    /// parameters from their count.
    pub fn from_segments(segments: &[Segment], glyph_index_array: Vec<u16>) -> Self {
        let (search_range, search_iterations) = search_parameters(segments.len());

        Self {
            search_range,
            search_iterations,
            end_codes: segments.iter().map(|s| s.end_code).collect(),
            start_codes: segments.iter().map(|s| s.start_code).collect(),
            id_deltas: segments.iter().map(|s| s.id_delta).collect(),
            id_range_offsets: segments.iter().map(|s| s.id_range_offset).collect(),
            glyph_index_array,
        }
    }
}

/// Returns the search range and iteration count for `segment_count` segments.
///
/// The search range is the largest power of two not above the count, the
/// iteration count is one more than its exponent. Both are 0 for an empty table.
pub fn search_parameters(segment_count: usize) -> (u32, u32) {
    if segment_count == 0 {
        return (0, 0);
    }

    let entry_selector = segment_count.ilog2();
    (1 << entry_selector, entry_selector + 1)
}

/// A representation of the format 4 cmap subtable,
/// resolving code points to glyph indices.
///
/// Immutable once built, lookups only borrow it and can run from
/// any number of threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCharacterMap {
    /// Language code, only meaningful for Macintosh platform subtables
    language: u16,

    search_range: u32,

    search_iterations: u32,

    /// End code of the segment at ordinal `search_range`, decides which half
    /// of the segment list the search starts from
    search_range_end_code: u16,

    end_codes: Vec<u16>,

    start_codes: Vec<u16>,

    id_deltas: Vec<i16>,

    id_range_offsets: Vec<u16>,

    glyph_index_array: Vec<u16>,
}

impl SegmentCharacterMap {
    /// Validates the decoded arrays and precomputes the search seed.
    ///
    /// Segment ordering is not checked. An unordered table produces
    /// meaningless glyphs but lookups stay in bounds.
    ///
    /// # Errors
    ///
    /// * `MalformedTable::InconsistentArrays` if the four segment arrays differ in length.
    /// * `MalformedTable::InvalidSearchRange` if the search range is not a power of two
    ///   no larger than the segment count (or 0 for an empty table).
    pub fn new(table: SegmentTable) -> Result<Self, MalformedTable> {
        let segment_count = table.end_codes.len();

        if table.start_codes.len() != segment_count
            || table.id_deltas.len() != segment_count
            || table.id_range_offsets.len() != segment_count
        {
            return Err(MalformedTable::InconsistentArrays {
                end_codes: segment_count,
                start_codes: table.start_codes.len(),
                id_deltas: table.id_deltas.len(),
                id_range_offsets: table.id_range_offsets.len(),
            });
        }

        let search_range_end_code = match table.search_range {
            0 if segment_count == 0 => 0,
            range if range.is_power_of_two() && range as usize <= segment_count => {
                table.end_codes[range as usize - 1]
            }
            range => {
                return Err(MalformedTable::InvalidSearchRange {
                    search_range: range,
                    segment_count,
                });
            }
        };

        Ok(Self {
            language: 0,
            search_range: table.search_range,
            search_iterations: table.search_iterations,
            search_range_end_code,
            end_codes: table.end_codes,
            start_codes: table.start_codes,
            id_deltas: table.id_deltas,
            id_range_offsets: table.id_range_offsets,
            glyph_index_array: table.glyph_index_array,
        })
    }

    /// Parses a complete format 4 subtable, starting at its format field.
    ///
    /// Range offsets are converted from byte distances to word distances
    /// and the header's search fields from bytes to segments.
    ///
    /// # Errors
    ///
    /// * `TableEncodingError::UnsupportedFormat` if the format field is not 4.
    /// * `TableEncodingError::InvalidBufferLength` if the data cannot hold the header
    ///   or the segment arrays.
    /// * `TableEncodingError::InvalidSegmentCount` if `segCountX2` is odd.
    /// * `TableEncodingError::LengthMismatch` and `TableEncodingError::InvalidSearchParameters`
    ///   in strict mode only, lenient mode repairs both.
    /// * `MalformedTable` if trusted search parameters break the lookup invariants.
    pub fn from_buffer(data: &[u8], options: &ParseOptions) -> Result<Self, VeroCmapError> {
        if data.len() < HEADER_LENGTH {
            return Err(TableEncodingError::InvalidBufferLength(HEADER_LENGTH, data.len()).into());
        }

        let format = u16::from_be_bytes([data[0], data[1]]);
        if format != FORMAT {
            return Err(TableEncodingError::UnsupportedFormat(format).into());
        }

        let declared_length = usize::from(u16::from_be_bytes([data[2], data[3]]));
        let language = u16::from_be_bytes([data[4], data[5]]);
        let seg_count_x2 = u16::from_be_bytes([data[6], data[7]]);
        let header_search_range = u16::from_be_bytes([data[8], data[9]]);
        let entry_selector = u16::from_be_bytes([data[10], data[11]]);
        let range_shift = u16::from_be_bytes([data[12], data[13]]);

        if seg_count_x2 % 2 != 0 {
            return Err(TableEncodingError::InvalidSegmentCount(seg_count_x2).into());
        }
        let segment_count = usize::from(seg_count_x2 / 2);

        // four u16 arrays plus the reserved pad after the end codes
        let arrays_end = HEADER_LENGTH + segment_count * 8 + 2;

        let table_length = if declared_length == data.len() {
            declared_length
        } else if options.strict {
            return Err(TableEncodingError::LengthMismatch {
                declared: declared_length,
                actual: data.len(),
            }
            .into());
        } else {
            log::warn!(
                "Format 4 subtable declares {} bytes but {} are available, clamping",
                declared_length,
                data.len()
            );
            declared_length.max(arrays_end).min(data.len())
        };

        if table_length < arrays_end {
            return Err(TableEncodingError::InvalidBufferLength(arrays_end, table_length).into());
        }

        let (search_range, search_iterations) = Self::select_search_parameters(
            segment_count,
            header_search_range,
            entry_selector,
            range_shift,
            options,
        )?;

        let mut reader = FontReader::from_buffer(Cursor::new(&data[..table_length]));
        reader.seek_to(HEADER_LENGTH as u64)?;

        let end_codes = reader.read_u16_array(segment_count)?;
        reader.skip(2)?; // reservedPad
        let start_codes = reader.read_u16_array(segment_count)?;
        let id_deltas = reader.read_i16_array(segment_count)?;
        let id_range_offsets = reader
            .read_u16_array(segment_count)?
            .into_iter()
            .map(|offset| offset >> 1)
            .collect();
        let glyph_index_array = reader.read_u16_array((table_length - arrays_end) / 2)?;

        log::debug!(
            "Parsed format 4 subtable: {} segments, {} glyph index array entries",
            segment_count,
            glyph_index_array.len()
        );

        let mut map = Self::new(SegmentTable {
            search_range,
            search_iterations,
            end_codes,
            start_codes,
            id_deltas,
            id_range_offsets,
            glyph_index_array,
        })?;
        map.language = language;

        Ok(map)
    }

    /// Parses a format 4 subtable starting at the reader's current position.
    ///
    /// Reads the `format` and `length` fields first, then the rest of the
    /// declared length (or whatever remains of the source, if less).
    pub fn from_reader<B: Read + Seek>(
        reader: &mut FontReader<B>,
        options: &ParseOptions,
    ) -> Result<Self, VeroCmapError> {
        let start = reader.position()?;

        let format = reader.read_u16()?;
        if format != FORMAT {
            return Err(TableEncodingError::UnsupportedFormat(format).into());
        }
        let length = reader.read_u16()?;

        reader.seek_to(start)?;
        let data = reader.read_up_to(usize::from(length))?;

        Self::from_buffer(&data, options)
    }

    /// Converts the header's byte based search fields to segment units,
    /// falling back to the values derived from the segment count.
    fn select_search_parameters(
        segment_count: usize,
        search_range: u16,
        entry_selector: u16,
        range_shift: u16,
        options: &ParseOptions,
    ) -> Result<(u32, u32), TableEncodingError> {
        let (derived_range, derived_iterations) = search_parameters(segment_count);
        let stored_range = u32::from(search_range / 2);
        let stored_iterations = u32::from(entry_selector) + 1;
        let expected_shift = (segment_count * 2).wrapping_sub(usize::from(search_range));

        let consistent = stored_range == derived_range
            && (segment_count == 0 || stored_iterations == derived_iterations)
            && usize::from(range_shift) == expected_shift;

        if consistent {
            return Ok((derived_range, derived_iterations));
        }

        if options.strict {
            return Err(TableEncodingError::InvalidSearchParameters {
                search_range,
                entry_selector,
                range_shift,
                segment_count,
            });
        }

        if options.trust_search_parameters {
            return Ok((stored_range, stored_iterations));
        }

        log::warn!(
            "Format 4 search parameters (searchRange {}, entrySelector {}, rangeShift {}) \
             do not match {} segments, recomputing",
            search_range,
            entry_selector,
            range_shift,
            segment_count
        );
        Ok((derived_range, derived_iterations))
    }

    /// Resolves a single code point to its glyph index.
    ///
    /// Code points above `0xFFFF`, in a gap between segments or past the
    /// last segment resolve to [`MISSING_GLYPH`]. A zero stored in the glyph
    /// index array is returned as is.
    ///
    /// # Errors
    ///
    /// `MalformedTable::GlyphIndexOutOfBounds` if the segment's range offset
    /// points outside the glyph index array.
    ///
    /// # Examples
    ///
    /// ```
    /// use vero_cmap::{MISSING_GLYPH, Segment, SegmentCharacterMap, SegmentTable};
    ///
    /// let segments = [Segment { start_code: 65, end_code: 90, id_delta: -64, id_range_offset: 0 }];
    /// let map = SegmentCharacterMap::new(SegmentTable::from_segments(&segments, vec![])).unwrap();
    ///
    /// assert_eq!(map.resolve_one('A' as u32).unwrap(), 1);
    /// assert_eq!(map.resolve_one('a' as u32).unwrap(), MISSING_GLYPH);
    /// ```
    pub fn resolve_one(&self, code_point: u32) -> Result<u16, MalformedTable> {
        let Ok(code) = u16::try_from(code_point) else {
            return Ok(MISSING_GLYPH);
        };

        let Some(segment) = self.find_segment(code) else {
            return Ok(MISSING_GLYPH);
        };

        if self.start_codes[segment - 1] > code {
            return Ok(MISSING_GLYPH);
        }

        self.glyph_in_segment(code, segment)
    }

    /// Resolves every code point, keeping input order.
    ///
    /// Either the whole slice resolves or the first malformed lookup is returned.
    pub fn resolve_many(&self, code_points: &[u32]) -> Result<Vec<u16>, MalformedTable> {
        code_points
            .iter()
            .map(|&code_point| self.resolve_one(code_point))
            .collect()
    }

    /// Every code point covered by a segment, in segment order
    pub fn covered_characters(&self) -> Vec<u32> {
        self.start_codes
            .iter()
            .zip(&self.end_codes)
            .flat_map(|(&start, &end)| (start..=end).map(u32::from))
            .collect()
    }

    /// Maps every covered code point to its glyph, walking each segment
    /// directly instead of searching.
    ///
    /// Where segments overlap, a code point keeps the glyph of the first
    /// segment that covers it.
    pub fn covered_glyphs(&self) -> Result<BTreeMap<u32, u16>, MalformedTable> {
        let segment_count = self.end_codes.len() as i64;
        let mut glyphs = BTreeMap::new();

        for (i, (&start, &end)) in self.start_codes.iter().zip(&self.end_codes).enumerate() {
            let ordinal = i + 1;
            let id_range_offset = self.id_range_offsets[i];
            let id_delta = self.id_deltas[i] as u16;

            // slot of `start` in the glyph index array
            let mut slot = i64::from(id_range_offset) - segment_count + ordinal as i64 - 1;

            for code in start..=end {
                let glyph = if id_range_offset == 0 {
                    code.wrapping_add(id_delta)
                } else {
                    self.glyph_at(u32::from(code), ordinal, slot)?
                };
                slot += 1;

                if let Entry::Vacant(entry) = glyphs.entry(u32::from(code)) {
                    entry.insert(glyph);
                }
            }
        }

        Ok(glyphs)
    }

    pub fn segment_count(&self) -> usize {
        self.end_codes.len()
    }

    pub fn search_range(&self) -> u32 {
        self.search_range
    }

    pub fn search_iterations(&self) -> u32 {
        self.search_iterations
    }

    pub fn language(&self) -> u16 {
        self.language
    }

    /// Fixed step binary search for the lowest segment whose end code is
    /// at least `code`. Returns its 1-based ordinal.
    fn find_segment(&self, code: u16) -> Option<usize> {
        if self.end_codes.is_empty() {
            return None;
        }

        let mut search_index = if self.search_range_end_code >= code {
            self.search_range as usize
        } else {
            self.end_codes.len()
        };
        let mut candidate = None;

        for i in 1..=self.search_iterations {
            let step = self.search_range.checked_shr(i).unwrap_or(0) as usize;

            // ordinals past the table behave like end codes below `code`
            match self.end_code(search_index) {
                Some(end_code) if end_code >= code => {
                    candidate = Some(search_index);
                    search_index = search_index.saturating_sub(step);
                }
                _ => search_index = search_index.saturating_add(step),
            }

            // any further step compares the same index again
            if step == 0 {
                break;
            }
        }

        candidate
    }

    fn end_code(&self, ordinal: usize) -> Option<u16> {
        ordinal
            .checked_sub(1)
            .and_then(|i| self.end_codes.get(i))
            .copied()
    }

    fn glyph_in_segment(&self, code: u16, ordinal: usize) -> Result<u16, MalformedTable> {
        let i = ordinal - 1;
        let id_range_offset = self.id_range_offsets[i];

        if id_range_offset == 0 {
            return Ok(code.wrapping_add(self.id_deltas[i] as u16));
        }

        // the stored offset is relative to the segment's own slot in the
        // range offset array, rebase it onto the glyph index array
        let index = i64::from(code) - i64::from(self.start_codes[i]) + i64::from(id_range_offset)
            - self.end_codes.len() as i64
            + ordinal as i64
            - 1;

        self.glyph_at(u32::from(code), ordinal, index)
    }

    fn glyph_at(&self, code_point: u32, ordinal: usize, index: i64) -> Result<u16, MalformedTable> {
        usize::try_from(index)
            .ok()
            .and_then(|slot| self.glyph_index_array.get(slot))
            .copied()
            .ok_or_else(|| {
                log::warn!(
                    "U+{:04X} maps to glyph index array slot {} of segment {}, \
                     the array has {} entries",
                    code_point,
                    index,
                    ordinal,
                    self.glyph_index_array.len()
                );
                MalformedTable::GlyphIndexOutOfBounds {
                    code_point,
                    segment: ordinal,
                    index,
                    len: self.glyph_index_array.len(),
                }
            })
    }
}
