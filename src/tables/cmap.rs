use std::collections::BTreeMap;

use crate::{VeroCmapError, config::ParseOptions};

use super::{
    PlatformId, PlatformSpecificId, TableEncodingError,
    segment_map::{MalformedTable, SegmentCharacterMap},
};

/// Any decoded cmap subtable, mapping Unicode code points to glyph indices.
pub trait CharacterMap {
    /// Returns the glyph for a code point, `MISSING_GLYPH` if the font has none
    fn glyph_for_character(&self, code_point: u32) -> Result<u16, MalformedTable>;

    /// Bulk form of [`CharacterMap::glyph_for_character`], output follows input order
    fn glyphs_for_characters(&self, code_points: &[u32]) -> Result<Vec<u16>, MalformedTable> {
        code_points
            .iter()
            .map(|&code_point| self.glyph_for_character(code_point))
            .collect()
    }

    fn covered_characters(&self) -> Vec<u32>;

    fn covered_glyphs(&self) -> Result<BTreeMap<u32, u16>, MalformedTable>;
}

impl CharacterMap for SegmentCharacterMap {
    fn glyph_for_character(&self, code_point: u32) -> Result<u16, MalformedTable> {
        self.resolve_one(code_point)
    }

    fn glyphs_for_characters(&self, code_points: &[u32]) -> Result<Vec<u16>, MalformedTable> {
        self.resolve_many(code_points)
    }

    fn covered_characters(&self) -> Vec<u32> {
        SegmentCharacterMap::covered_characters(self)
    }

    fn covered_glyphs(&self) -> Result<BTreeMap<u32, u16>, MalformedTable> {
        SegmentCharacterMap::covered_glyphs(self)
    }
}

/// Builds the character map for a subtable, dispatching on its format field.
/// Only format 4 is supported.
pub fn character_map_from_subtable(
    data: &[u8],
    options: &ParseOptions,
) -> Result<Box<dyn CharacterMap + Send + Sync>, VeroCmapError> {
    let [hi, lo, ..] = *data else {
        return Err(TableEncodingError::InvalidBufferLength(2, data.len()).into());
    };

    match u16::from_be_bytes([hi, lo]) {
        4 => Ok(Box::new(SegmentCharacterMap::from_buffer(data, options)?)),
        format => Err(TableEncodingError::UnsupportedFormat(format).into()),
    }
}

/// Reads the declared length of the subtable starting at `offset`.
///
/// Formats 8 and up store a reserved field followed by a 32-bit length,
/// the older formats a 16-bit length right after the format.
fn subtable_length(data: &[u8], offset: usize) -> Result<usize, TableEncodingError> {
    let field = |at: usize, len: usize| {
        data.get(at..at + len)
            .ok_or(TableEncodingError::InvalidBufferLength(at + len, data.len()))
    };

    let format = field(offset, 2)?;
    match u16::from_be_bytes([format[0], format[1]]) {
        0..=7 => {
            let length = field(offset + 2, 2)?;
            Ok(usize::from(u16::from_be_bytes([length[0], length[1]])))
        }
        _ => {
            let length = field(offset + 4, 4)?;
            Ok(u32::from_be_bytes([length[0], length[1], length[2], length[3]]) as usize)
        }
    }
}

/// A representation of the [cmap table](https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6cmap.html)
/// header and its encoding records. Subtables are decoded on demand,
/// only format 4 is supported.
#[derive(Debug)]
pub struct Cmap {
    /// The version of the cmap table
    /// it's almost guaranteed to be set to zero
    version: u16,

    /// One record per encoding subtable
    subtables: Vec<CmapSub>,
}

impl Cmap {
    /// Parses the cmap header and encoding records, `data` being the whole
    /// cmap table.
    ///
    /// # Errors
    ///
    /// `TableEncodingError::InvalidBufferLength` if the data is too short
    /// for the header or the declared number of records.
    pub fn from_buffer(data: &[u8]) -> Result<Self, TableEncodingError> {
        if data.len() < 4 {
            return Err(TableEncodingError::InvalidBufferLength(4, data.len()));
        }

        let version = u16::from_be_bytes([data[0], data[1]]);
        let num_tables = u16::from_be_bytes([data[2], data[3]]);

        // every encoding record is 8 bytes and they directly follow the header
        let records_end = 4 + usize::from(num_tables) * 8;
        if data.len() < records_end {
            return Err(TableEncodingError::InvalidBufferLength(
                records_end,
                data.len(),
            ));
        }

        let subtables = data[4..records_end]
            .chunks(8)
            .map(CmapSub::from_buffer)
            .collect::<Result<Vec<CmapSub>, TableEncodingError>>()?;

        Ok(Self { version, subtables })
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn subtables(&self) -> &[CmapSub] {
        &self.subtables
    }

    /// Picks the subtable used for Unicode lookups and returns its bytes.
    ///
    /// Microsoft Unicode BMP (3, 1) is preferred, then any BMP encoding on
    /// the Unicode platform.
    pub fn unicode_subtable<'a>(&self, data: &'a [u8]) -> Result<&'a [u8], TableEncodingError> {
        let record = self
            .subtables
            .iter()
            .find(|sub| sub.platform_specific_id == PlatformSpecificId::MicrosoftUnicodeBmp)
            .or_else(|| {
                self.subtables.iter().find(|sub| {
                    sub.platform_id == PlatformId::Unicode
                        && sub.platform_specific_id.is_unicode_bmp()
                })
            })
            .ok_or(TableEncodingError::NoUnicodeSubtable)?;

        log::trace!(
            "Selected cmap encoding record {:?}/{:?} at offset {}",
            record.platform_id,
            record.platform_specific_id,
            record.offset
        );

        let offset = record.offset as usize;
        let end = offset + subtable_length(data, offset)?;
        data.get(offset..end)
            .ok_or(TableEncodingError::InvalidBufferLength(end, data.len()))
    }

    /// Decodes the Unicode subtable of the cmap table in `data`.
    pub fn character_map(
        &self,
        data: &[u8],
        options: &ParseOptions,
    ) -> Result<Box<dyn CharacterMap + Send + Sync>, VeroCmapError> {
        character_map_from_subtable(self.unicode_subtable(data)?, options)
    }
}

/// A representation of a cmap encoding record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmapSub {
    /// The platform identifier
    platform_id: PlatformId,

    /// The platform specific encoding identifier
    platform_specific_id: PlatformSpecificId,

    /// The offset of the mapping table from the start of the cmap table
    offset: u32,
}

impl CmapSub {
    /// Constructs an encoding record from its 8 raw bytes
    pub fn from_buffer(buf: &[u8]) -> Result<Self, TableEncodingError> {
        if buf.len() != 8 {
            return Err(TableEncodingError::InvalidBufferLength(8, buf.len()));
        }

        let platform_id = PlatformId::from(u16::from_be_bytes([buf[0], buf[1]]));

        Ok(Self {
            platform_id,
            platform_specific_id: PlatformSpecificId::new(
                platform_id,
                u16::from_be_bytes([buf[2], buf[3]]),
            ),
            offset: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    pub fn platform_id(&self) -> PlatformId {
        self.platform_id
    }

    pub fn platform_specific_id(&self) -> PlatformSpecificId {
        self.platform_specific_id
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use crate::MISSING_GLYPH;

    use super::*;

    /// Version 0, a Macintosh record and a Microsoft Unicode BMP record,
    /// both pointing at the same one segment format 4 subtable
    const CMAP: &[u8] = &[
        0x00, 0x00, // version: 0
        0x00, 0x02, // number of tables: 2
        // Encoding record [0]
        0x00, 0x01, // platform: Macintosh
        0x00, 0x00, // encoding: 0
        0x00, 0x00, 0x00, 0x14, // offset: 20
        // Encoding record [1]
        0x00, 0x03, // platform: Microsoft
        0x00, 0x01, // encoding: Unicode BMP
        0x00, 0x00, 0x00, 0x14, // offset: 20
        // Format 4 subtable
        0x00, 0x04, // format: 4
        0x00, 0x18, // subtable size: 24
        0x00, 0x00, // language ID: 0
        0x00, 0x02, // 2 x segCount: 2
        0x00, 0x02, // search range: 2
        0x00, 0x00, // entry selector: 0
        0x00, 0x00, // range shift: 0
        0x00, 0x5A, // end code [0]: 90
        0x00, 0x00, // reserved: 0
        0x00, 0x41, // start code [0]: 65
        0xFF, 0xC3, // delta [0]: -61
        0x00, 0x00, // offset [0]: 0
    ];

    #[test]
    fn parses_encoding_records() {
        let cmap = Cmap::from_buffer(CMAP).unwrap();

        assert_eq!(cmap.version(), 0);
        assert_eq!(cmap.subtables().len(), 2);
        assert_eq!(cmap.subtables()[0].platform_id(), PlatformId::Macintosh);
        assert_eq!(
            cmap.subtables()[1].platform_specific_id(),
            PlatformSpecificId::MicrosoftUnicodeBmp
        );
        assert_eq!(cmap.subtables()[1].offset(), 20);
    }

    #[test]
    fn truncated_records_are_rejected() {
        assert_eq!(
            Cmap::from_buffer(&CMAP[..10]).unwrap_err(),
            TableEncodingError::InvalidBufferLength(20, 10)
        );
        assert_eq!(
            Cmap::from_buffer(&CMAP[..3]).unwrap_err(),
            TableEncodingError::InvalidBufferLength(4, 3)
        );
    }

    #[test]
    fn resolves_through_the_unicode_subtable() {
        let cmap = Cmap::from_buffer(CMAP).unwrap();
        let map = cmap.character_map(CMAP, &ParseOptions::strict()).unwrap();

        assert_eq!(map.glyph_for_character('A' as u32).unwrap(), 4);
        assert_eq!(map.glyph_for_character('Z' as u32).unwrap(), 29);
        assert_eq!(map.glyph_for_character('a' as u32).unwrap(), MISSING_GLYPH);
        assert_eq!(
            map.glyphs_for_characters(&['Z' as u32, '@' as u32]).unwrap(),
            vec![29, MISSING_GLYPH]
        );
        assert_eq!(map.covered_characters().len(), 26);
    }

    #[test]
    fn falls_back_to_unicode_platform() {
        let mut data = CMAP.to_vec();
        // Microsoft record becomes Unicode 2.0 BMP
        data[12..16].copy_from_slice(&[0x00, 0x00, 0x00, 0x03]);

        let cmap = Cmap::from_buffer(&data).unwrap();
        assert_eq!(cmap.unicode_subtable(&data).unwrap().len(), 24);
    }

    #[test]
    fn missing_unicode_record() {
        let mut data = CMAP.to_vec();
        // Microsoft record becomes Symbol
        data[15] = 0x00;

        let cmap = Cmap::from_buffer(&data).unwrap();
        assert_eq!(
            cmap.unicode_subtable(&data).unwrap_err(),
            TableEncodingError::NoUnicodeSubtable
        );
    }

    #[test]
    fn record_offset_past_table() {
        let mut data = CMAP.to_vec();
        data[19] = 0xFF;

        let cmap = Cmap::from_buffer(&data).unwrap();
        assert_eq!(
            cmap.unicode_subtable(&data).unwrap_err(),
            TableEncodingError::InvalidBufferLength(257, data.len())
        );
    }

    #[test]
    fn declared_length_past_table() {
        let mut data = CMAP.to_vec();
        data[23] = 0x30; // subtable claims 48 bytes, 24 remain

        let cmap = Cmap::from_buffer(&data).unwrap();
        assert_eq!(
            cmap.unicode_subtable(&data).unwrap_err(),
            TableEncodingError::InvalidBufferLength(68, data.len())
        );
    }

    #[test]
    fn subtable_followed_by_another_subtable() {
        let mut data = vec![
            0x00, 0x00, // version: 0
            0x00, 0x02, // number of tables: 2
            // Encoding record [0]
            0x00, 0x03, // platform: Microsoft
            0x00, 0x01, // encoding: Unicode BMP
            0x00, 0x00, 0x00, 0x14, // offset: 20
            // Encoding record [1]
            0x00, 0x03, // platform: Microsoft
            0x00, 0x0A, // encoding: Unicode full repertoire
            0x00, 0x00, 0x00, 0x2C, // offset: 44
        ];
        data.extend_from_slice(&CMAP[20..]);
        // Format 12 subtable without groups
        data.extend_from_slice(&[
            0x00, 0x0C, // format: 12
            0x00, 0x00, // reserved: 0
            0x00, 0x00, 0x00, 0x10, // subtable size: 16
            0x00, 0x00, 0x00, 0x00, // language ID: 0
            0x00, 0x00, 0x00, 0x00, // number of groups: 0
        ]);

        let cmap = Cmap::from_buffer(&data).unwrap();
        assert_eq!(cmap.unicode_subtable(&data).unwrap(), &CMAP[20..]);

        let map = cmap.character_map(&data, &ParseOptions::strict()).unwrap();
        assert_eq!(map.glyph_for_character('A' as u32).unwrap(), 4);
        assert_eq!(map.glyph_for_character('Z' as u32).unwrap(), 29);
    }

    #[test]
    fn only_format_4_is_dispatched() {
        let format_12 = [0x00, 0x0C, 0x00, 0x00];

        assert!(matches!(
            character_map_from_subtable(&format_12, &ParseOptions::default()),
            Err(VeroCmapError::TableEncodingError(
                TableEncodingError::UnsupportedFormat(12)
            ))
        ));
        assert!(matches!(
            character_map_from_subtable(&[0x00], &ParseOptions::default()),
            Err(VeroCmapError::TableEncodingError(
                TableEncodingError::InvalidBufferLength(2, 1)
            ))
        ));
    }
}
