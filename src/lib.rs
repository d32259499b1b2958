use buffer::FontReaderError;
use tables::{TableEncodingError, segment_map::MalformedTable};
use thiserror::Error;

pub mod buffer;
pub mod config;
pub mod tables;

pub use config::ParseOptions;
pub use tables::cmap::{CharacterMap, Cmap, CmapSub, character_map_from_subtable};
pub use tables::segment_map::{Segment, SegmentCharacterMap, SegmentTable};

/// Glyph index returned for code points the font does not map,
/// glyph 0 being `.notdef` in every TrueType font
pub const MISSING_GLYPH: u16 = 0;

#[derive(Debug, Error)]
pub enum VeroCmapError {
    #[error(transparent)]
    TableEncodingError(#[from] TableEncodingError),

    #[error(transparent)]
    FontReaderError(#[from] FontReaderError),

    #[error(transparent)]
    MalformedTable(#[from] MalformedTable),
}
