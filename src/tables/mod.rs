use thiserror::Error;

pub mod cmap;
pub mod segment_map;

/// Represents the error messages which may occur when trying
/// to parse tables from raw binary buffers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableEncodingError {
    #[error("The required buffer length for this table is {0} bytes, got {1} bytes")]
    InvalidBufferLength(usize, usize),

    #[error("Unsupported cmap subtable format {0}, only format 4 is supported")]
    UnsupportedFormat(u16),

    /// `segCountX2` must be even
    #[error("Invalid segment count, segCountX2 is {0}")]
    InvalidSegmentCount(u16),

    #[error("The subtable declares a length of {declared} bytes but {actual} bytes are available")]
    LengthMismatch { declared: usize, actual: usize },

    #[error(
        "Search parameters (searchRange {search_range}, entrySelector {entry_selector}, \
         rangeShift {range_shift}) do not match a table of {segment_count} segments"
    )]
    InvalidSearchParameters {
        search_range: u16,
        entry_selector: u16,
        range_shift: u16,
        segment_count: usize,
    },

    #[error("The cmap table has no Unicode BMP encoding record")]
    NoUnicodeSubtable,
}

/// Represents the platform identifier of a cmap encoding record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformId {
    Unicode,
    Macintosh,
    Reserved,
    Microsoft,
    Unknown(u16),
}

impl From<u16> for PlatformId {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Unicode,
            1 => Self::Macintosh,
            2 => Self::Reserved,
            3 => Self::Microsoft,
            _ => Self::Unknown(value),
        }
    }
}

/// Represents the platform-specific encoding identifier.
/// Its meaning depends on the platform, so it can only be decoded
/// together with a `PlatformId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSpecificId {
    Version1,
    Version1_1,
    #[warn(deprecated)]
    Iso10646,
    Unicode2_0Bmp,
    Unicode2_0NonBmp,
    VariationSequences,
    UnicodeFull,
    MicrosoftSymbol,
    MicrosoftUnicodeBmp,
    MicrosoftUnicodeFull,
    Unknown(u16),
}

impl PlatformSpecificId {
    pub fn new(platform: PlatformId, value: u16) -> Self {
        match (platform, value) {
            (PlatformId::Unicode, 0) => Self::Version1,
            (PlatformId::Unicode, 1) => Self::Version1_1,
            (PlatformId::Unicode, 2) => Self::Iso10646,
            (PlatformId::Unicode, 3) => Self::Unicode2_0Bmp,
            (PlatformId::Unicode, 4) => Self::Unicode2_0NonBmp,
            (PlatformId::Unicode, 5) => Self::VariationSequences,
            (PlatformId::Unicode, 6) => Self::UnicodeFull,
            (PlatformId::Microsoft, 0) => Self::MicrosoftSymbol,
            (PlatformId::Microsoft, 1) => Self::MicrosoftUnicodeBmp,
            (PlatformId::Microsoft, 10) => Self::MicrosoftUnicodeFull,
            _ => Self::Unknown(value),
        }
    }

    /// True for encodings limited to the Basic Multilingual Plane
    pub fn is_unicode_bmp(&self) -> bool {
        matches!(
            self,
            Self::Version1
                | Self::Version1_1
                | Self::Iso10646
                | Self::Unicode2_0Bmp
                | Self::MicrosoftUnicodeBmp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_ids_depend_on_platform() {
        assert_eq!(
            PlatformSpecificId::new(PlatformId::Microsoft, 1),
            PlatformSpecificId::MicrosoftUnicodeBmp
        );
        assert_eq!(
            PlatformSpecificId::new(PlatformId::Unicode, 1),
            PlatformSpecificId::Version1_1
        );
        assert_eq!(
            PlatformSpecificId::new(PlatformId::Macintosh, 1),
            PlatformSpecificId::Unknown(1)
        );
    }

    #[test]
    fn only_bmp_encodings_qualify() {
        assert!(PlatformSpecificId::Unicode2_0Bmp.is_unicode_bmp());
        assert!(PlatformSpecificId::MicrosoftUnicodeBmp.is_unicode_bmp());
        assert!(!PlatformSpecificId::MicrosoftUnicodeFull.is_unicode_bmp());
        assert!(!PlatformSpecificId::MicrosoftSymbol.is_unicode_bmp());
        assert!(!PlatformSpecificId::Unknown(3).is_unicode_bmp());
    }
}
