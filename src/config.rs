//! Parser configuration for strict and lenient decoding of `cmap` subtables.

/// Options controlling how much a subtable header is trusted.
///
/// Font files in the wild regularly carry a wrong `length` field or search
/// parameters that do not match their segment count. Lenient parsing repairs
/// both and keeps going, strict parsing rejects them.
///
/// # Example
///
/// ```
/// use vero_cmap::config::ParseOptions;
///
/// let strict = ParseOptions::strict();
/// assert!(strict.strict);
///
/// // Lenient is the default
/// assert!(!ParseOptions::default().strict);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Fail on header inconsistencies (true) or repair them (false)
    pub strict: bool,

    /// Use `searchRange` and `entrySelector` exactly as stored in the header.
    ///
    /// When false, lenient parsing replaces search parameters that disagree
    /// with the segment count by the derived ones. Stored values are still
    /// checked for the invariants a lookup depends on.
    pub trust_search_parameters: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParseOptions {
    /// Strict mode: the declared length must match the data and the search
    /// parameters must match the segment count.
    pub fn strict() -> Self {
        Self {
            strict: true,
            trust_search_parameters: true,
        }
    }

    /// Lenient mode: clamp the declared length to the data and recompute
    /// bogus search parameters.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            trust_search_parameters: false,
        }
    }
}
