//! Print the glyph a font's cmap assigns to each character of a string.
//!
//! Usage:
//!   cargo run --bin cmap_lookup -- <cmap-table-file> <text>
//!   cargo run --bin cmap_lookup -- <subtable-file> <text> --subtable
//!   RUST_LOG=debug cargo run --bin cmap_lookup -- <file> <text> --strict

use std::path::PathBuf;
use std::process::ExitCode;

use vero_cmap::{
    CharacterMap, Cmap, MISSING_GLYPH, ParseOptions, VeroCmapError, character_map_from_subtable,
};

struct LookupConfig {
    path: PathBuf,
    text: String,
    subtable: bool,
    options: ParseOptions,
}

impl LookupConfig {
    fn from_args() -> Option<Self> {
        let mut positional = Vec::new();
        let mut subtable = false;
        let mut options = ParseOptions::lenient();

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--subtable" => subtable = true,
                "--strict" => options = ParseOptions::strict(),
                _ => positional.push(arg),
            }
        }

        let [path, text] = <[String; 2]>::try_from(positional).ok()?;

        Some(Self {
            path: PathBuf::from(path),
            text,
            subtable,
            options,
        })
    }
}

fn load(
    data: &[u8],
    config: &LookupConfig,
) -> Result<Box<dyn CharacterMap + Send + Sync>, VeroCmapError> {
    if config.subtable {
        return character_map_from_subtable(data, &config.options);
    }

    Cmap::from_buffer(data)?.character_map(data, &config.options)
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(config) = LookupConfig::from_args() else {
        eprintln!("Usage: cmap_lookup <file> <text> [--subtable] [--strict]");
        return ExitCode::FAILURE;
    };

    let data = match std::fs::read(&config.path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error: failed to read {}: {}", config.path.display(), e);
            return ExitCode::FAILURE;
        },
    };

    let map = match load(&data, &config) {
        Ok(map) => map,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        },
    };

    for c in config.text.chars() {
        match map.glyph_for_character(c as u32) {
            Ok(MISSING_GLYPH) => println!("U+{:04X} {:?} -> missing", c as u32, c),
            Ok(glyph) => println!("U+{:04X} {:?} -> glyph {}", c as u32, c, glyph),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            },
        }
    }

    ExitCode::SUCCESS
}
