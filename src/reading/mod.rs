//! Loaders turning raw source files into in-memory datasets.

pub mod atcf;
pub mod cxml;
pub mod ibtracs;
pub mod nhc_current;

use crate::error::ParseError;

pub use atcf::{read_adeck, AtcfLine};
pub use cxml::{read_cxml, CxmlFix};
pub use ibtracs::IbtracsDataset;
pub use nhc_current::{read_current_storms, ActiveStorm};

// Define a trait for deserializing a line into a reading
pub trait Reading: Sized {
    fn from_line(line: &str, line_no: usize) -> Result<Self, ParseError>;
}

/// Quadrant order used by every radii array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    NE,
    SE,
    SW,
    NW,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [Quadrant::NE, Quadrant::SE, Quadrant::SW, Quadrant::NW];

    pub fn index(&self) -> usize {
        match self {
            Quadrant::NE => 0,
            Quadrant::SE => 1,
            Quadrant::SW => 2,
            Quadrant::NW => 3,
        }
    }
}

/// Strips NUL and whitespace padding; empty strings and byte-string sentinels
/// become `None`.
pub fn clean_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match trimmed {
        "" | "b''" | "b\"\"" => None,
        value => Some(value.to_string()),
    }
}

/// Same as [`clean_text`] for fixed-width character arrays.
pub fn clean_bytes(raw: &[u8]) -> Option<String> {
    clean_text(&String::from_utf8_lossy(raw))
}

/// NaN and fill values (≤ -9990) become `None`.
pub fn clean_number(value: f64) -> Option<f64> {
    if value.is_nan() || value <= -9990.0 {
        None
    } else {
        Some(value)
    }
}

// -- Tests -------------------------------------------------------------------
