//! Bounded statement parsing
//!
//! CSV and OFX/QFX are parsed locally. Other types carry no text rows and are
//! handed to an external extractor by the caller.

mod csv;
mod ofx;

use ledgerlens_core::models::Transaction;

use crate::validator::{DetectedType, ValidationError};

pub use self::csv::parse_csv;
pub use self::ofx::parse_ofx;

/// Rows read from one statement, capped at the requested maximum
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStatement {
    pub rows: Vec<Transaction>,
    /// The source had more rows than were kept
    pub truncated: bool,
}

pub fn has_local_parser(detected: DetectedType) -> bool {
    detected.is_text()
}

pub fn parse_statement(
    detected: DetectedType,
    data: &[u8],
    max_rows: usize,
) -> Result<ParsedStatement, ValidationError> {
    let text = String::from_utf8_lossy(data);
    match detected {
        DetectedType::Csv => parse_csv(&text, max_rows),
        DetectedType::Ofx => Ok(parse_ofx(&text, max_rows)),
        other => Err(ValidationError::Generic(format!(
            "no local parser for {} content",
            other
        ))),
    }
}
