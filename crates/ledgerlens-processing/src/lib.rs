//! LedgerLens Processing Library
//!
//! Content-level handling of uploaded statements:
//! - File validation (magic-byte sniffing, size ceilings, PDF and ZIP deep checks)
//! - CSV export sanitization against formula injection
//! - Bounded parsing of CSV and OFX/QFX statements into transactions

pub mod csv;
pub mod statement;
pub mod validator;

pub use csv::{render, sanitize_field, sanitize_row, sanitize_table};
pub use statement::{parse_statement, ParsedStatement};
pub use validator::{
    ArchiveEntry, DetectedType, FileValidator, ValidatedFile, ValidationError, ValidationReport,
};
