//! CSV reading and safe rendering

mod reader;
mod sanitizer;

pub use reader::CsvRecords;
pub use sanitizer::{quote_field, render, sanitize_field, sanitize_row, sanitize_table};
