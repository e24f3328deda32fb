//! Statement and archive fixtures

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A CSV statement with a header and `rows` transactions
pub fn csv_statement(rows: usize) -> Vec<u8> {
    let mut text = String::from("Date,Description,Amount\n");
    for i in 0..rows {
        text.push_str(&format!("2024-04-{:02},Merchant {},-{}.25\n", i % 28 + 1, i, i));
    }
    text.into_bytes()
}

pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Deflates far beyond the default unzipped ceiling
pub fn zip_bomb() -> Vec<u8> {
    let chunk = vec![b'0'; 1024 * 1024];
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file("huge.csv", options).unwrap();
    for _ in 0..60 {
        writer.write_all(&chunk).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
