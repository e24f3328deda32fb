//! Content type detection from leading bytes

use std::fmt;
use std::path::Path;

/// Extensions accepted for upload, lower-case
pub const ALLOWED_EXTENSIONS: &[&str] = &["csv", "ofx", "qfx", "pdf", "jpg", "jpeg", "png", "zip"];

/// Archive formats never accepted inside a ZIP
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "xz", "jar"];

/// How much of a text file is inspected when sniffing
pub const SNIFF_PREFIX_LEN: usize = 8 * 1024;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PDF_SIGNATURE: &[u8] = b"%PDF-";
const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";

/// File type as determined by content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectedType {
    Pdf,
    Png,
    Jpeg,
    Zip,
    Ofx,
    Csv,
}

impl DetectedType {
    pub fn mime(&self) -> &'static str {
        match self {
            DetectedType::Pdf => "application/pdf",
            DetectedType::Png => "image/png",
            DetectedType::Jpeg => "image/jpeg",
            DetectedType::Zip => "application/zip",
            DetectedType::Ofx => "application/x-ofx",
            DetectedType::Csv => "text/csv",
        }
    }

    /// Whether a file named with `extension` may carry this content.
    /// `jpg` and `jpeg` are one family, as are `ofx` and `qfx`.
    pub fn matches_extension(&self, extension: &str) -> bool {
        matches!(
            (self, extension),
            (DetectedType::Pdf, "pdf")
                | (DetectedType::Png, "png")
                | (DetectedType::Jpeg, "jpg" | "jpeg")
                | (DetectedType::Zip, "zip")
                | (DetectedType::Ofx, "ofx" | "qfx")
                | (DetectedType::Csv, "csv")
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DetectedType::Csv | DetectedType::Ofx)
    }
}

impl fmt::Display for DetectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectedType::Pdf => "pdf",
            DetectedType::Png => "png",
            DetectedType::Jpeg => "jpeg",
            DetectedType::Zip => "zip",
            DetectedType::Ofx => "ofx",
            DetectedType::Csv => "csv",
        };
        f.write_str(name)
    }
}

/// Lower-cased extension of a filename, if it has one
pub fn extension_of(filename: &str) -> Option<String> {
    // Archive entries may use either separator regardless of platform
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    Path::new(base)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty())
}

pub fn is_allowed_extension(extension: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&extension)
}

pub fn is_archive_extension(extension: &str) -> bool {
    ARCHIVE_EXTENSIONS.contains(&extension)
}

/// Detect the content type. Binary signatures win over text heuristics.
pub fn sniff(data: &[u8]) -> Option<DetectedType> {
    if data.starts_with(PDF_SIGNATURE) {
        return Some(DetectedType::Pdf);
    }
    if data.starts_with(PNG_SIGNATURE) {
        return Some(DetectedType::Png);
    }
    if data.starts_with(JPEG_SIGNATURE) {
        return Some(DetectedType::Jpeg);
    }
    if data.starts_with(ZIP_LOCAL_HEADER) || data.starts_with(ZIP_EMPTY_ARCHIVE) {
        return Some(DetectedType::Zip);
    }

    let prefix = &data[..data.len().min(SNIFF_PREFIX_LEN)];
    if prefix.contains(&0) {
        return None;
    }
    if contains_ignore_case(prefix, b"<OFX>") || contains_ignore_case(prefix, b"OFXHEADER") {
        return Some(DetectedType::Ofx);
    }
    let has_comma = prefix.contains(&b',');
    let has_line_break = prefix.iter().any(|b| *b == b'\n' || *b == b'\r');
    if has_comma && has_line_break {
        return Some(DetectedType::Csv);
    }
    None
}

pub(crate) fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
