//! ZIP inspection
//!
//! Every entry is checked by its raw stored name and then actually inflated, so
//! declared sizes in the central directory are never trusted.

use std::io::{Cursor, Read};

use zip::result::ZipError;
use zip::ZipArchive;

use super::pdf::is_password_protected;
use super::sniff::{extension_of, is_allowed_extension, is_archive_extension, sniff, DetectedType};
use super::ValidationError;

/// An inflated archive entry that passed every check
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub extension: String,
    pub detected: DetectedType,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct ArchiveLimits {
    pub max_entries: usize,
    pub max_unzipped_bytes: u64,
}

/// Stored names that would escape the extraction root
pub fn is_unsafe_entry_path(name: &str) -> bool {
    if name.contains("../") || name.contains("..\\") || name == ".." {
        return true;
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return true;
    }
    let bytes = name.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

pub fn inspect_archive(
    data: &[u8],
    limits: ArchiveLimits,
) -> Result<Vec<ArchiveEntry>, ValidationError> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(unreadable)?;

    if archive.len() > limits.max_entries {
        return Err(ValidationError::ZipSafety(format!(
            "archive has {} entries (max: {})",
            archive.len(),
            limits.max_entries
        )));
    }

    let mut entries = Vec::new();
    let mut inflated_total: u64 = 0;

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(unreadable)?;
        let name = file.name().to_string();

        if is_unsafe_entry_path(&name) {
            tracing::warn!(entry = %name, "Archive entry path escapes extraction root");
            return Err(ValidationError::ZipSafety(format!(
                "entry '{}' has an unsafe path",
                name
            )));
        }
        if file.is_dir() {
            continue;
        }

        let extension = extension_of(&name).unwrap_or_default();
        if is_archive_extension(&extension) {
            return Err(ValidationError::ZipSafety(format!(
                "nested archive '{}' is not allowed",
                name
            )));
        }
        if !is_allowed_extension(&extension) {
            return Err(ValidationError::ZipUnsupported(format!(
                "entry '{}' has an unsupported type",
                name
            )));
        }

        // Read at most one byte past the remaining budget so an overrun is visible
        // without inflating the rest of the entry.
        let budget = limits.max_unzipped_bytes.saturating_sub(inflated_total);
        let mut content = Vec::new();
        (&mut file)
            .take(budget.saturating_add(1))
            .read_to_end(&mut content)
            .map_err(|e| ValidationError::MalformedFile(format!("entry '{}': {}", name, e)))?;
        inflated_total += content.len() as u64;
        if inflated_total > limits.max_unzipped_bytes {
            tracing::warn!(
                inflated_bytes = inflated_total,
                max_unzipped_bytes = limits.max_unzipped_bytes,
                "Archive inflates past the decompression ceiling"
            );
            return Err(ValidationError::ZipSafety(format!(
                "archive inflates past {} bytes",
                limits.max_unzipped_bytes
            )));
        }

        let detected = match sniff(&content) {
            Some(detected) if detected.matches_extension(&extension) => detected,
            _ => {
                return Err(ValidationError::ZipUnsupported(format!(
                    "entry '{}' content does not match its extension",
                    name
                )))
            }
        };
        if detected == DetectedType::Pdf && is_password_protected(&content) {
            return Err(ValidationError::PasswordProtected);
        }

        entries.push(ArchiveEntry {
            name,
            extension,
            detected,
            data: content,
        });
    }

    if entries.is_empty() {
        return Err(ValidationError::ZipSafety(
            "archive contains no files".to_string(),
        ));
    }

    Ok(entries)
}

fn unreadable(err: ZipError) -> ValidationError {
    match err {
        ZipError::UnsupportedArchive(msg) if msg == ZipError::PASSWORD_REQUIRED => {
            ValidationError::MalformedFile("archive is password-protected".to_string())
        }
        other => ValidationError::MalformedFile(format!("archive could not be read: {}", other)),
    }
}
