//! Upload validation
//!
//! Determines what a file really is from its bytes and enforces the size and
//! structure rules for each type. Client-declared MIME types are never consulted.
//! Every check fails closed.

mod archive;
mod pdf;
mod sniff;

use ledgerlens_core::{AppError, LimitsConfig};

pub use self::archive::{inspect_archive, is_unsafe_entry_path, ArchiveEntry, ArchiveLimits};
pub use self::pdf::is_password_protected;
pub use self::sniff::{
    extension_of, is_allowed_extension, is_archive_extension, sniff, DetectedType,
    ALLOWED_EXTENSIONS, ARCHIVE_EXTENSIONS,
};

const MB: usize = 1024 * 1024;

/// Validation failures
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Unsupported file type: .{extension}")]
    UnsupportedType { extension: String },

    #[error("File is empty")]
    EmptyFile,

    #[error("File content does not match its .{extension} extension")]
    TypeMismatch { extension: String },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("PDF is password-protected")]
    PasswordProtected,

    #[error("Malformed file: {0}")]
    MalformedFile(String),

    #[error("Archive safety violation: {0}")]
    ZipSafety(String),

    #[error("Archive contains unsupported content: {0}")]
    ZipUnsupported(String),

    #[error("Validation failed: {0}")]
    Generic(String),
}

impl ValidationError {
    /// Stable client-facing code
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            ValidationError::EmptyFile
            | ValidationError::TypeMismatch { .. }
            | ValidationError::PasswordProtected
            | ValidationError::MalformedFile(_) => "MALFORMED_FILE",
            ValidationError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ValidationError::ZipSafety(_) => "ZIP_SAFETY_VIOLATION",
            ValidationError::ZipUnsupported(_) => "ZIP_UNSUPPORTED_MIME",
            ValidationError::Generic(_) => "GENERIC_ERROR",
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        match err {
            ValidationError::UnsupportedType { .. } => AppError::UnsupportedType(message),
            ValidationError::EmptyFile
            | ValidationError::TypeMismatch { .. }
            | ValidationError::PasswordProtected
            | ValidationError::MalformedFile(_) => AppError::MalformedFile(message),
            ValidationError::FileTooLarge { max, .. } => AppError::FileTooLarge(format!(
                "File exceeds the {} MB limit for this type",
                max.div_ceil(MB)
            )),
            ValidationError::ZipSafety(_) => AppError::ZipSafetyViolation(message),
            ValidationError::ZipUnsupported(_) => AppError::ZipUnsupportedMime(message),
            ValidationError::Generic(_) => AppError::Internal(message),
        }
    }
}

/// A file that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub extension: String,
    pub detected: DetectedType,
    pub size_bytes: usize,
    /// Inflated entries, for archives
    pub entries: Vec<ArchiveEntry>,
}

impl ValidatedFile {
    pub fn mime(&self) -> &'static str {
        self.detected.mime()
    }
}

/// Flat result shape: `{valid, mime, extension, error, code}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub mime: Option<&'static str>,
    pub extension: Option<String>,
    pub error: Option<String>,
    pub code: Option<&'static str>,
}

/// Content-based file validator
#[derive(Clone, Debug)]
pub struct FileValidator {
    limits: LimitsConfig,
}

impl FileValidator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Largest upload any type accepts; used to bound request bodies
    pub fn max_upload_bytes(&self) -> usize {
        [
            self.limits.max_text_bytes,
            self.limits.max_pdf_bytes,
            self.limits.max_image_bytes,
            self.limits.max_zip_bytes,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    fn max_size_for(&self, detected: DetectedType) -> usize {
        match detected {
            DetectedType::Csv | DetectedType::Ofx => self.limits.max_text_bytes,
            DetectedType::Pdf => self.limits.max_pdf_bytes,
            DetectedType::Png | DetectedType::Jpeg => self.limits.max_image_bytes,
            DetectedType::Zip => self.limits.max_zip_bytes,
        }
    }

    /// Run every check in order: extension, content, size, deep inspection.
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    pub fn check(&self, data: &[u8], filename: &str) -> Result<ValidatedFile, ValidationError> {
        let extension = extension_of(filename).unwrap_or_default();
        if !is_allowed_extension(&extension) {
            return Err(ValidationError::UnsupportedType { extension });
        }

        if data.is_empty() {
            return Err(ValidationError::EmptyFile);
        }
        let detected = match sniff(data) {
            Some(detected) if detected.matches_extension(&extension) => detected,
            _ => return Err(ValidationError::TypeMismatch { extension }),
        };

        let max = self.max_size_for(detected);
        if data.len() > max {
            return Err(ValidationError::FileTooLarge {
                size: data.len(),
                max,
            });
        }

        let entries = match detected {
            DetectedType::Pdf if is_password_protected(data) => {
                return Err(ValidationError::PasswordProtected)
            }
            DetectedType::Zip => inspect_archive(
                data,
                ArchiveLimits {
                    max_entries: self.limits.max_zip_entries,
                    max_unzipped_bytes: self.limits.max_unzipped_bytes,
                },
            )?,
            _ => Vec::new(),
        };

        tracing::debug!(
            extension = %extension,
            detected = %detected,
            entries = entries.len(),
            "File passed validation"
        );

        Ok(ValidatedFile {
            extension,
            detected,
            size_bytes: data.len(),
            entries,
        })
    }

    /// [`check`](Self::check) flattened into a report
    pub fn validate(&self, data: &[u8], filename: &str) -> ValidationReport {
        match self.check(data, filename) {
            Ok(file) => ValidationReport {
                valid: true,
                mime: Some(file.mime()),
                extension: Some(file.extension),
                error: None,
                code: None,
            },
            Err(err) => ValidationReport {
                valid: false,
                mime: None,
                extension: extension_of(filename),
                error: Some(err.to_string()),
                code: Some(err.code()),
            },
        }
    }
}
