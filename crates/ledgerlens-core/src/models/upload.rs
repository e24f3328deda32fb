use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single statement line as parsed from the upload.
///
/// Amounts stay textual so the export reproduces exactly what the bank wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: String,
    pub description: String,
    pub amount: String,
    /// Filled by the categorization pipeline
    #[serde(default)]
    pub category: Option<String>,
}

impl Transaction {
    pub fn new(
        date: impl Into<String>,
        description: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            description: description.into(),
            amount: amount.into(),
            category: None,
        }
    }

    /// Column values in export order
    pub fn to_row(&self) -> Vec<Option<String>> {
        vec![
            Some(self.date.clone()),
            Some(self.description.clone()),
            Some(self.amount.clone()),
            self.category.clone(),
        ]
    }
}

/// Campaign attribution supplied alongside an upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

impl Attribution {
    pub fn is_empty(&self) -> bool {
        self.utm_source.is_none() && self.utm_medium.is_none() && self.utm_campaign.is_none()
    }
}

/// A validated, parsed upload held for the retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: Uuid,
    pub filename: String,
    pub size_bytes: u64,
    pub detected_mime: String,
    pub extension: String,
    pub row_count: usize,
    pub truncated: bool,
    pub consent_training: bool,
    /// Normalized email supplied with the upload, if any
    pub email: Option<String>,
    pub attribution: Attribution,
    pub rows: Vec<Transaction>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Response returned after a successful upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub upload_id: Uuid,
    pub filename: String,
    pub row_count: usize,
    pub truncated: bool,
    pub expires_at: DateTime<Utc>,
}

impl From<&UploadSession> for UploadResponse {
    fn from(session: &UploadSession) -> Self {
        Self {
            upload_id: session.id,
            filename: session.filename.clone(),
            row_count: session.row_count,
            truncated: session.truncated,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}
