//! End-to-end intake flow.
//!
//! Admission, validation, bounded parsing, categorization and retention-scoped
//! storage on upload; the verification gate and sanitized rendering on export.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use ledgerlens_core::models::{
    Attribution, SendCodeResponse, Transaction, UploadSession, VerifyCodeResponse,
};
use ledgerlens_core::{hash_email, normalize_email, AppError, IntakeConfig, LimitsConfig};
use ledgerlens_infra::{with_store_timeout, AdmissionRequest, RateLimiter};
use ledgerlens_processing::statement::has_local_parser;
use ledgerlens_processing::{
    parse_statement, render, DetectedType, FileValidator, ValidatedFile, ValidationError,
};

use crate::mailer::CodeMailer;
use crate::pipeline::{Categorizer, DocumentExtractor, NoopExtractor, PassthroughCategorizer};
use crate::sessions::SessionStore;
use crate::verification::{CodeStore, VerificationGate};

const EXPORT_HEADER: [&str; 4] = ["Date", "Description", "Amount", "Category"];

/// An upload as received from the client
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub client_ip: String,
    pub filename: String,
    pub data: Bytes,
    pub email: Option<String>,
    pub consent_training: bool,
    /// Accepted for the client contract; not checked here
    pub captcha_token: Option<String>,
    pub attribution: Attribution,
}

/// A stored upload plus the caller's remaining IP allowance
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub session: UploadSession,
    pub remaining: u32,
}

/// How an export request proves it may read the data
#[derive(Debug, Clone, Copy)]
pub enum ExportAuth<'a> {
    Token(&'a str),
    Bypass,
    Missing,
}

#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
}

/// Rows gathered from one upload before categorization
#[derive(Debug, Default)]
struct CollectedRows {
    rows: Vec<Transaction>,
    truncated: bool,
}

impl CollectedRows {
    fn budget(&self, max_rows: usize) -> usize {
        max_rows.saturating_sub(self.rows.len())
    }

    fn extend_capped(&mut self, mut rows: Vec<Transaction>, truncated: bool, max_rows: usize) {
        let budget = self.budget(max_rows);
        if rows.len() > budget {
            rows.truncate(budget);
            self.truncated = true;
        }
        self.truncated |= truncated;
        self.rows.extend(rows);
    }
}

fn display_filename(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("upload")
        .to_string()
}

fn export_filename(original: &str) -> String {
    let stem = match original.rfind('.') {
        Some(idx) if idx > 0 => &original[..idx],
        _ => original,
    };
    format!("{}-categorized.csv", stem)
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    limiter: RateLimiter,
    validator: FileValidator,
    gate: VerificationGate,
    sessions: Arc<dyn SessionStore>,
    mailer: Arc<dyn CodeMailer>,
    categorizer: Arc<dyn Categorizer>,
    extractor: Arc<dyn DocumentExtractor>,
    limits: LimitsConfig,
    retention: Duration,
    allow_export_bypass: bool,
    ban_on_archive_abuse: bool,
    upgrade_url: String,
    store_timeout: StdDuration,
}

impl UploadOrchestrator {
    pub fn new(
        config: &IntakeConfig,
        limiter: RateLimiter,
        sessions: Arc<dyn SessionStore>,
        codes: Arc<dyn CodeStore>,
        mailer: Arc<dyn CodeMailer>,
    ) -> Self {
        let store_timeout = StdDuration::from_millis(config.rate_limit.store_timeout_ms);
        Self {
            gate: VerificationGate::new(
                codes,
                limiter.clone(),
                &config.verification,
                store_timeout,
            ),
            limiter,
            validator: FileValidator::new(config.limits.clone()),
            sessions,
            mailer,
            categorizer: Arc::new(PassthroughCategorizer),
            extractor: Arc::new(NoopExtractor),
            limits: config.limits.clone(),
            retention: Duration::hours(config.retention.retention_hours),
            allow_export_bypass: config.verification.allow_export_bypass,
            ban_on_archive_abuse: config.rate_limit.ban_on_archive_abuse,
            upgrade_url: config.verification.upgrade_url.clone(),
            store_timeout,
        }
    }

    pub fn with_categorizer(mut self, categorizer: Arc<dyn Categorizer>) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn gate(&self) -> &VerificationGate {
        &self.gate
    }

    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        self.sessions.clone()
    }

    /// Largest body any upload can legitimately have
    pub fn max_upload_bytes(&self) -> usize {
        self.validator.max_upload_bytes()
    }

    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome, AppError> {
        self.upload_at(request, Utc::now()).await
    }

    #[tracing::instrument(
        skip(self, request, now),
        fields(ip = %request.client_ip, size_bytes = request.data.len())
    )]
    pub async fn upload_at(
        &self,
        request: UploadRequest,
        now: DateTime<Utc>,
    ) -> Result<UploadOutcome, AppError> {
        let email = match request.email.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(normalize_email(raw)?),
            _ => None,
        };
        let email_hash = email.as_deref().map(hash_email);

        let admission = self
            .limiter
            .check_admission(
                AdmissionRequest {
                    ip: &request.client_ip,
                    email_hash: email_hash.as_deref(),
                },
                now,
            )
            .await
            .ensure_allowed(now)?;

        if request.captcha_token.is_none() {
            tracing::debug!("Upload without captcha token");
        }

        let filename = display_filename(&request.filename);
        let validated = match self.validator.check(&request.data, &filename) {
            Ok(validated) => validated,
            Err(err) => {
                tracing::info!(code = err.code(), error = %err, "Upload rejected by validator");
                if matches!(err, ValidationError::ZipSafety(_)) && self.ban_on_archive_abuse {
                    let reason = format!("archive abuse: {}", err);
                    if let Err(ban_err) =
                        self.limiter.ban_ip(&request.client_ip, &reason, now).await
                    {
                        tracing::error!(error = %ban_err, "Failed to record archive abuse ban");
                    }
                }
                return Err(err.into());
            }
        };

        let collected = self.collect_rows(&validated, &request.data).await?;
        let truncated = collected.truncated;
        let rows = self.categorize(collected.rows).await;

        let session = UploadSession {
            id: Uuid::new_v4(),
            filename,
            size_bytes: validated.size_bytes as u64,
            detected_mime: validated.mime().to_string(),
            extension: validated.extension.clone(),
            row_count: rows.len(),
            truncated,
            consent_training: request.consent_training,
            email,
            attribution: request.attribution,
            rows,
            created_at: now,
            expires_at: now + self.retention,
        };

        with_store_timeout(self.store_timeout, self.sessions.insert(session.clone())).await?;

        tracing::info!(
            upload_id = %session.id,
            detected = %validated.detected,
            row_count = session.row_count,
            truncated = session.truncated,
            degraded = admission.degraded,
            "Upload stored"
        );

        Ok(UploadOutcome {
            session,
            remaining: admission.remaining,
        })
    }

    async fn collect_rows(
        &self,
        validated: &ValidatedFile,
        data: &[u8],
    ) -> Result<CollectedRows, AppError> {
        let max_rows = self.limits.max_rows;
        let mut collected = CollectedRows::default();

        if validated.detected == DetectedType::Zip {
            for entry in &validated.entries {
                let (rows, truncated) = self
                    .rows_for(entry.detected, &entry.data, collected.budget(max_rows))
                    .await?;
                collected.extend_capped(rows, truncated, max_rows);
                tracing::debug!(entry = %entry.name, rows = collected.rows.len(), "Archive entry parsed");
            }
        } else {
            let (rows, truncated) = self.rows_for(validated.detected, data, max_rows).await?;
            collected.extend_capped(rows, truncated, max_rows);
        }

        Ok(collected)
    }

    async fn rows_for(
        &self,
        detected: DetectedType,
        data: &[u8],
        budget: usize,
    ) -> Result<(Vec<Transaction>, bool), AppError> {
        if has_local_parser(detected) {
            let parsed = parse_statement(detected, data, budget)?;
            return Ok((parsed.rows, parsed.truncated));
        }
        let rows = self.extractor.extract(detected, data, budget).await?;
        Ok((rows, false))
    }

    /// Categorization is best effort: on failure the rows stay uncategorized.
    async fn categorize(&self, rows: Vec<Transaction>) -> Vec<Transaction> {
        if rows.is_empty() {
            return rows;
        }
        match self.categorizer.categorize(rows.clone()).await {
            Ok(mut categorized) => {
                categorized.truncate(self.limits.max_rows);
                categorized
            }
            Err(e) => {
                tracing::warn!(error = %e, "Categorization failed, keeping rows uncategorized");
                rows
            }
        }
    }

    /// Purge an upload now. Deleting an unknown or already-deleted upload succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let removed = with_store_timeout(self.store_timeout, self.sessions.remove(id)).await?;
        tracing::info!(upload_id = %id, removed, "Upload deleted");
        Ok(())
    }

    pub async fn send_code(
        &self,
        client_ip: &str,
        email: &str,
    ) -> Result<SendCodeResponse, AppError> {
        self.send_code_at(client_ip, email, Utc::now()).await
    }

    #[tracing::instrument(skip(self, email, now))]
    pub async fn send_code_at(
        &self,
        client_ip: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<SendCodeResponse, AppError> {
        let email = normalize_email(email)?;
        let email_hash = hash_email(&email);
        self.admit(client_ip, Some(&email_hash), now).await?;

        let challenge = self.gate.issue(&email, now).await?;
        self.mailer
            .send_code(&challenge.email, &challenge.code, challenge.expires_at)
            .await?;

        Ok(SendCodeResponse {
            success: true,
            expires_at: challenge.expires_at,
        })
    }

    pub async fn verify_code(
        &self,
        client_ip: &str,
        email: &str,
        code: &str,
    ) -> Result<VerifyCodeResponse, AppError> {
        self.verify_code_at(client_ip, email, code, Utc::now()).await
    }

    #[tracing::instrument(skip(self, email, code, now))]
    pub async fn verify_code_at(
        &self,
        client_ip: &str,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyCodeResponse, AppError> {
        let email = normalize_email(email)?;
        // Guessing is bounded by the gate's verify-attempt bucket, so a mistyped
        // code does not spend the daily email allowance.
        self.admit(client_ip, None, now).await?;

        let issued = self.gate.verify(&email, code, now).await?;
        Ok(VerifyCodeResponse {
            success: true,
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    async fn admit(
        &self,
        client_ip: &str,
        email_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.limiter
            .check_admission(
                AdmissionRequest {
                    ip: client_ip,
                    email_hash,
                },
                now,
            )
            .await
            .ensure_allowed(now)?;
        Ok(())
    }

    pub async fn export(&self, id: Uuid, auth: ExportAuth<'_>) -> Result<CsvExport, AppError> {
        self.export_at(id, auth, Utc::now()).await
    }

    /// Render a session's rows as sanitized CSV once the caller is authorized.
    #[tracing::instrument(skip(self, auth, now))]
    pub async fn export_at(
        &self,
        id: Uuid,
        auth: ExportAuth<'_>,
        now: DateTime<Utc>,
    ) -> Result<CsvExport, AppError> {
        let session = with_store_timeout(self.store_timeout, self.sessions.get(id, now))
            .await?
            .ok_or_else(|| AppError::NotFound("Upload not found or expired".to_string()))?;

        match auth {
            ExportAuth::Bypass if self.allow_export_bypass => {
                tracing::info!(upload_id = %id, "Export authorized by bypass");
            }
            ExportAuth::Bypass => {
                return Err(AppError::EmailNotVerified(
                    "Export bypass is not enabled".to_string(),
                ));
            }
            ExportAuth::Missing => {
                return Err(AppError::EmailNotVerified(
                    "Verify your email to export this upload".to_string(),
                ));
            }
            ExportAuth::Token(token) => {
                self.gate.check_token(token, session.email.as_deref(), now)?;
            }
        }

        let body = self.render_session(&session);
        tracing::info!(upload_id = %id, rows = session.row_count, "Export rendered");

        Ok(CsvExport {
            filename: export_filename(&session.filename),
            body,
        })
    }

    fn render_session(&self, session: &UploadSession) -> String {
        let mut table: Vec<Vec<Option<String>>> = Vec::with_capacity(session.rows.len() + 2);
        table.push(EXPORT_HEADER.iter().map(|h| Some(h.to_string())).collect());
        table.extend(session.rows.iter().map(Transaction::to_row));
        if session.truncated {
            table.push(vec![Some(format!(
                "Preview limited to the first {} rows. Upgrade for the full export: {}",
                self.limits.max_rows, self.upgrade_url
            ))]);
        }
        render(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::MemorySessionStore;
    use crate::verification::MemoryCodeStore;
    use async_trait::async_trait;
    use ledgerlens_core::models::BanScope;
    use ledgerlens_infra::MemoryRateStore;
    use std::io::Write;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingMailer {
        async fn last_code(&self) -> Option<String> {
            self.sent.lock().await.last().map(|(_, code)| code.clone())
        }
    }

    #[async_trait]
    impl CodeMailer for RecordingMailer {
        async fn send_code(
            &self,
            email: &str,
            code: &str,
            _expires_at: DateTime<Utc>,
        ) -> Result<(), AppError> {
            self.sent
                .lock()
                .await
                .push((email.to_string(), code.to_string()));
            Ok(())
        }
    }

    struct FailingCategorizer;

    #[async_trait]
    impl Categorizer for FailingCategorizer {
        async fn categorize(&self, _rows: Vec<Transaction>) -> Result<Vec<Transaction>, AppError> {
            Err(AppError::Internal("model offline".to_string()))
        }
    }

    struct LabelCategorizer;

    #[async_trait]
    impl Categorizer for LabelCategorizer {
        async fn categorize(&self, rows: Vec<Transaction>) -> Result<Vec<Transaction>, AppError> {
            Ok(rows
                .into_iter()
                .map(|mut tx| {
                    tx.category = Some("Groceries".to_string());
                    tx
                })
                .collect())
        }
    }

    struct Harness {
        orchestrator: UploadOrchestrator,
        mailer: Arc<RecordingMailer>,
        sessions: Arc<MemorySessionStore>,
    }

    fn harness_with(config: IntakeConfig) -> Harness {
        let limiter =
            RateLimiter::from_config(Arc::new(MemoryRateStore::new()), &config.rate_limit);
        let sessions = Arc::new(MemorySessionStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let orchestrator = UploadOrchestrator::new(
            &config,
            limiter,
            sessions.clone(),
            Arc::new(MemoryCodeStore::new()),
            mailer.clone(),
        );
        Harness {
            orchestrator,
            mailer,
            sessions,
        }
    }

    fn harness() -> Harness {
        harness_with(IntakeConfig::default())
    }

    fn csv_with_rows(n: usize) -> Bytes {
        let mut text = String::from("Date,Description,Amount\n");
        for i in 0..n {
            text.push_str(&format!("2024-03-{:02},Purchase {},-{}.00\n", i % 28 + 1, i, i));
        }
        Bytes::from(text)
    }

    fn request(filename: &str, data: Bytes) -> UploadRequest {
        UploadRequest {
            client_ip: "203.0.113.7".to_string(),
            filename: filename.to_string(),
            data,
            email: None,
            consent_training: false,
            captcha_token: None,
            attribution: Attribution::default(),
        }
    }

    fn zip_of(entries: &[(&str, &[u8])]) -> Bytes {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        Bytes::from(writer.finish().unwrap().into_inner())
    }

    #[tokio::test]
    async fn test_upload_stores_session() {
        let h = harness();
        let now = Utc::now();
        let mut req = request("statements/march.csv", csv_with_rows(3));
        req.attribution.utm_source = Some("newsletter".to_string());

        let outcome = h.orchestrator.upload_at(req, now).await.unwrap();
        let session = outcome.session;
        assert_eq!(session.filename, "march.csv");
        assert_eq!(session.row_count, 3);
        assert!(!session.truncated);
        assert_eq!(session.detected_mime, "text/csv");
        assert_eq!(session.expires_at, now + Duration::hours(24));
        assert_eq!(session.attribution.utm_source.as_deref(), Some("newsletter"));
        assert_eq!(outcome.remaining, 19);
        assert!(h.sessions.get(session.id, now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_large_csv_is_capped_and_export_notes_cap() {
        let mut config = IntakeConfig::default();
        config.verification.allow_export_bypass = true;
        let h = harness_with(config);
        let now = Utc::now();

        let outcome = h
            .orchestrator
            .upload_at(request("big.csv", csv_with_rows(600)), now)
            .await
            .unwrap();
        assert_eq!(outcome.session.row_count, 500);
        assert!(outcome.session.truncated);

        let export = h
            .orchestrator
            .export_at(outcome.session.id, ExportAuth::Bypass, now)
            .await
            .unwrap();
        assert_eq!(export.filename, "big-categorized.csv");
        let lines: Vec<&str> = export.body.split('\n').collect();
        assert_eq!(lines[0], "Date,Description,Amount,Category");
        assert_eq!(lines.len(), 1 + 500 + 1);
        assert!(lines[501].contains("500 rows"));
    }

    #[tokio::test]
    async fn test_export_sanitizes_formula_cells() {
        let mut config = IntakeConfig::default();
        config.verification.allow_export_bypass = true;
        let h = harness_with(config);
        let now = Utc::now();
        let data = Bytes::from_static(
            b"Date,Description,Amount\n2024-01-01,=1+1,-1.00\n2024-01-02,\"Shop, Inc\",2.00\n",
        );

        let outcome = h
            .orchestrator
            .upload_at(request("jan.csv", data), now)
            .await
            .unwrap();
        let export = h
            .orchestrator
            .export_at(outcome.session.id, ExportAuth::Bypass, now)
            .await
            .unwrap();

        let lines: Vec<&str> = export.body.split('\n').collect();
        assert_eq!(lines[1], "2024-01-01,'=1+1,'-1.00,");
        assert_eq!(lines[2], "2024-01-02,\"Shop, Inc\",2.00,");
    }

    #[tokio::test]
    async fn test_export_requires_verified_email() {
        let h = harness();
        let now = Utc::now();
        let mut req = request("march.csv", csv_with_rows(2));
        req.email = Some("Alice@Example.com".to_string());
        let id = h.orchestrator.upload_at(req, now).await.unwrap().session.id;

        let err = h
            .orchestrator
            .export_at(id, ExportAuth::Missing, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmailNotVerified(_)));

        let err = h
            .orchestrator
            .export_at(id, ExportAuth::Bypass, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmailNotVerified(_)));

        h.orchestrator
            .send_code_at("203.0.113.7", "alice@example.com", now)
            .await
            .unwrap();
        let code = h.mailer.last_code().await.unwrap();
        let verified = h
            .orchestrator
            .verify_code_at("203.0.113.7", "alice@example.com", &code, now)
            .await
            .unwrap();
        assert!(verified.success);

        let export = h
            .orchestrator
            .export_at(id, ExportAuth::Token(&verified.token), now)
            .await
            .unwrap();
        assert!(export.body.starts_with("Date,Description,Amount,Category\n"));
    }

    #[tokio::test]
    async fn test_token_for_other_email_is_rejected() {
        let h = harness();
        let now = Utc::now();
        let mut req = request("march.csv", csv_with_rows(2));
        req.email = Some("owner@example.com".to_string());
        let id = h.orchestrator.upload_at(req, now).await.unwrap().session.id;

        h.orchestrator
            .send_code_at("198.51.100.1", "someone@example.com", now)
            .await
            .unwrap();
        let code = h.mailer.last_code().await.unwrap();
        let token = h
            .orchestrator
            .verify_code_at("198.51.100.1", "someone@example.com", &code, now)
            .await
            .unwrap()
            .token;

        let err = h
            .orchestrator
            .export_at(id, ExportAuth::Token(&token), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmailNotVerified(_)));

        let err = h
            .orchestrator
            .export_at(id, ExportAuth::Token("forged"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }

    #[tokio::test]
    async fn test_mistyped_code_can_be_retried() {
        let h = harness();
        let now = Utc::now();
        let mut req = request("march.csv", csv_with_rows(2));
        req.email = Some("carol@example.com".to_string());
        h.orchestrator.upload_at(req, now).await.unwrap();

        h.orchestrator
            .send_code_at("203.0.113.7", "carol@example.com", now)
            .await
            .unwrap();
        let code = h.mailer.last_code().await.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = h
            .orchestrator
            .verify_code_at("203.0.113.7", "carol@example.com", wrong, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CodeInvalid));

        let later = now + Duration::seconds(30);
        let verified = h
            .orchestrator
            .verify_code_at("203.0.113.7", "carol@example.com", &code, later)
            .await
            .unwrap();
        assert!(verified.success);
    }

    #[tokio::test]
    async fn test_verify_guesses_stop_at_attempt_bucket() {
        let h = harness();
        let now = Utc::now();
        h.orchestrator
            .send_code_at("203.0.113.7", "dave@example.com", now)
            .await
            .unwrap();

        for _ in 0..5 {
            let err = h
                .orchestrator
                .verify_code_at("203.0.113.7", "dave@example.com", "abcdef", now)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::CodeInvalid));
        }

        let err = h
            .orchestrator
            .verify_code_at("203.0.113.7", "dave@example.com", "abcdef", now)
            .await
            .unwrap_err();
        match err {
            AppError::RateLimitExceeded { scope, .. } => assert_eq!(scope, "verify_attempt"),
            other => panic!("expected verify_attempt denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let h = harness();
        let now = Utc::now();
        let id = h
            .orchestrator
            .upload_at(request("march.csv", csv_with_rows(1)), now)
            .await
            .unwrap()
            .session
            .id;

        h.orchestrator.delete(id).await.unwrap();
        h.orchestrator.delete(id).await.unwrap();
        h.orchestrator.delete(Uuid::new_v4()).await.unwrap();

        let err = h
            .orchestrator
            .export_at(id, ExportAuth::Bypass, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_session_is_not_found() {
        let mut config = IntakeConfig::default();
        config.verification.allow_export_bypass = true;
        let h = harness_with(config);
        let now = Utc::now();
        let id = h
            .orchestrator
            .upload_at(request("march.csv", csv_with_rows(1)), now)
            .await
            .unwrap()
            .session
            .id;

        let err = h
            .orchestrator
            .export_at(id, ExportAuth::Bypass, now + Duration::hours(25))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ip_cap_denies_twenty_first_upload() {
        let h = harness();
        let now = Utc::now();
        for _ in 0..20 {
            h.orchestrator
                .upload_at(request("march.csv", csv_with_rows(1)), now)
                .await
                .unwrap();
        }
        let err = h
            .orchestrator
            .upload_at(request("march.csv", csv_with_rows(1)), now)
            .await
            .unwrap_err();
        match err {
            AppError::RateLimitExceeded {
                scope,
                retry_after_secs,
            } => {
                assert_eq!(scope, "ip");
                assert!(retry_after_secs > 0);
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let h = harness();
        let err = h
            .orchestrator
            .upload_at(request("statement.exe", csv_with_rows(1)), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn test_zip_entries_share_row_budget() {
        let mut config = IntakeConfig::default();
        config.limits.max_rows = 5;
        let h = harness_with(config);
        let first = csv_with_rows(3);
        let second = csv_with_rows(4);
        let data = zip_of(&[("jan.csv", &first[..]), ("feb.csv", &second[..])]);

        let session = h
            .orchestrator
            .upload_at(request("q1.zip", data), Utc::now())
            .await
            .unwrap()
            .session;
        assert_eq!(session.row_count, 5);
        assert!(session.truncated);
        assert_eq!(session.detected_mime, "application/zip");
    }

    #[tokio::test]
    async fn test_archive_traversal_bans_uploader() {
        let h = harness();
        let now = Utc::now();
        let data = zip_of(&[("../../etc/passwd", &b"root:x:0:0\n"[..])]);

        let err = h
            .orchestrator
            .upload_at(request("evil.zip", data), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ZipSafetyViolation(_)));

        let err = h
            .orchestrator
            .upload_at(request("march.csv", csv_with_rows(1)), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimitExceeded { ref scope, .. } if scope == "ban"));

        assert!(h
            .orchestrator
            .limiter()
            .unban(BanScope::Ip, "203.0.113.7")
            .await
            .unwrap());
        assert!(h
            .orchestrator
            .upload_at(request("march.csv", csv_with_rows(1)), now)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_categorizer_failure_keeps_rows() {
        let h = harness();
        let orchestrator = h
            .orchestrator
            .clone()
            .with_categorizer(Arc::new(FailingCategorizer));
        let session = orchestrator
            .upload_at(request("march.csv", csv_with_rows(4)), Utc::now())
            .await
            .unwrap()
            .session;
        assert_eq!(session.row_count, 4);
        assert!(session.rows.iter().all(|tx| tx.category.is_none()));
    }

    #[tokio::test]
    async fn test_categories_reach_export() {
        let mut config = IntakeConfig::default();
        config.verification.allow_export_bypass = true;
        let h = harness_with(config);
        let orchestrator = h
            .orchestrator
            .clone()
            .with_categorizer(Arc::new(LabelCategorizer));
        let now = Utc::now();
        let id = orchestrator
            .upload_at(request("march.csv", csv_with_rows(1)), now)
            .await
            .unwrap()
            .session
            .id;

        let export = orchestrator
            .export_at(id, ExportAuth::Bypass, now)
            .await
            .unwrap();
        assert!(export.body.ends_with(",Groceries"));
    }

    #[tokio::test]
    async fn test_invalid_upload_email() {
        let h = harness();
        let mut req = request("march.csv", csv_with_rows(1));
        req.email = Some("nope".to_string());
        let err = h.orchestrator.upload_at(req, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_filenames() {
        assert_eq!(display_filename("C:\\Users\\me\\march.csv"), "march.csv");
        assert_eq!(display_filename("/"), "upload");
        assert_eq!(export_filename("march.csv"), "march-categorized.csv");
        assert_eq!(export_filename(".hidden"), ".hidden-categorized.csv");
    }
}
