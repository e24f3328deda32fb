use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerlens_core::AppError;
use ledgerlens_services::CodeMailer;
use tokio::sync::Mutex;

/// Captures delivered codes so tests can complete verification
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    pub async fn last_code_for(&self, email: &str) -> Option<String> {
        let email = email.trim().to_lowercase();
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|(to, _)| *to == email)
            .map(|(_, code)| code.clone())
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
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
