//! Upload form parsing

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::Bytes;
use ledgerlens_core::models::Attribution;
use ledgerlens_core::AppError;

/// Fields of a `multipart/form-data` upload
#[derive(Debug, Default)]
pub struct UploadForm {
    pub data: Bytes,
    pub filename: String,
    pub email: Option<String>,
    pub consent_training: bool,
    pub captcha_token: Option<String>,
    pub attribution: Attribution,
}

fn multipart_error(e: MultipartError, what: &str) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::FileTooLarge("Upload exceeds the maximum request size".to_string());
    }
    AppError::InvalidInput(format!("Failed to read {}: {}", what, e))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Read the form. Exactly one field named `file` is required; unknown fields are ignored.
pub async fn extract_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    let mut file: Option<(Bytes, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "multipart"))?
    {
        let name = field.name().map(|s| s.to_string()).unwrap_or_default();

        if name == "file" {
            if file.is_some() {
                return Err(AppError::InvalidInput(
                    "Multiple file fields are not allowed; send exactly one field named 'file'"
                        .to_string(),
                ));
            }
            let filename = field
                .file_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e, "file data"))?;
            file = Some((data, filename));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| multipart_error(e, "form field"))?;
        match name.as_str() {
            "email" => form.email = non_empty(value),
            "consent_training" => form.consent_training = parse_flag(&value),
            "captcha_token" => form.captcha_token = non_empty(value),
            "utm_source" => form.attribution.utm_source = non_empty(value),
            "utm_medium" => form.attribution.utm_medium = non_empty(value),
            "utm_campaign" => form.attribution.utm_campaign = non_empty(value),
            _ => tracing::debug!(field = %name, "Ignoring unknown form field"),
        }
    }

    let (data, filename) =
        file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    form.data = data;
    form.filename = filename;
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" ON "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_blank_values_are_absent() {
        assert_eq!(non_empty("  ".to_string()), None);
        assert_eq!(non_empty(" spring ".to_string()), Some("spring".to_string()));
    }
}
