use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use ledgerlens_core::models::{SuccessResponse, UploadResponse};
use ledgerlens_core::AppError;
use ledgerlens_services::{ExportAuth, UploadRequest};
use serde::Deserialize;
use uuid::Uuid;

use crate::constants::{EMAIL_TOKEN_HEADER, RATE_LIMIT_REMAINING_HEADER};
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::multipart::extract_upload_form;
use crate::utils::ClientIp;

fn parse_upload_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::InvalidInput(format!("Invalid upload id: {}", raw)))
}

/// `POST /api/v1/uploads`
pub async fn upload_statement(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let form = extract_upload_form(multipart).await?;

    let outcome = state
        .orchestrator
        .upload(UploadRequest {
            client_ip,
            filename: form.filename,
            data: form.data,
            email: form.email,
            consent_training: form.consent_training,
            captcha_token: form.captcha_token,
            attribution: form.attribution,
        })
        .await?;

    let mut response =
        (StatusCode::OK, Json(UploadResponse::from(&outcome.session))).into_response();
    response.headers_mut().insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(outcome.remaining),
    );
    Ok(response)
}

/// `DELETE /api/v1/uploads/{id}`
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, HttpAppError> {
    let id = parse_upload_id(&id)?;
    state.orchestrator.delete(id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub token: Option<String>,
    #[serde(default)]
    pub bypass: bool,
}

/// `GET /api/v1/uploads/{id}/export`
///
/// The token comes from `X-Email-Token`, falling back to the `token` query
/// parameter. `bypass=true` only works when bypass is enabled.
pub async fn export_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let id = parse_upload_id(&id)?;

    let header_token = headers
        .get(EMAIL_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let token = header_token.or(query.token.as_deref());

    let auth = match token {
        Some(token) => ExportAuth::Token(token),
        None if query.bypass => ExportAuth::Bypass,
        None => ExportAuth::Missing,
    };

    let export = state.orchestrator.export(id, auth).await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        export.filename.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    )
        .into_response())
}
