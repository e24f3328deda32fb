use std::sync::Arc;

use axum::{extract::State, Json};
use ledgerlens_core::models::{
    SendCodeRequest, SendCodeResponse, VerifyCodeRequest, VerifyCodeResponse,
};
use ledgerlens_core::AppError;
use validator::Validate;

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::ClientIp;

/// `POST /api/v1/verification/code`
pub async fn send_code(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    ValidatedJson(request): ValidatedJson<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>, HttpAppError> {
    request.validate().map_err(AppError::from)?;
    let response = state
        .orchestrator
        .send_code(&client_ip, &request.email)
        .await?;
    Ok(Json(response))
}

/// `POST /api/v1/verification/verify`
pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    ValidatedJson(request): ValidatedJson<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, HttpAppError> {
    request.validate().map_err(AppError::from)?;
    let response = state
        .orchestrator
        .verify_code(&client_ip, &request.email, &request.code)
        .await?;
    Ok(Json(response))
}
