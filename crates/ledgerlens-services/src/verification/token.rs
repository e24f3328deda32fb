//! Signed email tokens.
//!
//! Payload: expires_at (i64 BE, unix seconds) || verified_at (i64 BE) || email bytes.
//! Token = base64url(payload || HMAC-SHA256(secret, payload)).

use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use ledgerlens_core::models::EmailToken;
use ledgerlens_core::AppError;

const HEADER_LEN: usize = 8 + 8; // expires_at + verified_at
const MAC_LEN: usize = 32; // SHA256

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid token secret: {}", e)))
    }

    pub fn sign(&self, token: &EmailToken) -> Result<String, AppError> {
        let mut payload = Vec::with_capacity(HEADER_LEN + token.email.len());
        payload.extend_from_slice(&token.expires_at.timestamp().to_be_bytes());
        payload.extend_from_slice(&token.verified_at.timestamp().to_be_bytes());
        payload.extend_from_slice(token.email.as_bytes());

        let mut mac = self.mac()?;
        mac.update(&payload);
        payload.extend_from_slice(&mac.finalize().into_bytes());

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload))
    }

    /// Check format and signature, then expiry.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<EmailToken, AppError> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AppError::TokenInvalid)?;
        if decoded.len() <= HEADER_LEN + MAC_LEN {
            return Err(AppError::TokenInvalid);
        }

        let (payload, tag) = decoded.split_at(decoded.len() - MAC_LEN);
        let mut mac = self.mac()?;
        mac.update(payload);
        mac.verify_slice(tag).map_err(|_| AppError::TokenInvalid)?;

        let expires_at = read_timestamp(&payload[0..8])?;
        let verified_at = read_timestamp(&payload[8..16])?;
        let email = std::str::from_utf8(&payload[HEADER_LEN..])
            .map_err(|_| AppError::TokenInvalid)?
            .to_string();

        if now >= expires_at {
            return Err(AppError::TokenExpired);
        }

        Ok(EmailToken {
            email,
            verified_at,
            expires_at,
        })
    }
}

fn read_timestamp(bytes: &[u8]) -> Result<DateTime<Utc>, AppError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| AppError::TokenInvalid)?;
    Utc.timestamp_opt(i64::from_be_bytes(raw), 0)
        .single()
        .ok_or(AppError::TokenInvalid)
}
