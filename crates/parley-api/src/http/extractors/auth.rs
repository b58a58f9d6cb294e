//! Caller identity extractor.
//!
//! Reads an API key from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! Keys are SHA-256 hashed and looked up in the `api_keys` table. A request
//! without a key carries no identity; the services decide whether that is
//! acceptable. A key that is present but unknown is rejected here.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use parley_types::chat::UserId;

use crate::http::error::AppError;
use crate::state::AppState;

/// The principal making the request, if any.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<UserId>);

impl Caller {
    pub fn user(&self) -> Option<&UserId> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(api_key) = extract_api_key(&parts.headers)? else {
            return Ok(Caller(None));
        };

        let user = state
            .api_keys
            .authenticate(&api_key)
            .await
            .map_err(|e| AppError::Internal(format!("Database error: {e}")))?;

        match user {
            Some(user) => Ok(Caller(Some(user))),
            None => Err(AppError::Unauthorized(
                "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
            )),
        }
    }
}

/// The API key from request headers, if one was sent.
fn extract_api_key(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    if let Some(auth) = headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(non_empty(key));
        }
    }

    if let Some(key) = headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(non_empty(key_str));
    }

    Ok(None)
}

fn non_empty(key: &str) -> Option<String> {
    let key = key.trim();
    (!key.is_empty()).then(|| key.to_string())
}
