//! # Authentication Module
//!
//! Bearer API key for the stakevault HTTP API.
//!
//! - `STAKEVAULT_API_KEY`: if set, every request except `/health` must send
//!   `Authorization: Bearer <key>`

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use super::types::reject;

/// The configured API key, or `None` when authentication is off.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("STAKEVAULT_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Compare keys in constant time over the longer of the two lengths.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// API key authentication middleware.
///
/// `/health` stays open for load balancer checks. Both `Bearer <key>` and a
/// raw `<key>` are accepted.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = get_api_key_from_env() else {
        return next.run(request).await;
    };

    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header_value) = auth_header else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Authorization header"
        );
        return reject(
            StatusCode::UNAUTHORIZED,
            "AUTH_REQUIRED",
            "missing Authorization header",
        );
    };

    let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
    if keys_match(provided.as_bytes(), expected.as_bytes()) {
        next.run(request).await
    } else {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            "Authentication failed: invalid API key"
        );
        reject(StatusCode::UNAUTHORIZED, "AUTH_INVALID", "invalid API key")
    }
}

// =============================================================================
// TESTS
// =============================================================================
