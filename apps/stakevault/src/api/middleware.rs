//! # Middleware Module
//!
//! Global request rate limiting.
//!
//! - `STAKEVAULT_RATE_LIMIT`: requests per second (default 100). `0` makes
//!   `create_router` skip the layer entirely; no limiter is built.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use super::types::reject;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

const DEFAULT_RPS: u32 = 100;

/// Shared, unkeyed rate limiter.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// A limiter allowing `requests_per_second`.
///
/// The router never asks for zero (that disables limiting before this is
/// called); a direct call with zero gets the default quota.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_RPS))
        .unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// `STAKEVAULT_RATE_LIMIT`, or 100 if unset or unparsable.
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("STAKEVAULT_RATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_RPS)
}

/// 429 `RATE_LIMITED` once the global quota is spent.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.check().is_err() {
        tracing::warn!(
            event = "rate_limited",
            path = %request.uri().path(),
            "Rate limit exceeded"
        );
        return reject(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "request quota exhausted, retry shortly",
        );
    }
    next.run(request).await
}

// =============================================================================
// TESTS
// =============================================================================
