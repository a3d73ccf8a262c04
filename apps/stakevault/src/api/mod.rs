//! # stakevault HTTP API Module
//!
//! ## Endpoints
//!
//! - `GET /health`, `GET /status`, `GET /hash`
//! - `GET /rate`, `GET /rate/preview?amount=&direction=`
//! - `GET /pools`, `GET /pools/{id}`
//! - `GET /accounts/{id}/pending`, `GET /accounts/{id}/balance`
//! - `POST /initialize`
//! - `POST /admin/pool-weight`, `POST /admin/reward-receipt`, `POST /admin/unlock-policy`
//! - `POST /stake`, `POST /unlock`, `POST /withdraw`
//! - `POST /export`
//! - `POST /sim/fund`, `POST /sim/pools`, `POST /sim/advance-epoch`,
//!   `POST /sim/rewards`, `POST /sim/tick`
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `STAKEVAULT_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `STAKEVAULT_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `STAKEVAULT_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    AckResponse, AmountRequest, ApiError, BalanceResponse, EpochResponse, ErrorResponse,
    ExportResponse, FundRequest, FundResponse, HashResponse, HealthResponse, InitializeRequest,
    InitializeResponse, PendingResponse, PoolRequest, PoolResponse, PoolView, PoolWeightRequest,
    PoolWeightResponse, PoolsResponse, PreviewDirection, PreviewQuery, PreviewResponse,
    RateResponse, ReceiptResponse, RegisterPoolResponse, RewardReceiptRequest, RewardsRequest,
    RewardsResponse, StatusResponse, TickRequest, TickResponse, UnlockPolicyRequest,
    WithdrawRequest, status_for,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use stakevault_core::{Session, VaultError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request bodies are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
///
/// A single session behind an `RwLock`: mutating handlers hold the write
/// lock for the whole operation.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
}

impl AppState {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const LOCALHOST_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
];

/// Parse a comma-separated origin list, dropping entries that are not valid
/// header values.
fn parse_origins(list: &str) -> Vec<HeaderValue> {
    list.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = o, "CORS: ignoring invalid origin: {}", e);
                None
            }
        })
        .collect()
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// CORS from `STAKEVAULT_CORS_ORIGINS`: `*` allows every origin, a list
/// allows those origins, anything else falls back to localhost.
fn build_cors_layer() -> CorsLayer {
    let configured = std::env::var("STAKEVAULT_CORS_ORIGINS").ok();
    if configured.as_deref() == Some("*") {
        tracing::warn!("CORS: every origin allowed (STAKEVAULT_CORS_ORIGINS=*)");
        return CorsLayer::permissive();
    }

    let origins = configured.as_deref().map(parse_origins).unwrap_or_default();
    if origins.is_empty() {
        tracing::info!("CORS: localhost origins only");
        restricted_cors(
            LOCALHOST_ORIGINS
                .into_iter()
                .map(HeaderValue::from_static)
                .collect(),
        )
    } else {
        tracing::info!(count = origins.len(), "CORS: configured origins allowed");
        restricted_cors(origins)
    }
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/hash", get(handlers::hash_handler))
        .route("/rate", get(handlers::rate_handler))
        .route("/rate/preview", get(handlers::preview_handler))
        .route("/pools", get(handlers::pools_handler))
        .route("/pools/{id}", get(handlers::pool_handler))
        .route("/accounts/{id}/pending", get(handlers::pending_handler))
        .route("/accounts/{id}/balance", get(handlers::balance_handler))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(handlers::initialize_handler))
        .route("/admin/pool-weight", post(handlers::pool_weight_handler))
        .route("/admin/reward-receipt", post(handlers::reward_receipt_handler))
        .route("/admin/unlock-policy", post(handlers::unlock_policy_handler))
        .route("/export", post(handlers::export_handler))
}

fn participant_routes() -> Router<AppState> {
    Router::new()
        .route("/stake", post(handlers::stake_handler))
        .route("/unlock", post(handlers::unlock_handler))
        .route("/withdraw", post(handlers::withdraw_handler))
}

/// Controls for the simulated staking network.
fn sim_routes() -> Router<AppState> {
    Router::new()
        .route("/sim/fund", post(handlers::sim_fund_handler))
        .route("/sim/pools", post(handlers::sim_register_pool_handler))
        .route("/sim/advance-epoch", post(handlers::sim_advance_epoch_handler))
        .route("/sim/rewards", post(handlers::sim_rewards_handler))
        .route("/sim/tick", post(handlers::sim_tick_handler))
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): trace, CORS, body limit, rate limit,
/// authentication.
pub fn create_router(state: AppState) -> Router {
    let mut router = read_routes()
        .merge(admin_routes())
        .merge(participant_routes())
        .merge(sim_routes());

    if get_api_key_from_env().is_some() {
        tracing::info!("API key authentication enabled");
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    } else {
        tracing::warn!(
            "API key authentication DISABLED: any caller can reach admin and stake routes. \
             Set STAKEVAULT_API_KEY to require a bearer key."
        );
    }

    match get_rate_limit_from_env() {
        0 => tracing::info!("Rate limiting disabled"),
        rps => {
            tracing::info!(rps, "Rate limiting enabled");
            router = router.layer(axum_middleware::from_fn_with_state(
                create_rate_limiter(rps),
                middleware::rate_limit_middleware,
            ));
        }
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `session` on `addr` until the process is stopped.
pub async fn run_server(addr: &str, session: Session) -> Result<(), VaultError> {
    let router = create_router(AppState::new(session));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| VaultError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("stakevault HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| VaultError::IoError(format!("Server error: {}", e)))
}
