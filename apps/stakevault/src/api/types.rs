//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Every success body carries `success: true`. Failures are an
//! [`ErrorResponse`] with the engine's stable reason code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use stakevault_core::{
    AccountId, AssetMetadata, ExchangeRate, InitParams, PoolId, Session, UnlockPolicy,
    VaultError, WithdrawalEntry,
    primitives::{DEFAULT_DERIVATIVE_DECIMALS, MAX_PENDING_PAGE},
};

// =============================================================================
// ERRORS
// =============================================================================

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            error: error.into(),
        }
    }

    pub fn from_error(e: &VaultError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

/// Middleware rejections use the same envelope as handler errors.
pub(crate) fn reject(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(ErrorResponse::new(code, message))).into_response()
}

/// A [`VaultError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub VaultError);

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        Self(e)
    }
}

/// HTTP status for each error kind.
#[must_use]
pub fn status_for(e: &VaultError) -> StatusCode {
    match e {
        VaultError::Unauthorized => StatusCode::FORBIDDEN,
        VaultError::AlreadyInitialized | VaultError::NotInitialized | VaultError::NoOpUpdate => {
            StatusCode::CONFLICT
        }
        VaultError::InvalidAmount
        | VaultError::InvalidAddress(_)
        | VaultError::SerializationError(_) => StatusCode::BAD_REQUEST,
        VaultError::PoolNotRecognized(_) => StatusCode::NOT_FOUND,
        VaultError::NoPoolsConfigured
        | VaultError::DivisionByZero
        | VaultError::NoPendingWithdrawals
        | VaultError::InsufficientBalance { .. }
        | VaultError::ArithmeticOverflow => StatusCode::UNPROCESSABLE_ENTITY,
        VaultError::External(_) => StatusCode::BAD_GATEWAY,
        VaultError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), "Request failed: {}", self.0);
        } else {
            tracing::debug!(code = self.0.code(), "Request rejected: {}", self.0);
        }
        (status, Json(ErrorResponse::from_error(&self.0))).into_response()
    }
}

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Vault status. Vault fields are `None` before initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub initialized: bool,
    pub admin: Option<String>,
    pub custody: Option<String>,
    pub reward_receipt: Option<String>,
    pub unlock_policy: Option<UnlockPolicy>,
    pub derivative_asset: Option<String>,
    pub derivative_symbol: Option<String>,
    pub pool_count: usize,
    pub total_weight: u128,
    pub total_stake: u64,
    pub derivative_supply: Option<u64>,
    pub pending_entries: usize,
    pub now_seconds: u64,
    /// Store revision; `None` for in-memory sessions.
    pub revision: Option<u64>,
}

impl StatusResponse {
    pub fn from_session(session: &Session) -> Result<Self, VaultError> {
        let now_seconds = session.now_seconds();
        let revision = session.revision();

        let Ok(vault) = session.vault() else {
            return Ok(Self {
                success: true,
                initialized: false,
                admin: None,
                custody: None,
                reward_receipt: None,
                unlock_policy: None,
                derivative_asset: None,
                derivative_symbol: None,
                pool_count: 0,
                total_weight: 0,
                total_stake: 0,
                derivative_supply: None,
                pending_entries: 0,
                now_seconds,
                revision,
            });
        };

        let rate = session.exchange_rate()?;
        Ok(Self {
            success: true,
            initialized: true,
            admin: Some(vault.admin().to_string()),
            custody: Some(vault.custody_principal().to_string()),
            reward_receipt: Some(vault.reward_receipt().to_string()),
            unlock_policy: Some(vault.unlock_policy()),
            derivative_asset: Some(vault.derivative_asset().to_string()),
            derivative_symbol: Some(vault.derivative_metadata().symbol.clone()),
            pool_count: vault.registry().len(),
            total_weight: vault.total_weight()?.value(),
            total_stake: rate.total_stake,
            derivative_supply: rate.derivative_supply,
            pending_entries: vault.ledger().entry_count(),
            now_seconds,
            revision,
        })
    }
}

// =============================================================================
// RATE
// =============================================================================

/// Current exchange-rate inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateResponse {
    pub success: bool,
    pub total_stake: u64,
    pub derivative_supply: Option<u64>,
    /// Conversions run at 1:1.
    pub bootstrap: bool,
}

impl From<ExchangeRate> for RateResponse {
    fn from(rate: ExchangeRate) -> Self {
        Self {
            success: true,
            total_stake: rate.total_stake,
            derivative_supply: rate.derivative_supply,
            bootstrap: rate.is_bootstrap(),
        }
    }
}

/// `GET /rate/preview` query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewQuery {
    pub amount: u64,
    /// Preview base -> derivative (`stake`, default) or derivative -> base (`unlock`).
    #[serde(default)]
    pub direction: PreviewDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewDirection {
    #[default]
    Stake,
    Unlock,
}

/// Conversion preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub direction: PreviewDirection,
    pub amount: u64,
    pub result: u64,
}

// =============================================================================
// POOLS
// =============================================================================

/// One weighted pool and the network's view of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolView {
    pub id: String,
    pub weight: u128,
    pub epoch: u64,
    /// Aggregates over every principal staked at the pool.
    pub active: u64,
    pub pending_inactive: u64,
    pub inactive: u64,
}

impl PoolView {
    fn build(session: &Session, pool: &PoolId, weight: u128) -> Result<Self, VaultError> {
        let summary = session.pool_summary(pool)?;
        Ok(Self {
            id: pool.to_string(),
            weight,
            epoch: summary.epoch.value(),
            active: summary.stake.active,
            pending_inactive: summary.stake.pending_inactive,
            inactive: summary.stake.inactive,
        })
    }
}

/// Weighted pools in registry order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolsResponse {
    pub success: bool,
    pub total_weight: u128,
    pub pools: Vec<PoolView>,
}

impl PoolsResponse {
    pub fn from_session(session: &Session) -> Result<Self, VaultError> {
        let vault = session.vault()?;
        let pools = vault
            .registry()
            .pools()
            .map(|(pool, weight)| PoolView::build(session, pool, weight.value()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            success: true,
            total_weight: vault.total_weight()?.value(),
            pools,
        })
    }
}

/// A single pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolResponse {
    pub success: bool,
    pub pool: PoolView,
}

impl PoolResponse {
    /// Registered pools only; unknown ids are `PoolNotRecognized`.
    pub fn from_session(session: &Session, pool: &PoolId) -> Result<Self, VaultError> {
        let weight = session
            .vault()?
            .pool_weight(pool)
            .ok_or_else(|| VaultError::PoolNotRecognized(pool.clone()))?;
        Ok(Self {
            success: true,
            pool: PoolView::build(session, pool, weight.value())?,
        })
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Pending withdrawals of one account, in request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingResponse {
    pub success: bool,
    pub account: String,
    pub total: u64,
    pub count: usize,
    pub entries: Vec<WithdrawalEntry>,
    /// `entries` holds only the oldest page.
    pub truncated: bool,
}

impl PendingResponse {
    pub fn from_session(session: &Session, account: &AccountId) -> Result<Self, VaultError> {
        let vault = session.vault()?;
        let pending = vault.pending_withdrawals(account);
        Ok(Self {
            success: true,
            account: account.to_string(),
            total: vault.ledger().pending_total(account)?,
            count: pending.len(),
            entries: pending.iter().take(MAX_PENDING_PAGE).cloned().collect(),
            truncated: pending.len() > MAX_PENDING_PAGE,
        })
    }
}

/// Base and derivative balances of one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub success: bool,
    pub account: String,
    pub base: u64,
    /// `None` before the vault exists.
    pub derivative: Option<u64>,
}

impl BalanceResponse {
    #[must_use]
    pub fn from_session(session: &Session, account: &AccountId) -> Self {
        Self {
            success: true,
            account: account.to_string(),
            base: session.base_balance(account),
            derivative: session.derivative_balance(account).ok(),
        }
    }
}

// =============================================================================
// ADMIN REQUESTS
// =============================================================================

fn default_decimals() -> u8 {
    DEFAULT_DERIVATIVE_DECIMALS
}

/// `POST /initialize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub caller: String,
    pub admin: String,
    pub custody: String,
    pub reward_receipt: String,
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub unlock_policy: UnlockPolicy,
}

impl InitializeRequest {
    /// Validate every address before anything reaches the engine.
    pub fn to_params(&self) -> Result<(AccountId, InitParams), VaultError> {
        let caller = AccountId::parse(self.caller.as_str())?;
        let params = InitParams {
            admin: AccountId::parse(self.admin.as_str())?,
            custody: AccountId::parse(self.custody.as_str())?,
            reward_receipt: AccountId::parse(self.reward_receipt.as_str())?,
            metadata: AssetMetadata {
                name: self.name.clone(),
                symbol: self.symbol.clone(),
                decimals: self.decimals,
            },
            unlock_policy: self.unlock_policy,
        };
        Ok((caller, params))
    }
}

/// `POST /initialize` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub success: bool,
    pub derivative_asset: String,
}

/// `POST /admin/pool-weight`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolWeightRequest {
    pub caller: String,
    pub pool: String,
    pub weight: u128,
}

/// `POST /admin/pool-weight` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolWeightResponse {
    pub success: bool,
    pub pool: String,
    pub weight: u128,
    pub previous: Option<u128>,
}

/// `POST /admin/reward-receipt`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardReceiptRequest {
    pub caller: String,
    pub receipt: String,
}

/// `POST /admin/unlock-policy`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockPolicyRequest {
    pub caller: String,
    pub policy: UnlockPolicy,
}

/// Acknowledgement of an update with nothing else to report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub operation: String,
}

impl AckResponse {
    pub fn ok(operation: impl Into<String>) -> Self {
        Self {
            success: true,
            operation: operation.into(),
        }
    }
}

// =============================================================================
// PARTICIPANT REQUESTS
// =============================================================================

/// `POST /stake` and `POST /unlock`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountRequest {
    pub caller: String,
    pub amount: u64,
}

/// `POST /withdraw`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub caller: String,
}

/// A receipt from stake, unlock or withdraw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptResponse<T> {
    pub success: bool,
    pub receipt: T,
}

impl<T> ReceiptResponse<T> {
    pub fn ok(receipt: T) -> Self {
        Self {
            success: true,
            receipt,
        }
    }
}

// =============================================================================
// EXPORT / HASH
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: String, // Base64 encoded snapshot
    pub size: usize,
    pub fingerprint: String,
}

impl ExportResponse {
    pub fn new(data: &[u8], fingerprint: String) -> Self {
        Self {
            success: true,
            data: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, data),
            size: data.len(),
            fingerprint,
        }
    }
}

/// Snapshot fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    pub success: bool,
    pub algorithm: String,
    pub hash: String,
}

// =============================================================================
// SIMULATION
// =============================================================================

/// `POST /sim/fund`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRequest {
    pub account: String,
    pub amount: u64,
}

/// `POST /sim/fund` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundResponse {
    pub success: bool,
    pub account: String,
    pub balance: u64,
}

/// `POST /sim/pools` and `POST /sim/advance-epoch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRequest {
    pub pool: String,
}

/// `POST /sim/pools` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPoolResponse {
    pub success: bool,
    pub pool: String,
    /// `false` when the pool was already registered.
    pub created: bool,
}

/// `POST /sim/advance-epoch` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochResponse {
    pub success: bool,
    pub pool: String,
    pub epoch: u64,
}

/// `POST /sim/rewards`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsRequest {
    pub pool: String,
    pub amount: u64,
}

/// `POST /sim/rewards` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsResponse {
    pub success: bool,
    pub pool: String,
    pub credited: u64,
}

/// `POST /sim/tick`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickRequest {
    pub seconds: u64,
}

/// `POST /sim/tick` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickResponse {
    pub success: bool,
    pub now_seconds: u64,
}
