//! # API Endpoint Handlers
//!
//! Reads take the session read lock; every mutating handler holds the write
//! lock for the whole operation, so operations never interleave.

use super::{
    AppState,
    types::{
        AckResponse, AmountRequest, ApiError, BalanceResponse, EpochResponse, ExportResponse,
        FundRequest, FundResponse, HashResponse, HealthResponse, InitializeRequest,
        InitializeResponse, PendingResponse, PoolRequest, PoolResponse, PoolWeightRequest,
        PoolWeightResponse, PoolsResponse, PreviewDirection, PreviewQuery, PreviewResponse,
        RateResponse, ReceiptResponse, RegisterPoolResponse, RewardReceiptRequest,
        RewardsRequest, RewardsResponse, StatusResponse, TickRequest, TickResponse,
        UnlockPolicyRequest, WithdrawRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use stakevault_core::{
    AccountId, PoolId, StakeReceipt, UnlockReceipt, Weight, WithdrawReceipt,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Vault status.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let session = state.session.read().await;
    Ok(Json(StatusResponse::from_session(&session)?))
}

// =============================================================================
// RATE
// =============================================================================

/// Current exchange-rate inputs.
pub async fn rate_handler(State(state): State<AppState>) -> ApiResult<RateResponse> {
    let session = state.session.read().await;
    Ok(Json(session.exchange_rate()?.into()))
}

/// Conversion preview at the current rate.
pub async fn preview_handler(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> ApiResult<PreviewResponse> {
    let session = state.session.read().await;
    let result = match query.direction {
        PreviewDirection::Stake => session.preview_stake(query.amount)?,
        PreviewDirection::Unlock => session.preview_unlock(query.amount)?,
    };
    Ok(Json(PreviewResponse {
        success: true,
        direction: query.direction,
        amount: query.amount,
        result,
    }))
}

// =============================================================================
// POOLS / ACCOUNTS
// =============================================================================

/// Weighted pools in registry order.
pub async fn pools_handler(State(state): State<AppState>) -> ApiResult<PoolsResponse> {
    let session = state.session.read().await;
    Ok(Json(PoolsResponse::from_session(&session)?))
}

/// One weighted pool.
pub async fn pool_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PoolResponse> {
    let pool = PoolId::parse(id)?;
    let session = state.session.read().await;
    Ok(Json(PoolResponse::from_session(&session, &pool)?))
}

/// Pending withdrawals of an account.
pub async fn pending_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PendingResponse> {
    let account = AccountId::parse(id)?;
    let session = state.session.read().await;
    Ok(Json(PendingResponse::from_session(&session, &account)?))
}

/// Balances of an account.
pub async fn balance_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<BalanceResponse> {
    let account = AccountId::parse(id)?;
    let session = state.session.read().await;
    Ok(Json(BalanceResponse::from_session(&session, &account)))
}

// =============================================================================
// ADMIN
// =============================================================================

/// Create the vault.
pub async fn initialize_handler(
    State(state): State<AppState>,
    Json(request): Json<InitializeRequest>,
) -> ApiResult<InitializeResponse> {
    let (caller, params) = request.to_params()?;
    let mut session = state.session.write().await;
    session.initialize(&caller, params)?;
    let asset = session.vault()?.derivative_asset().to_string();

    tracing::info!(event = "initialize", caller = %caller, asset = %asset, "Vault initialized");
    Ok(Json(InitializeResponse {
        success: true,
        derivative_asset: asset,
    }))
}

/// Upsert a pool weight.
pub async fn pool_weight_handler(
    State(state): State<AppState>,
    Json(request): Json<PoolWeightRequest>,
) -> ApiResult<PoolWeightResponse> {
    let caller = AccountId::parse(request.caller)?;
    let pool = PoolId::parse(request.pool)?;
    let mut session = state.session.write().await;
    let previous = session.set_pool_weight(&caller, pool.clone(), Weight::new(request.weight))?;

    tracing::info!(
        event = "set_pool_weight",
        pool = %pool,
        weight = request.weight,
        previous = previous.map(Weight::value),
        "Pool weight updated"
    );
    Ok(Json(PoolWeightResponse {
        success: true,
        pool: pool.to_string(),
        weight: request.weight,
        previous: previous.map(Weight::value),
    }))
}

/// Replace the reward receipt.
pub async fn reward_receipt_handler(
    State(state): State<AppState>,
    Json(request): Json<RewardReceiptRequest>,
) -> ApiResult<AckResponse> {
    let caller = AccountId::parse(request.caller)?;
    let receipt = AccountId::parse(request.receipt)?;
    let mut session = state.session.write().await;
    session.set_reward_receipt(&caller, receipt.clone())?;

    tracing::info!(event = "set_reward_receipt", receipt = %receipt, "Reward receipt updated");
    Ok(Json(AckResponse::ok("set_reward_receipt")))
}

/// Change the unlock pool policy.
pub async fn unlock_policy_handler(
    State(state): State<AppState>,
    Json(request): Json<UnlockPolicyRequest>,
) -> ApiResult<AckResponse> {
    let caller = AccountId::parse(request.caller)?;
    let mut session = state.session.write().await;
    session.set_unlock_policy(&caller, request.policy)?;

    tracing::info!(event = "set_unlock_policy", policy = ?request.policy, "Unlock policy updated");
    Ok(Json(AckResponse::ok("set_unlock_policy")))
}

// =============================================================================
// STAKE / UNLOCK / WITHDRAW
// =============================================================================

/// Deposit and mint.
pub async fn stake_handler(
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> ApiResult<ReceiptResponse<StakeReceipt>> {
    let caller = AccountId::parse(request.caller)?;
    let mut session = state.session.write().await;
    let receipt = session.stake(&caller, request.amount)?;

    tracing::info!(
        event = "stake",
        caller = %caller,
        pool = %receipt.pool,
        base = receipt.base_amount,
        derivative = receipt.derivative_amount,
        "Stake accepted"
    );
    Ok(Json(ReceiptResponse::ok(receipt)))
}

/// Burn and queue a withdrawal.
pub async fn unlock_handler(
    State(state): State<AppState>,
    Json(request): Json<AmountRequest>,
) -> ApiResult<ReceiptResponse<UnlockReceipt>> {
    let caller = AccountId::parse(request.caller)?;
    let mut session = state.session.write().await;
    let receipt = session.unlock(&caller, request.amount)?;

    tracing::info!(
        event = "unlock",
        caller = %caller,
        pool = %receipt.entry.pool,
        base = receipt.entry.amount,
        derivative = receipt.derivative_amount,
        unlock_epoch = receipt.entry.unlock_epoch.value(),
        "Unlock queued"
    );
    Ok(Json(ReceiptResponse::ok(receipt)))
}

/// Release claimable withdrawals.
pub async fn withdraw_handler(
    State(state): State<AppState>,
    Json(request): Json<WithdrawRequest>,
) -> ApiResult<ReceiptResponse<WithdrawReceipt>> {
    let caller = AccountId::parse(request.caller)?;
    let mut session = state.session.write().await;
    let receipt = session.withdraw(&caller)?;

    tracing::info!(
        event = "withdraw",
        caller = %caller,
        released = receipt.released.len(),
        total = receipt.total_released,
        remaining = receipt.remaining,
        "Withdraw processed"
    );
    Ok(Json(ReceiptResponse::ok(receipt)))
}

// =============================================================================
// EXPORT / HASH
// =============================================================================

/// Export the encoded snapshot.
pub async fn export_handler(State(state): State<AppState>) -> ApiResult<ExportResponse> {
    let session = state.session.read().await;
    let data = session.export_bytes()?;
    let fingerprint = session.fingerprint()?;
    Ok(Json(ExportResponse::new(&data, fingerprint)))
}

/// BLAKE3 fingerprint of the snapshot.
pub async fn hash_handler(State(state): State<AppState>) -> ApiResult<HashResponse> {
    let session = state.session.read().await;
    Ok(Json(HashResponse {
        success: true,
        algorithm: "blake3".to_string(),
        hash: session.fingerprint()?,
    }))
}

// =============================================================================
// SIMULATION
// =============================================================================

pub async fn sim_fund_handler(
    State(state): State<AppState>,
    Json(request): Json<FundRequest>,
) -> ApiResult<FundResponse> {
    let account = AccountId::parse(request.account)?;
    let mut session = state.session.write().await;
    let balance = session.fund(&account, request.amount)?;

    tracing::info!(event = "sim_fund", account = %account, amount = request.amount);
    Ok(Json(FundResponse {
        success: true,
        account: account.to_string(),
        balance,
    }))
}

pub async fn sim_register_pool_handler(
    State(state): State<AppState>,
    Json(request): Json<PoolRequest>,
) -> ApiResult<RegisterPoolResponse> {
    let pool = PoolId::parse(request.pool)?;
    let mut session = state.session.write().await;
    let created = session.register_pool(pool.clone())?;

    tracing::info!(event = "sim_register_pool", pool = %pool, created);
    Ok(Json(RegisterPoolResponse {
        success: true,
        pool: pool.to_string(),
        created,
    }))
}

pub async fn sim_advance_epoch_handler(
    State(state): State<AppState>,
    Json(request): Json<PoolRequest>,
) -> ApiResult<EpochResponse> {
    let pool = PoolId::parse(request.pool)?;
    let mut session = state.session.write().await;
    let epoch = session.advance_epoch(&pool)?;

    tracing::info!(event = "sim_advance_epoch", pool = %pool, epoch = epoch.value());
    Ok(Json(EpochResponse {
        success: true,
        pool: pool.to_string(),
        epoch: epoch.value(),
    }))
}

pub async fn sim_rewards_handler(
    State(state): State<AppState>,
    Json(request): Json<RewardsRequest>,
) -> ApiResult<RewardsResponse> {
    let pool = PoolId::parse(request.pool)?;
    let mut session = state.session.write().await;
    let credited = session.distribute_rewards(&pool, request.amount)?;

    tracing::info!(event = "sim_rewards", pool = %pool, credited);
    Ok(Json(RewardsResponse {
        success: true,
        pool: pool.to_string(),
        credited,
    }))
}

pub async fn sim_tick_handler(
    State(state): State<AppState>,
    Json(request): Json<TickRequest>,
) -> ApiResult<TickResponse> {
    let mut session = state.session.write().await;
    let now_seconds = session.tick(request.seconds)?;
    Ok(Json(TickResponse {
        success: true,
        now_seconds,
    }))
}
