//! Integration tests for the stakevault HTTP API.
//!
//! Uses axum-test to exercise the router without binding a socket.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in auth tests - tests are serialized
// intentionally to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::HeaderValue;
use axum_test::{TestResponse, TestServer};
use serde_json::json;
use stakevault::api::{
    AckResponse, AppState, BalanceResponse, EpochResponse, ErrorResponse, ExportResponse,
    FundResponse, HashResponse, HealthResponse, InitializeResponse, PendingResponse,
    PoolResponse, PoolWeightResponse, PoolsResponse, PreviewResponse, RateResponse,
    ReceiptResponse, RegisterPoolResponse, RewardsResponse, StatusResponse, TickResponse,
    create_router,
};
use stakevault_core::{
    AccountId, AssetMetadata, InitParams, PoolId, Session, SimulatedNetwork, StakeReceipt,
    UnlockPolicy, UnlockReceipt, Weight, WithdrawReceipt,
};
use std::sync::Mutex;

/// Mutex to serialize tests since they read or modify env vars.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

const CLOCK_START: u64 = 1_000;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and ensures cleanup on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("STAKEVAULT_API_KEY") };
    }
}

fn deployer() -> AccountId {
    AccountId::new("0xdeployer")
}

fn fresh_session() -> Session {
    Session::new(deployer(), SimulatedNetwork::with_manual_clock(CLOCK_START))
}

/// A vault with one pool `0xpool-a` at weight 1 and `0xalice` funded with 10_000.
fn ready_session() -> Session {
    let mut session = fresh_session();
    let pool = PoolId::new("0xpool-a");
    session.register_pool(pool.clone()).unwrap();
    session.fund(&AccountId::new("0xalice"), 10_000).unwrap();
    session
        .initialize(
            &deployer(),
            InitParams {
                admin: AccountId::new("0xadmin"),
                custody: AccountId::new("0xcustody"),
                reward_receipt: AccountId::new("0xtreasury"),
                metadata: AssetMetadata {
                    name: "Staked Token".to_string(),
                    symbol: "stTKN".to_string(),
                    decimals: 8,
                },
                unlock_policy: UnlockPolicy::Weighted,
            },
        )
        .unwrap();
    session
        .set_pool_weight(&AccountId::new("0xadmin"), pool, Weight::new(1))
        .unwrap();
    session
}

fn server_for(session: Session) -> (TestServer, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("STAKEVAULT_API_KEY") };
    let router = create_router(AppState::new(session));
    (
        TestServer::new(router).unwrap(),
        TestGuard { _guard: guard },
    )
}

fn create_test_server() -> (TestServer, TestGuard) {
    server_for(fresh_session())
}

fn create_ready_test_server() -> (TestServer, TestGuard) {
    server_for(ready_session())
}

fn assert_error(response: &TestResponse, status: u16, code: &str) {
    assert_eq!(response.status_code().as_u16(), status);
    let error: ErrorResponse = response.json();
    assert!(!error.success);
    assert_eq!(error.code, code);
    assert!(!error.error.is_empty());
}

async fn stake(server: &TestServer, caller: &str, amount: u64) -> TestResponse {
    server
        .post("/stake")
        .json(&json!({ "caller": caller, "amount": amount }))
        .await
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_before_initialize() {
    let (server, _guard) = create_test_server();

    let response = server.get("/status").await;

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert!(status.success);
    assert!(!status.initialized);
    assert!(status.admin.is_none());
    assert_eq!(status.now_seconds, CLOCK_START);
    assert_eq!(status.revision, None);
}

#[tokio::test]
async fn test_status_after_initialize() {
    let (server, _guard) = create_ready_test_server();

    let status: StatusResponse = server.get("/status").await.json();

    assert!(status.initialized);
    assert_eq!(status.admin.as_deref(), Some("0xadmin"));
    assert_eq!(status.custody.as_deref(), Some("0xcustody"));
    assert_eq!(status.derivative_symbol.as_deref(), Some("stTKN"));
    assert_eq!(status.unlock_policy, Some(UnlockPolicy::Weighted));
    assert_eq!(status.pool_count, 1);
    assert_eq!(status.total_weight, 1);
    assert_eq!(status.total_stake, 0);
    assert_eq!(status.derivative_supply, None);
}

// =============================================================================
// INITIALIZE
// =============================================================================

fn init_body(caller: &str) -> serde_json::Value {
    json!({
        "caller": caller,
        "admin": "0xadmin",
        "custody": "0xcustody",
        "reward_receipt": "0xtreasury",
        "name": "Staked Token",
        "symbol": "stTKN"
    })
}

#[tokio::test]
async fn test_initialize_by_deployer() {
    let (server, _guard) = create_test_server();

    let response = server.post("/initialize").json(&init_body("0xdeployer")).await;

    response.assert_status_ok();
    let init: InitializeResponse = response.json();
    assert!(init.success);
    assert!(init.derivative_asset.starts_with("stTKN"));

    let status: StatusResponse = server.get("/status").await.json();
    assert!(status.initialized);
    assert_eq!(status.unlock_policy, Some(UnlockPolicy::Weighted));
}

#[tokio::test]
async fn test_initialize_twice_conflicts() {
    let (server, _guard) = create_test_server();

    server
        .post("/initialize")
        .json(&init_body("0xdeployer"))
        .await
        .assert_status_ok();
    let response = server.post("/initialize").json(&init_body("0xdeployer")).await;

    assert_error(&response, 409, "ALREADY_INITIALIZED");
}

#[tokio::test]
async fn test_initialize_by_stranger_forbidden() {
    let (server, _guard) = create_test_server();

    let response = server.post("/initialize").json(&init_body("0xmallory")).await;

    assert_error(&response, 403, "UNAUTHORIZED");
    let status: StatusResponse = server.get("/status").await.json();
    assert!(!status.initialized);
}

#[tokio::test]
async fn test_initialize_rejects_bad_address() {
    let (server, _guard) = create_test_server();

    let mut body = init_body("0xdeployer");
    body["custody"] = json!("has whitespace");
    let response = server.post("/initialize").json(&body).await;

    assert_error(&response, 400, "INVALID_ADDRESS");
}

// =============================================================================
// ADMIN
// =============================================================================

#[tokio::test]
async fn test_pool_weight_upsert() {
    let (server, _guard) = create_ready_test_server();
    server
        .post("/sim/pools")
        .json(&json!({ "pool": "0xpool-b" }))
        .await
        .assert_status_ok();

    let response = server
        .post("/admin/pool-weight")
        .json(&json!({ "caller": "0xadmin", "pool": "0xpool-b", "weight": 3 }))
        .await;
    response.assert_status_ok();
    let added: PoolWeightResponse = response.json();
    assert_eq!(added.previous, None);

    let response = server
        .post("/admin/pool-weight")
        .json(&json!({ "caller": "0xadmin", "pool": "0xpool-a", "weight": 5 }))
        .await;
    let updated: PoolWeightResponse = response.json();
    assert_eq!(updated.previous, Some(1));

    let pools: PoolsResponse = server.get("/pools").await.json();
    assert_eq!(pools.total_weight, 8);
    let ids: Vec<_> = pools.pools.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["0xpool-a", "0xpool-b"]);
}

#[tokio::test]
async fn test_pool_weight_requires_admin() {
    let (server, _guard) = create_ready_test_server();

    let response = server
        .post("/admin/pool-weight")
        .json(&json!({ "caller": "0xalice", "pool": "0xpool-a", "weight": 9 }))
        .await;

    assert_error(&response, 403, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_pool_weight_unknown_pool() {
    let (server, _guard) = create_ready_test_server();

    let response = server
        .post("/admin/pool-weight")
        .json(&json!({ "caller": "0xadmin", "pool": "0xnowhere", "weight": 1 }))
        .await;

    assert_error(&response, 404, "POOL_NOT_RECOGNIZED");
    let pools: PoolsResponse = server.get("/pools").await.json();
    assert_eq!(pools.pools.len(), 1);
}

#[tokio::test]
async fn test_reward_receipt_update_and_noop() {
    let (server, _guard) = create_ready_test_server();

    let response = server
        .post("/admin/reward-receipt")
        .json(&json!({ "caller": "0xadmin", "receipt": "0xnew-treasury" }))
        .await;
    response.assert_status_ok();
    let ack: AckResponse = response.json();
    assert_eq!(ack.operation, "set_reward_receipt");

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.reward_receipt.as_deref(), Some("0xnew-treasury"));

    let response = server
        .post("/admin/reward-receipt")
        .json(&json!({ "caller": "0xadmin", "receipt": "0xnew-treasury" }))
        .await;
    assert_error(&response, 409, "NO_OP_UPDATE");
}

#[tokio::test]
async fn test_unlock_policy_update() {
    let (server, _guard) = create_ready_test_server();

    server
        .post("/admin/unlock-policy")
        .json(&json!({ "caller": "0xadmin", "policy": "largest_active" }))
        .await
        .assert_status_ok();

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.unlock_policy, Some(UnlockPolicy::LargestActive));

    let response = server
        .post("/admin/unlock-policy")
        .json(&json!({ "caller": "0xadmin", "policy": "largest_active" }))
        .await;
    assert_error(&response, 409, "NO_OP_UPDATE");
}

// =============================================================================
// STAKE / UNLOCK / WITHDRAW
// =============================================================================

#[tokio::test]
async fn test_stake_before_initialize() {
    let (server, _guard) = create_test_server();

    let response = stake(&server, "0xalice", 100).await;

    assert_error(&response, 409, "NOT_INITIALIZED");
}

#[tokio::test]
async fn test_first_stake_mints_one_to_one() {
    let (server, _guard) = create_ready_test_server();

    let response = stake(&server, "0xalice", 1_000).await;

    response.assert_status_ok();
    let result: ReceiptResponse<StakeReceipt> = response.json();
    assert!(result.success);
    assert_eq!(result.receipt.pool.as_str(), "0xpool-a");
    assert_eq!(result.receipt.derivative_amount, 1_000);
    assert_eq!(result.receipt.rate.derivative_supply, None);

    let balance: BalanceResponse = server.get("/accounts/0xalice/balance").await.json();
    assert_eq!(balance.base, 9_000);
    assert_eq!(balance.derivative, Some(1_000));

    let rate: RateResponse = server.get("/rate").await.json();
    assert_eq!(rate.total_stake, 1_000);
    assert_eq!(rate.derivative_supply, Some(1_000));
}

#[tokio::test]
async fn test_stake_zero_rejected() {
    let (server, _guard) = create_ready_test_server();

    let response = stake(&server, "0xalice", 0).await;

    assert_error(&response, 400, "INVALID_AMOUNT");
}

#[tokio::test]
async fn test_stake_beyond_balance_rejected() {
    let (server, _guard) = create_ready_test_server();

    let response = stake(&server, "0xalice", 10_001).await;

    assert_error(&response, 422, "INSUFFICIENT_BALANCE");
    let balance: BalanceResponse = server.get("/accounts/0xalice/balance").await.json();
    assert_eq!(balance.base, 10_000);
    assert_eq!(balance.derivative, Some(0));
}

#[tokio::test]
async fn test_stake_without_pools() {
    let (server, _guard) = create_test_server();
    server
        .post("/initialize")
        .json(&init_body("0xdeployer"))
        .await
        .assert_status_ok();
    server
        .post("/sim/fund")
        .json(&json!({ "account": "0xalice", "amount": 50 }))
        .await
        .assert_status_ok();

    let response = stake(&server, "0xalice", 10).await;

    assert_error(&response, 422, "NO_POOLS_CONFIGURED");
}

#[tokio::test]
async fn test_rewards_move_the_rate() {
    let (server, _guard) = create_ready_test_server();
    stake(&server, "0xalice", 1_000).await.assert_status_ok();

    let response = server
        .post("/sim/rewards")
        .json(&json!({ "pool": "0xpool-a", "amount": 100 }))
        .await;
    response.assert_status_ok();
    let rewards: RewardsResponse = response.json();
    assert_eq!(rewards.credited, 100);

    let preview: PreviewResponse = server
        .get("/rate/preview")
        .add_query_param("amount", 1_100)
        .await
        .json();
    assert_eq!(preview.result, 1_000);

    let preview: PreviewResponse = server
        .get("/rate/preview")
        .add_query_param("amount", 500)
        .add_query_param("direction", "unlock")
        .await
        .json();
    assert_eq!(preview.result, 550);
}

#[tokio::test]
async fn test_unlock_then_withdraw_after_epoch() {
    let (server, _guard) = create_ready_test_server();
    stake(&server, "0xalice", 1_000).await.assert_status_ok();
    server
        .post("/sim/rewards")
        .json(&json!({ "pool": "0xpool-a", "amount": 100 }))
        .await
        .assert_status_ok();

    let response = server
        .post("/unlock")
        .json(&json!({ "caller": "0xalice", "amount": 500 }))
        .await;
    response.assert_status_ok();
    let unlock: ReceiptResponse<UnlockReceipt> = response.json();
    assert_eq!(unlock.receipt.entry.amount, 550);
    assert_eq!(unlock.receipt.entry.unlock_epoch.value(), 0);
    assert_eq!(unlock.receipt.entry.init_time, CLOCK_START);

    let pending: PendingResponse = server.get("/accounts/0xalice/pending").await.json();
    assert_eq!(pending.count, 1);
    assert_eq!(pending.total, 550);
    assert!(!pending.truncated);

    // Same epoch: nothing is claimable yet, and that is not an error.
    let early: ReceiptResponse<WithdrawReceipt> = server
        .post("/withdraw")
        .json(&json!({ "caller": "0xalice" }))
        .await
        .json();
    assert!(early.receipt.released.is_empty());
    assert_eq!(early.receipt.remaining, 1);

    let epoch: EpochResponse = server
        .post("/sim/advance-epoch")
        .json(&json!({ "pool": "0xpool-a" }))
        .await
        .json();
    assert_eq!(epoch.epoch, 1);

    let response = server
        .post("/withdraw")
        .json(&json!({ "caller": "0xalice" }))
        .await;
    response.assert_status_ok();
    let done: ReceiptResponse<WithdrawReceipt> = response.json();
    assert_eq!(done.receipt.total_released, 550);
    assert_eq!(done.receipt.remaining, 0);

    let balance: BalanceResponse = server.get("/accounts/0xalice/balance").await.json();
    assert_eq!(balance.base, 9_550);
    assert_eq!(balance.derivative, Some(500));

    let response = server
        .post("/withdraw")
        .json(&json!({ "caller": "0xalice" }))
        .await;
    assert_error(&response, 422, "NO_PENDING_WITHDRAWALS");
}

#[tokio::test]
async fn test_unlock_more_than_held() {
    let (server, _guard) = create_ready_test_server();
    stake(&server, "0xalice", 100).await.assert_status_ok();

    let response = server
        .post("/unlock")
        .json(&json!({ "caller": "0xalice", "amount": 101 }))
        .await;

    assert_error(&response, 422, "INSUFFICIENT_BALANCE");
    let pending: PendingResponse = server.get("/accounts/0xalice/pending").await.json();
    assert_eq!(pending.count, 0);
}

// =============================================================================
// POOLS / ACCOUNTS
// =============================================================================

#[tokio::test]
async fn test_single_pool_view() {
    let (server, _guard) = create_ready_test_server();
    stake(&server, "0xalice", 400).await.assert_status_ok();

    let response = server.get("/pools/0xpool-a").await;

    response.assert_status_ok();
    let pool: PoolResponse = response.json();
    assert_eq!(pool.pool.weight, 1);
    assert_eq!(pool.pool.active, 400);
    assert_eq!(pool.pool.epoch, 0);
}

#[tokio::test]
async fn test_unknown_pool_not_found() {
    let (server, _guard) = create_ready_test_server();

    let response = server.get("/pools/0xnowhere").await;

    assert_error(&response, 404, "POOL_NOT_RECOGNIZED");
}

#[tokio::test]
async fn test_balance_before_initialize() {
    let (server, _guard) = create_test_server();
    server
        .post("/sim/fund")
        .json(&json!({ "account": "0xbob", "amount": 7 }))
        .await
        .assert_status_ok();

    let balance: BalanceResponse = server.get("/accounts/0xbob/balance").await.json();

    assert_eq!(balance.base, 7);
    assert_eq!(balance.derivative, None);
}

// =============================================================================
// EXPORT / HASH
// =============================================================================

#[tokio::test]
async fn test_export_matches_hash() {
    let (server, _guard) = create_ready_test_server();
    stake(&server, "0xalice", 250).await.assert_status_ok();

    let response = server.post("/export").await;
    response.assert_status_ok();
    let export: ExportResponse = response.json();

    let data = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &export.data)
        .unwrap();
    assert_eq!(data.len(), export.size);
    assert_eq!(&data[..4], b"SVLT");

    let snapshot = stakevault_core::snapshot_from_bytes(&data).unwrap();
    assert!(snapshot.vault.is_some());

    let hash: HashResponse = server.get("/hash").await.json();
    assert_eq!(hash.algorithm, "blake3");
    assert_eq!(hash.hash, export.fingerprint);
}

#[tokio::test]
async fn test_hash_changes_after_operation() {
    let (server, _guard) = create_ready_test_server();

    let before: HashResponse = server.get("/hash").await.json();
    stake(&server, "0xalice", 1).await.assert_status_ok();
    let after: HashResponse = server.get("/hash").await.json();

    assert_ne!(before.hash, after.hash);
}

// =============================================================================
// SIMULATION
// =============================================================================

#[tokio::test]
async fn test_sim_fund_and_register() {
    let (server, _guard) = create_test_server();

    let fund: FundResponse = server
        .post("/sim/fund")
        .json(&json!({ "account": "0xcarol", "amount": 10 }))
        .await
        .json();
    assert_eq!(fund.balance, 10);

    let first: RegisterPoolResponse = server
        .post("/sim/pools")
        .json(&json!({ "pool": "0xpool-z" }))
        .await
        .json();
    assert!(first.created);

    let again: RegisterPoolResponse = server
        .post("/sim/pools")
        .json(&json!({ "pool": "0xpool-z" }))
        .await
        .json();
    assert!(!again.created);
}

#[tokio::test]
async fn test_sim_tick_moves_clock() {
    let (server, _guard) = create_test_server();

    let tick: TickResponse = server
        .post("/sim/tick")
        .json(&json!({ "seconds": 5 }))
        .await
        .json();

    assert_eq!(tick.now_seconds, CLOCK_START + 5);
    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.now_seconds, CLOCK_START + 5);
}

#[tokio::test]
async fn test_sim_rewards_without_stake_fails() {
    let (server, _guard) = create_ready_test_server();

    let response = server
        .post("/sim/rewards")
        .json(&json!({ "pool": "0xpool-a", "amount": 10 }))
        .await;

    assert_error(&response, 502, "EXTERNAL_FAILURE");
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Create a test server with API key authentication enabled.
fn create_auth_test_server(api_key: &str) -> TestServer {
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("STAKEVAULT_API_KEY", api_key) };
    let router = create_router(AppState::new(ready_session()));
    TestServer::new(router).unwrap()
}

/// Clean up auth env var after test.
fn cleanup_auth_env() {
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("STAKEVAULT_API_KEY") };
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let api_key = "test-secret-key-12345";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", api_key)
                .parse::<HeaderValue>()
                .unwrap(),
        )
        .await;

    cleanup_auth_env();

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert!(status.initialized);
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("correct-key");

    let response = server
        .post("/stake")
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .json(&json!({ "caller": "0xalice", "amount": 10 }))
        .await;

    cleanup_auth_env();

    assert_error(&response, 401, "AUTH_INVALID");
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("required-key");

    let response = server.get("/status").await;

    cleanup_auth_env();

    assert_error(&response, 401, "AUTH_REQUIRED");
}

#[tokio::test]
async fn test_auth_health_endpoint_bypasses_auth() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("secret-key-for-bypass-test");

    let response = server.get("/health").await;

    cleanup_auth_env();

    response.assert_status_ok();
}
