//! HTTP boundary tests
//!
//! Requests go through the full warp filter chain against a real engine with a
//! manual clock. Both pool tokens use 6 decimals, so LP shares do too.

use engine_config::{FarmConfig, PoolConfig, ServiceConfig, TokenConfig};
use pool_api::{routes, ApiState};
use pool_engine::{Clock, ManualClock, TracingSink};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use types::{FarmId, PoolId, TokenAddress, UserAddress};
use warp::http::StatusCode;

const START: u64 = 1_700_000_000;

fn alice() -> String {
    UserAddress::from_bytes([0xa1; 20]).to_string()
}

fn bob() -> String {
    UserAddress::from_bytes([0xb2; 20]).to_string()
}

fn config() -> ServiceConfig {
    let token = |symbol: &str, byte: u8, price| TokenConfig {
        symbol: symbol.to_string(),
        address: TokenAddress::from_bytes([byte; 20]),
        decimals: 6,
        price_usd: Some(price),
    };
    ServiceConfig {
        tokens: vec![
            token("USDC", 0x11, dec!(1)),
            token("DAI", 0x22, dec!(1)),
            token("RWD", 0x33, dec!(0.5)),
        ],
        pools: vec![PoolConfig {
            token_a: "DAI".to_string(),
            token_b: "USDC".to_string(),
            fee_bps: 30,
            farm: Some(FarmConfig {
                reward_token: "RWD".to_string(),
                reward_per_second: "1".to_string(),
                pool_weight: 1,
                end_time: None,
            }),
        }],
        ..ServiceConfig::default()
    }
}

struct Harness {
    state: Arc<ApiState>,
    admin: bool,
    clock: ManualClock,
    pool_id: PoolId,
    farm_id: FarmId,
}

fn harness_with(config: ServiceConfig) -> Harness {
    let clock = ManualClock::new(START);
    let state = ApiState::from_config(&config, Arc::new(clock.clone()), Arc::new(TracingSink))
        .unwrap();
    let pool_id = state.engine().list_pools()[0];
    let farm_id = state.engine().farm_ids()[0];
    Harness {
        state: Arc::new(state),
        admin: config.server.enable_admin,
        clock,
        pool_id,
        farm_id,
    }
}

fn harness() -> Harness {
    harness_with(config())
}

async fn get(h: &Harness, path: &str) -> (StatusCode, Value) {
    let response = warp::test::request()
        .method("GET")
        .path(path)
        .reply(&routes(h.state.clone(), h.admin))
        .await;
    let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
    (response.status(), body)
}

async fn post(h: &Harness, path: &str, body: Value) -> (StatusCode, Value) {
    let response = warp::test::request()
        .method("POST")
        .path(path)
        .json(&body)
        .reply(&routes(h.state.clone(), h.admin))
        .await;
    let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
    (response.status(), body)
}

async fn seed(h: &Harness, user: &str, amount_a: &str, amount_b: &str) -> Value {
    let (status, body) = post(
        h,
        "/api/add-liquidity",
        json!({
            "poolId": h.pool_id,
            "amountA": amount_a,
            "amountB": amount_b,
            "slippage": "0.5",
            "userAddress": user,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn health_and_status() {
    let h = harness();
    let response = warp::test::request()
        .path("/health")
        .reply(&routes(h.state.clone(), h.admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_ref(), b"OK");

    let (status, body) = get(&h, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pools"], 1);
    assert_eq!(body["farms"], 1);
    assert_eq!(body["tokens"], 3);
    assert_eq!(body["timestamp"], START);
}

#[tokio::test]
async fn pools_listing_reports_decimal_strings() {
    let h = harness();
    let body = seed(&h, &alice(), "1", "1").await;
    assert_eq!(body["lpMinted"], "0.999");
    assert_eq!(body["amountAUsed"], "1");
    assert_eq!(body["amountBUsed"], "1");

    let (status, pools) = get(&h, &format!("/api/pools?user={}", alice())).await;
    assert_eq!(status, StatusCode::OK);
    let pool = &pools[0];
    // pair is stored in address order
    assert_eq!(pool["tokenA"]["symbol"], "USDC");
    assert_eq!(pool["tokenB"]["symbol"], "DAI");
    assert_eq!(pool["reserveA"], "1");
    assert_eq!(pool["lpTokens"], "1");
    assert_eq!(pool["userLiquidity"], "0.999");
    assert_eq!(pool["feeRate"], "0.3");
    assert_eq!(pool["tvl"], "2");
    assert_eq!(pool["farm"]["rewardToken"]["symbol"], "RWD");
    assert_eq!(pool["farm"]["active"], true);
    // 1 RWD/s at $0.50 over a year against $2 of liquidity
    assert_eq!(pool["apr"], "788400000");

    let (status, single) = get(&h, &format!("/api/pools/{}", h.pool_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(single["id"], json!(h.pool_id));
    assert_eq!(single["userLiquidity"], "0");
}

#[tokio::test]
async fn quote_and_swap_convert_amounts() {
    let h = harness();
    seed(&h, &alice(), "1", "1").await;

    let (status, quote) = post(
        &h,
        "/api/quote",
        json!({ "poolId": h.pool_id, "tokenIn": "usdc", "amountIn": "0.001" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{quote}");
    assert_eq!(quote["tokenOut"], "DAI");
    assert_eq!(quote["amountOut"], "0.000996");
    assert_eq!(quote["fee"], "0.000003");

    let (status, swap) = post(
        &h,
        "/api/swap",
        json!({
            "poolId": h.pool_id,
            "tokenIn": TokenAddress::from_bytes([0x11; 20]).to_string(),
            "amountIn": "0.001",
            "minAmountOut": "0.000996",
            "userAddress": bob(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{swap}");
    assert_eq!(swap["amountOut"], "0.000996");
    assert_eq!(swap["timestamp"], START);

    let (_, pool) = get(&h, &format!("/api/pools/{}", h.pool_id)).await;
    assert_eq!(pool["reserveA"], "1.001");
    assert_eq!(pool["reserveB"], "0.999004");
}

#[tokio::test]
async fn swap_rejections_are_specific() {
    let h = harness();
    seed(&h, &alice(), "1", "1").await;

    let (status, body) = post(
        &h,
        "/api/swap",
        json!({
            "poolId": h.pool_id,
            "tokenIn": "USDC",
            "amountIn": "0.001",
            "minAmountOut": "0.000997",
            "userAddress": bob(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "slippage_exceeded");

    let (status, body) = post(
        &h,
        "/api/swap",
        json!({
            "poolId": h.pool_id,
            "tokenIn": "USDC",
            "amountIn": "0.001",
            "deadline": START - 1,
            "userAddress": bob(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "deadline_expired");

    let (status, body) = post(
        &h,
        "/api/quote",
        json!({ "poolId": h.pool_id, "tokenIn": "RWD", "amountIn": "1" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unknown_token");

    let (status, body) = post(
        &h,
        "/api/quote",
        json!({ "poolId": h.pool_id, "tokenIn": "USDC", "amountIn": "0.0000001" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_amount");

    // reserves untouched by the rejected swaps
    let (_, pool) = get(&h, &format!("/api/pools/{}", h.pool_id)).await;
    assert_eq!(pool["reserveA"], "1");
}

#[tokio::test]
async fn add_liquidity_slippage_is_enforced() {
    let h = harness();
    seed(&h, &alice(), "1", "1").await;

    let (status, body) = post(
        &h,
        "/api/add-liquidity",
        json!({
            "poolId": h.pool_id,
            "amountA": "1",
            "amountB": "2",
            "slippage": 0,
            "userAddress": bob(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "slippage_exceeded");

    let (status, body) = post(
        &h,
        "/api/add-liquidity",
        json!({
            "poolId": h.pool_id,
            "amountA": "1",
            "amountB": "2",
            "slippage": 60,
            "userAddress": bob(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["amountBUsed"], "1");
    assert_eq!(body["lpMinted"], "1");
}

#[tokio::test]
async fn remove_liquidity_by_percentage() {
    let h = harness();
    seed(&h, &alice(), "1", "1").await;

    let (status, body) = post(
        &h,
        "/api/remove-liquidity",
        json!({
            "poolId": h.pool_id,
            "percentage": "50",
            "slippage": "1",
            "userAddress": alice(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["lpBurned"], "0.4995");
    assert_eq!(body["amountA"], "0.4995");
    assert_eq!(body["amountB"], "0.4995");

    let (status, body) = post(
        &h,
        "/api/remove-liquidity",
        json!({ "poolId": h.pool_id, "percentage": "50", "userAddress": bob() }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_shares");

    let (status, body) = post(
        &h,
        "/api/remove-liquidity",
        json!({ "poolId": h.pool_id, "percentage": "150", "userAddress": alice() }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_amount");
}

#[tokio::test]
async fn stake_claim_and_unstake() {
    let h = harness();
    seed(&h, &alice(), "1", "1").await;

    let (status, stake) = post(
        &h,
        "/api/stake-tokens",
        json!({ "farmId": h.farm_id, "amount": "0.5", "userAddress": alice() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{stake}");
    assert_eq!(stake["stakedBalance"], "0.5");
    assert_eq!(stake["multiplier"], "1");
    assert_eq!(stake["lockPeriod"], 0);

    h.clock.advance(100);
    let claim_body = json!({ "farmId": h.farm_id, "userAddress": alice() });
    let (status, claim) = post(&h, "/api/claim-rewards", claim_body.clone()).await;
    assert_eq!(status, StatusCode::OK, "{claim}");
    assert_eq!(claim["rewardAmount"], "100");
    assert_eq!(claim["rewardToken"], "RWD");

    let (_, again) = post(&h, "/api/claim-rewards", claim_body).await;
    assert_eq!(again["rewardAmount"], "0");

    // staked shares cannot be withdrawn from the pool
    let (status, body) = post(
        &h,
        "/api/remove-liquidity",
        json!({ "poolId": h.pool_id, "percentage": "100", "userAddress": alice() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["lpBurned"], "0.499");

    let (status, unstake) = post(
        &h,
        "/api/unstake-tokens",
        json!({ "farmId": h.farm_id, "amount": "0.5", "userAddress": alice() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{unstake}");
    assert_eq!(unstake["stakedBalance"], "0");
}

#[tokio::test]
async fn locked_stake_and_relock() {
    let h = harness();
    seed(&h, &alice(), "1", "1").await;

    let (status, stake) = post(
        &h,
        "/api/stake-tokens",
        json!({
            "farmId": h.farm_id,
            "amount": "0.1",
            "lockPeriod": 90,
            "userAddress": alice(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{stake}");
    assert_eq!(stake["multiplier"], "1.1");
    assert_eq!(stake["lockEnd"], START + 90 * 86_400);

    let (status, body) = post(
        &h,
        "/api/unstake-tokens",
        json!({ "farmId": h.farm_id, "amount": "0.1", "userAddress": alice() }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "lock_active");

    let (status, relock) = post(
        &h,
        "/api/relock",
        json!({ "farmId": h.farm_id, "lockPeriod": 365, "userAddress": alice() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{relock}");
    assert_eq!(relock["multiplier"], "1.5");

    let (status, body) = post(
        &h,
        "/api/stake-tokens",
        json!({
            "farmId": h.farm_id,
            "amount": "0.1",
            "lockPeriod": 7,
            "userAddress": alice(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_lock_period");
}

#[tokio::test]
async fn positions_include_pending_rewards() {
    let h = harness();
    seed(&h, &alice(), "1", "1").await;
    post(
        &h,
        "/api/stake-tokens",
        json!({ "farmId": h.farm_id, "amount": "0.5", "userAddress": alice() }),
    )
    .await;
    h.clock.advance(10);

    let (status, positions) = get(&h, &format!("/api/positions?user={}", alice())).await;
    assert_eq!(status, StatusCode::OK);
    let position = &positions[0];
    assert_eq!(position["poolId"], json!(h.pool_id));
    assert_eq!(position["farmId"], json!(h.farm_id));
    assert_eq!(position["lpBalance"], "0.999");
    assert_eq!(position["freeBalance"], "0.499");
    assert_eq!(position["amountA"], "0.999");
    assert_eq!(position["pendingRewards"], "10");
    assert_eq!(position["rewardToken"], "RWD");

    let (status, empty) = get(&h, &format!("/api/positions?user={}", bob())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty, json!([]));

    let (status, body) = get(&h, "/api/positions").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, body) = get(&h, "/api/positions?user=0x1234").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_query");
}

#[tokio::test]
async fn admin_routes_hidden_by_default() {
    let h = harness();
    seed(&h, &alice(), "1", "1").await;

    for action in ["pause", "resume"] {
        let (status, body) = post(
            &h,
            &format!("/api/pools/{}/{}", h.pool_id, action),
            json!({ "reason": "maintenance" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }
    assert!(!h.state.engine().pool(h.pool_id).unwrap().paused);
}

#[tokio::test]
async fn paused_pool_rejects_mutations_until_resumed() {
    let mut config = config();
    config.server.enable_admin = true;
    let h = harness_with(config);
    seed(&h, &alice(), "1", "1").await;

    let (status, body) = post(
        &h,
        &format!("/api/pools/{}/pause", h.pool_id),
        json!({ "reason": "maintenance" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["changed"], true);

    let swap = json!({
        "poolId": h.pool_id,
        "tokenIn": "USDC",
        "amountIn": "0.001",
        "minAmountOut": "0",
        "userAddress": bob(),
    });
    let (status, body) = post(&h, "/api/swap", swap.clone()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "pool_paused");

    // reads keep working
    let (status, pool) = get(&h, &format!("/api/pools/{}", h.pool_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pool["paused"], true);

    let (status, body) = post(&h, &format!("/api/pools/{}/resume", h.pool_id), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["paused"], false);

    let (status, _) = post(&h, "/api/swap", swap).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn contention_returns_retry_after() {
    let mut config = config();
    config.engine.lock_timeout_ms = 20;
    let h = harness_with(config);

    let (held_tx, held_rx) = mpsc::channel();
    let state = h.state.clone();
    let pool_id = h.pool_id;
    let holder = std::thread::spawn(move || {
        state
            .engine()
            .ledger()
            .read(pool_id, |_| {
                held_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .unwrap();
    });
    held_rx.recv().unwrap();

    let response = warp::test::request()
        .method("POST")
        .path("/api/add-liquidity")
        .json(&json!({
            "poolId": h.pool_id,
            "amountA": "1",
            "amountB": "1",
            "userAddress": alice(),
        }))
        .reply(&routes(h.state.clone(), h.admin))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["retry-after"], "1");
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["error"], "busy");

    holder.join().unwrap();
    let (_, pool) = get(&h, &format!("/api/pools/{}", h.pool_id)).await;
    assert_eq!(pool["lpTokens"], "0");
}

#[tokio::test]
async fn unknown_resources() {
    let h = harness();
    let (status, body) = get(&h, "/api/pools/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "pool_not_found");

    let (status, body) = post(
        &h,
        "/api/claim-rewards",
        json!({ "farmId": 42, "userAddress": alice() }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "farm_not_found");

    let (status, body) = post(&h, "/api/claim-rewards", json!({ "farmId": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_body");

    let (status, body) = get(&h, "/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn state_file_restores_engine() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.state_file = Some(dir.path().join("state.json"));

    let first = harness_with(config.clone());
    seed(&first, &alice(), "1", "1").await;
    post(
        &first,
        "/api/stake-tokens",
        json!({ "farmId": first.farm_id, "amount": "0.25", "userAddress": alice() }),
    )
    .await;
    first
        .state
        .save_snapshot(config.state_file.as_ref().unwrap())
        .unwrap();

    let restored = harness_with(config);
    assert_eq!(restored.state.engine().list_pools().len(), 1);
    assert_eq!(restored.clock.now(), START);

    let (_, positions) = get(&restored, &format!("/api/positions?user={}", alice())).await;
    assert_eq!(positions[0]["lpBalance"], "0.999");
    assert_eq!(positions[0]["stakedBalance"], "0.25");
}
