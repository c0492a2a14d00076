/// HTTP transport tests
///
/// Runs a fake fullnode (and campaign feed) on an ephemeral local port and
/// drives the real reqwest-based clients against it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use infomeme_market::units::now_ledger;
use infomeme_market::{
    CampaignFeedClient, DevKeySigner, FinalityPolicy, FinalityResult, HttpLedgerRpc,
    LedgerReadGateway, LedgerRpc, LedgerRpcError, LedgerWriteGateway, MarketAction,
    MarketController, MarketError, MarketStatus, ModuleRef, Side,
};

const MARKET: &str = "0x6aae";
const HOUR: u64 = 60 * 60 * 1_000_000;

// ============================================================================
// FAKE FULLNODE
// ============================================================================

#[derive(Default)]
struct FakeNode {
    status_polls: AtomicUsize,
    submissions: Mutex<Vec<Value>>,
}

fn function_name(body: &Value) -> String {
    body.as_str()
        .unwrap_or_default()
        .rsplit("::")
        .next()
        .unwrap_or_default()
        .to_string()
}

async fn view(Json(request): Json<Value>) -> (StatusCode, Json<Value>) {
    match function_name(&request["function"]).as_str() {
        "get_market_info" => (
            StatusCode::OK,
            Json(json!([{
                "id": MARKET,
                "description": "Will the stablecoin campaign trend?",
                "treasury": "0xfeed",
                "winning_side": { "vec": [] },
                "create_time": (now_ledger() - HOUR).to_string(),
                "close_time": (now_ledger() + HOUR).to_string(),
                "a_pool": { "id": "0xa1" },
                "b_pool": { "id": "0xb1" },
                "total_a_effective_stake": "300",
                "total_b_effective_stake": "100",
                "status": true
            }])),
        ),
        "get_a_pool_balance_amount" => (StatusCode::OK, Json(json!(["300"]))),
        "get_b_pool_balance_amount" => (StatusCode::OK, Json(json!(["100"]))),
        "get_player_position_info" => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Move abort in 0x42::market: E_POSITION_NOT_FOUND(0x60002)",
                "error_code": "invalid_input",
                "vm_error_code": 4016
            })),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "function not found", "error_code": "function_not_found" })),
        ),
    }
}

async fn account(Path(address): Path<String>) -> (StatusCode, Json<Value>) {
    if address == "0x404" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Account not found", "error_code": "account_not_found" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "sequence_number": "5", "authentication_key": address })),
    )
}

async fn submit(
    State(node): State<Arc<FakeNode>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let function = function_name(&body["payload"]["function"]);
    node.submissions.lock().unwrap().push(body);

    if function == "settle_market" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Invalid transaction: Type: Validation Code: SEQUENCE_NUMBER_TOO_OLD",
                "error_code": "vm_error",
                "vm_error_code": 3
            })),
        );
    }
    (StatusCode::ACCEPTED, Json(json!({ "hash": "0xfeed01" })))
}

/// Not indexed on the first poll, committed afterwards
async fn by_hash(
    State(node): State<Arc<FakeNode>>,
    Path(hash): Path<String>,
) -> (StatusCode, Json<Value>) {
    if node.status_polls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Transaction not found", "error_code": "transaction_not_found" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "type": "user_transaction",
            "hash": hash,
            "version": "77",
            "success": true,
            "vm_status": "Executed successfully"
        })),
    )
}

async fn tweets() -> Json<Value> {
    Json(json!([
        { "id": "1", "username": "degen_dev", "content": "USDC supply flipped", "likes": 12 },
        { "id": "2", "username": "anon", "content": "gm" }
    ]))
}

async fn users() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn spawn_fake_node() -> (String, Arc<FakeNode>) {
    let node = Arc::new(FakeNode::default());
    let app = Router::new()
        .route("/v1/view", post(view))
        .route("/v1/accounts/:address", get(account))
        .route("/v1/transactions", post(submit))
        .route("/v1/transactions/by_hash/:hash", get(by_hash))
        .route("/api/v1/campaigns/stablecoin/tweets", get(tweets))
        .route("/api/v1/campaigns/stablecoin/users", get(users))
        .with_state(node.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake node");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake node crashed");
    });

    (format!("http://{}", addr), node)
}

fn rpc(base: &str) -> Arc<HttpLedgerRpc> {
    Arc::new(HttpLedgerRpc::new(format!("{}/v1", base), Duration::from_secs(5)))
}

fn policy() -> FinalityPolicy {
    FinalityPolicy {
        timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
    }
}

// ============================================================================
// READS
// ============================================================================

#[tokio::test]
async fn test_reads_over_http() {
    let (base, _node) = spawn_fake_node().await;
    let reads = LedgerReadGateway::new(rpc(&base), ModuleRef::new("0x42", "market"));

    let market = assert_ok!(reads.get_market(MARKET).await);
    assert_eq!(market.treasury.as_deref(), Some("0xfeed"));
    assert_eq!(market.total_a_effective_stake, 300);
    assert!(market.open);

    let pool = assert_ok!(reads.get_pool_balance(MARKET, Side::B).await);
    assert_eq!(pool.balance, 100);

    // Move abort for a missing position is absence, not an error
    assert_eq!(assert_ok!(reads.get_position(MARKET, "0xb0b").await), None);
}

#[tokio::test]
async fn test_view_error_classification() {
    let (base, _node) = spawn_fake_node().await;
    let rpc = rpc(&base);
    let module = ModuleRef::new("0x42", "market");

    let err = assert_err!(rpc.view(module.view("get_market_volume", vec![json!(MARKET)])).await);
    assert!(matches!(err, LedgerRpcError::NotFound(_)));

    let err = assert_err!(
        rpc.view(module.view("get_player_position_info", vec![json!("0xb0b"), json!(MARKET)]))
            .await
    );
    assert!(matches!(err, LedgerRpcError::ViewAborted(_)));
}

#[tokio::test]
async fn test_account_sequence_numbers() {
    let (base, _node) = spawn_fake_node().await;
    let rpc = rpc(&base);

    assert_eq!(assert_ok!(rpc.account_sequence_number("0xabc").await), 5);
    assert_eq!(assert_ok!(rpc.account_sequence_number("0x404").await), 0);
}

#[tokio::test]
async fn test_unreachable_node_is_read_failure() {
    let reads = LedgerReadGateway::new(
        Arc::new(HttpLedgerRpc::new("http://127.0.0.1:9/v1", Duration::from_secs(2))),
        ModuleRef::new("0x42", "market"),
    );
    let err = assert_err!(reads.get_market(MARKET).await);
    assert!(matches!(err, MarketError::ReadFailure(_)));
    assert!(err.is_recoverable());
}

// ============================================================================
// WRITES
// ============================================================================

#[tokio::test]
async fn test_submit_and_wait_for_finality() {
    let (base, node) = spawn_fake_node().await;
    let rpc = rpc(&base);
    let signer = Arc::new(DevKeySigner::connected(rpc.clone(), b"seed", "alice"));
    let writes = LedgerWriteGateway::new(rpc, signer, ModuleRef::new("0x42", "market"), policy());

    let result = assert_ok!(
        writes
            .submit(&MarketAction::ClaimWinnings {
                market_id: MARKET.to_string()
            })
            .await
    );
    assert_eq!(
        result,
        FinalityResult::Committed {
            hash: "0xfeed01".to_string(),
            version: 77
        }
    );
    assert!(node.status_polls.load(Ordering::SeqCst) >= 2);

    let submissions = node.submissions.lock().unwrap().clone();
    assert_eq!(submissions.len(), 1);
    let body = &submissions[0];
    assert_eq!(body["sequence_number"], "5");
    assert_eq!(body["payload"]["type"], "entry_function_payload");
    assert_eq!(body["payload"]["function"], "0x42::market::claim_winnings");
    assert_eq!(body["payload"]["arguments"], json!([MARKET]));
    assert_eq!(body["signature"]["type"], "ed25519_signature");
}

#[tokio::test]
async fn test_validation_error_on_submit_is_rejected() {
    let (base, _node) = spawn_fake_node().await;
    let rpc = rpc(&base);
    let signer = Arc::new(DevKeySigner::connected(rpc.clone(), b"seed", "alice"));
    let writes = LedgerWriteGateway::new(rpc, signer, ModuleRef::new("0x42", "market"), policy());

    let result = assert_ok!(
        writes
            .submit(&MarketAction::SettleMarket {
                market_id: MARKET.to_string(),
                winning_side: Side::A,
            })
            .await
    );
    match result {
        FinalityResult::Rejected { hash, reason } => {
            assert_eq!(hash, None);
            assert!(reason.contains("SEQUENCE_NUMBER_TOO_OLD"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_controller_over_http() {
    let (base, _node) = spawn_fake_node().await;
    let rpc = rpc(&base);
    let signer = Arc::new(DevKeySigner::connected(rpc.clone(), b"seed", "alice"));
    let controller = MarketController::new(rpc, signer, MARKET, ModuleRef::new("0x42", "market"), policy());

    let state = controller.mount().await;
    let view = state.view().expect("market loads over http");
    assert_eq!(view.status, MarketStatus::Active);
    assert_eq!(view.odds_b, 4.0);
    assert!(view.position.is_none());
    assert!(state.warnings.is_empty());
}

// ============================================================================
// FEED
// ============================================================================

#[tokio::test]
async fn test_campaign_feed() {
    let (base, _node) = spawn_fake_node().await;
    let feed = CampaignFeedClient::new(base, "stablecoin", Duration::from_secs(5));

    let tweets = assert_ok!(feed.tweets().await);
    assert_eq!(tweets.len(), 2);
    assert_eq!(tweets[0].author, "degen_dev");
    assert_eq!(tweets[0].extra.get("likes"), Some(&json!(12)));

    let err = assert_err!(feed.participants().await);
    assert!(matches!(err, MarketError::ReadFailure(_)));
}
