// HTTP handlers exposing the market controller to a UI

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use infomeme_market::{FinalityResult, MarketError, Side, Signer as _};

use crate::app_state::SharedState;

pub type ApiResponse = (StatusCode, Json<Value>);

// ===== REQUEST TYPES =====

#[derive(Debug, Deserialize)]
pub struct EnterPositionRequest {
    pub side: Side,
    /// Whole tokens as typed by the user, e.g. "1.5"
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub winning_side: Side,
}

#[derive(Debug, Deserialize)]
pub struct CreateMarketRequest {
    pub description: String,
    pub close_time: DateTime<Utc>,
    #[serde(default)]
    pub fa_metadata: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub name: String,
}

// ===== STATUS MAPPING =====

pub fn error_status(err: &MarketError) -> StatusCode {
    match err {
        MarketError::ValidationFailure(_) => StatusCode::BAD_REQUEST,
        MarketError::NotConnected => StatusCode::UNAUTHORIZED,
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::ReadFailure(_) => StatusCode::BAD_GATEWAY,
        MarketError::WriteRejected(_) => StatusCode::CONFLICT,
        MarketError::FinalityUnknown(_) => StatusCode::ACCEPTED,
    }
}

pub fn result_status(result: &FinalityResult) -> StatusCode {
    match result {
        FinalityResult::Committed { .. } => StatusCode::OK,
        FinalityResult::Rejected { .. } => StatusCode::CONFLICT,
        FinalityResult::Unknown { .. } => StatusCode::ACCEPTED,
    }
}

fn error_response(err: MarketError) -> ApiResponse {
    (
        error_status(&err),
        Json(json!({ "success": false, "error": err, "message": err.to_string() })),
    )
}

fn action_response(state: &SharedState, outcome: Result<FinalityResult, MarketError>) -> ApiResponse {
    match outcome {
        Ok(result) => (
            result_status(&result),
            Json(json!({
                "success": result.is_committed(),
                "result": result,
                "state": state.controller.snapshot().as_ref(),
            })),
        ),
        Err(e) => error_response(e),
    }
}

// ===== HEALTH =====

pub async fn health_check(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "ledger": state.ledger.describe(),
        "market_id": state.controller.market_id(),
        "connected": state.signer().current_address(),
    }))
}

// ===== MARKET =====

pub async fn get_market(State(state): State<SharedState>) -> Json<Value> {
    Json(json!(state.controller.snapshot().as_ref()))
}

/// Market refresh plus the off-chain feed; a feed failure never fails the call
pub async fn refresh_market(State(state): State<SharedState>) -> Json<Value> {
    let (snapshot, tweets, participants) = tokio::join!(
        state.controller.refresh(),
        state.feed.tweets(),
        state.feed.participants(),
    );

    let feed_json = |name: &str, result: Result<Value, MarketError>| match result {
        Ok(items) => items,
        Err(e) => {
            warn!("[Feed] {} unavailable: {}", name, e);
            json!({ "error": e.to_string() })
        }
    };

    Json(json!({
        "state": snapshot.as_ref(),
        "tweets": feed_json("tweets", tweets.map(|t| json!(t))),
        "participants": feed_json("participants", participants.map(|p| json!(p))),
    }))
}

pub async fn enter_position(
    State(state): State<SharedState>,
    Json(request): Json<EnterPositionRequest>,
) -> ApiResponse {
    let outcome = state
        .controller
        .enter_position(request.side, &request.amount)
        .await;
    action_response(&state, outcome)
}

pub async fn claim_winnings(State(state): State<SharedState>) -> ApiResponse {
    let outcome = state.controller.claim_winnings().await;
    action_response(&state, outcome)
}

pub async fn settle_market(
    State(state): State<SharedState>,
    Json(request): Json<SettleRequest>,
) -> ApiResponse {
    let outcome = state.controller.settle_market(request.winning_side).await;
    action_response(&state, outcome)
}

pub async fn create_market(
    State(state): State<SharedState>,
    Json(request): Json<CreateMarketRequest>,
) -> ApiResponse {
    let fa_metadata = request
        .fa_metadata
        .unwrap_or_else(|| state.config.fa_metadata.clone());
    let outcome = state
        .controller
        .create_market(&request.description, request.close_time, &fa_metadata)
        .await;
    action_response(&state, outcome)
}

// ===== WALLET =====

pub async fn connect_wallet(
    State(state): State<SharedState>,
    Json(request): Json<ConnectRequest>,
) -> ApiResponse {
    let name = request.name.trim();
    if name.is_empty() {
        return error_response(MarketError::validation("name is required"));
    }

    let address = state.signer().connect(name);
    let snapshot = state.controller.identity_changed().await;
    (
        StatusCode::OK,
        Json(json!({ "success": true, "address": address, "state": snapshot.as_ref() })),
    )
}

pub async fn disconnect_wallet(State(state): State<SharedState>) -> Json<Value> {
    state.signer().disconnect();
    let snapshot = state.controller.identity_changed().await;
    Json(json!({ "success": true, "state": snapshot.as_ref() }))
}

// ===== FEED =====

pub async fn get_tweets(State(state): State<SharedState>) -> ApiResponse {
    match state.feed.tweets().await {
        Ok(tweets) => (StatusCode::OK, Json(json!({ "tweets": tweets }))),
        Err(e) => error_response(e),
    }
}

pub async fn get_participants(State(state): State<SharedState>) -> ApiResponse {
    match state.feed.participants().await {
        Ok(users) => (StatusCode::OK, Json(json!({ "participants": users }))),
        Err(e) => error_response(e),
    }
}
