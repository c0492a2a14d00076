// ============================================================================
// Mock Ledger - in-memory market program for development and tests
// ============================================================================
//
// Answers the same view and submit calls as a fullnode running the market
// module, so the whole client can run with LEDGER_MOCK_MODE=true.
//
// Ledger-side rules kept here are only the ones the client observes:
//   - positions can be entered while the market is open and before close
//   - one position per participant per market
//   - settle closes the market and records the winner
//   - claim succeeds once, for the winning side only
//
// Failure injection (failing views, rejected or stalled submissions, slow
// views) lets tests drive every error path of the client.
//
// ============================================================================

use serde_json::{json, Value};
use sha3::{Digest, Sha3_256};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::ledger_rpc::{
    EntryFunctionPayload, LedgerRpc, LedgerRpcError, PendingTransaction, SignedSubmission,
    TransactionStatus, ViewRequest,
};
use crate::models::{normalize_address, Market, MarketRecord, Position, PositionRecord, Side};
use crate::units;

/// One week in ledger time
const DEMO_MARKET_DURATION: u64 = 7 * 24 * 60 * 60 * 1_000_000;

#[derive(Debug, Default)]
struct MockState {
    now_override: Option<u64>,
    markets: HashMap<String, Market>,
    pools: HashMap<(String, Side), u64>,
    positions: HashMap<(String, String), Position>,
    claimed: HashSet<(String, String)>,
    sequence_numbers: HashMap<String, u64>,
    transactions: HashMap<String, TransactionStatus>,
    stalled: Vec<(String, SignedSubmission)>,
    views: Vec<ViewRequest>,
    submissions: Vec<SignedSubmission>,
    failing_views: HashSet<String>,
    reject_next: Option<String>,
    stall_transactions: bool,
    view_delay: Duration,
    settle_admin: Option<String>,
    version: u64,
}

impl MockState {
    fn now(&self) -> u64 {
        self.now_override.unwrap_or_else(units::now_ledger)
    }

    fn pool_balance(&self, market_id: &str, side: Side) -> u64 {
        self.pools
            .get(&(market_id.to_string(), side))
            .copied()
            .unwrap_or(0)
    }
}

/// In-memory ledger implementing [`LedgerRpc`]
#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock seeded with one open market closing a week from now, with some
    /// stake already on both sides.
    pub fn with_demo_market(market_id: &str) -> Self {
        let ledger = Self::new();
        let id = normalize_address(market_id).unwrap_or_else(|_| market_id.to_string());
        let now = units::now_ledger();
        ledger.insert_market(Market {
            id: id.clone(),
            description: "Will the stablecoin campaign pass 1M impressions this week?".to_string(),
            create_time: now,
            close_time: now + DEMO_MARKET_DURATION,
            open: true,
            winning_side: None,
            treasury: None,
            a_pool_id: None,
            b_pool_id: None,
            total_a_effective_stake: 0,
            total_b_effective_stake: 0,
        });
        ledger.set_pool_balance(&id, Side::A, 30 * units::MINOR_UNITS_PER_TOKEN);
        ledger.set_pool_balance(&id, Side::B, 10 * units::MINOR_UNITS_PER_TOKEN);
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge every other reader
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // SEEDING
    // ========================================================================

    pub fn insert_market(&self, market: Market) {
        let mut state = self.lock();
        let id = market.id.clone();
        let mut market = market;
        market.a_pool_id.get_or_insert_with(|| derive_id(&[id.as_bytes(), b"a_pool"]));
        market.b_pool_id.get_or_insert_with(|| derive_id(&[id.as_bytes(), b"b_pool"]));
        state.markets.insert(id, market);
    }

    pub fn set_pool_balance(&self, market_id: &str, side: Side, balance: u64) {
        self.lock().pools.insert((market_id.to_string(), side), balance);
    }

    pub fn insert_position(&self, market_id: &str, position: Position) {
        self.lock()
            .positions
            .insert((market_id.to_string(), position.player.clone()), position);
    }

    /// Marks a market settled without going through a transaction
    pub fn resolve_market(&self, market_id: &str, winner: Side) {
        if let Some(market) = self.lock().markets.get_mut(market_id) {
            market.open = false;
            market.winning_side = Some(winner);
        }
    }

    /// Pins ledger time; `None` follows the wall clock
    pub fn set_now(&self, now: Option<u64>) {
        self.lock().now_override = now;
    }

    /// Only this address may settle; unset means anyone can
    pub fn set_settle_admin(&self, admin: Option<String>) {
        self.lock().settle_admin = admin;
    }

    // ========================================================================
    // FAILURE INJECTION
    // ========================================================================

    /// Every call to the named view function fails with a transport error
    pub fn fail_view(&self, function_name: &str) {
        self.lock().failing_views.insert(function_name.to_string());
    }

    pub fn clear_view_failures(&self) {
        self.lock().failing_views.clear();
    }

    /// Delay applied after a view response is computed. The response reflects
    /// ledger state at call time.
    pub fn set_view_delay(&self, delay: Duration) {
        self.lock().view_delay = delay;
    }

    pub fn reject_next_submission(&self, reason: &str) {
        self.lock().reject_next = Some(reason.to_string());
    }

    /// While set, accepted transactions stay pending and have no effect
    pub fn stall_transactions(&self, stall: bool) {
        self.lock().stall_transactions = stall;
    }

    /// Executes every stalled transaction. Returns how many were released.
    pub fn release_stalled(&self) -> usize {
        let mut state = self.lock();
        let stalled = std::mem::take(&mut state.stalled);
        let count = stalled.len();
        for (hash, submission) in stalled {
            commit(&mut state, hash, &submission);
        }
        count
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    pub fn market(&self, market_id: &str) -> Option<Market> {
        self.lock().markets.get(market_id).cloned()
    }

    pub fn pool_balance(&self, market_id: &str, side: Side) -> u64 {
        self.lock().pool_balance(market_id, side)
    }

    pub fn position(&self, market_id: &str, player: &str) -> Option<Position> {
        self.lock()
            .positions
            .get(&(market_id.to_string(), player.to_string()))
            .cloned()
    }

    pub fn is_claimed(&self, market_id: &str, player: &str) -> bool {
        self.lock()
            .claimed
            .contains(&(market_id.to_string(), player.to_string()))
    }

    pub fn markets(&self) -> Vec<Market> {
        self.lock().markets.values().cloned().collect()
    }

    pub fn recorded_views(&self) -> Vec<ViewRequest> {
        self.lock().views.clone()
    }

    /// Number of calls made to the named view function
    pub fn view_count(&self, function_name: &str) -> usize {
        self.lock()
            .views
            .iter()
            .filter(|v| v.function_name() == function_name)
            .count()
    }

    pub fn submissions(&self) -> Vec<SignedSubmission> {
        self.lock().submissions.clone()
    }
}

impl LedgerRpc for MockLedger {
    async fn view(&self, request: ViewRequest) -> Result<Vec<Value>, LedgerRpcError> {
        let (result, delay) = {
            let mut state = self.lock();
            state.views.push(request.clone());
            let result = if state.failing_views.contains(request.function_name()) {
                Err(LedgerRpcError::RequestFailed(format!(
                    "injected failure for {}",
                    request.function_name()
                )))
            } else {
                answer_view(&state, &request)
            };
            (result, state.view_delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn account_sequence_number(&self, address: &str) -> Result<u64, LedgerRpcError> {
        Ok(self.lock().sequence_numbers.get(address).copied().unwrap_or(0))
    }

    async fn submit_transaction(
        &self,
        submission: SignedSubmission,
    ) -> Result<PendingTransaction, LedgerRpcError> {
        let mut state = self.lock();
        state.submissions.push(submission.clone());

        if let Some(reason) = state.reject_next.take() {
            return Err(LedgerRpcError::Rejected(reason));
        }

        let expected = state
            .sequence_numbers
            .get(&submission.sender)
            .copied()
            .unwrap_or(0);
        let provided: u64 = submission
            .sequence_number
            .parse()
            .map_err(|_| LedgerRpcError::Rejected("INVALID_SEQUENCE_NUMBER".to_string()))?;
        if provided < expected {
            return Err(LedgerRpcError::Rejected("SEQUENCE_NUMBER_TOO_OLD".to_string()));
        }
        if submission.signature.signature.is_empty() {
            return Err(LedgerRpcError::Rejected("INVALID_SIGNATURE".to_string()));
        }
        state.sequence_numbers.insert(submission.sender.clone(), provided + 1);

        let hash = derive_id(&[
            submission.sender.as_bytes(),
            submission.sequence_number.as_bytes(),
            submission.payload.function.as_bytes(),
        ]);
        debug!(
            "[MockLedger] accepted {} from {} as {}",
            submission.payload.function_name(),
            submission.sender,
            hash
        );

        if state.stall_transactions {
            state.transactions.insert(hash.clone(), TransactionStatus::Pending);
            state.stalled.push((hash.clone(), submission));
        } else {
            commit(&mut state, hash.clone(), &submission);
        }

        Ok(PendingTransaction { hash })
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<TransactionStatus, LedgerRpcError> {
        // Unknown hashes look like not-yet-indexed transactions, as on a fullnode
        Ok(self
            .lock()
            .transactions
            .get(hash)
            .cloned()
            .unwrap_or(TransactionStatus::Pending))
    }
}

// ============================================================================
// VIEW FUNCTIONS
// ============================================================================

fn answer_view(state: &MockState, request: &ViewRequest) -> Result<Vec<Value>, LedgerRpcError> {
    let args = &request.arguments;
    match request.function_name() {
        "get_market_info" => {
            let market = lookup_market(state, arg_address(args, 0)?)?;
            let record = MarketRecord::from(market);
            Ok(vec![to_value(&record)?])
        }
        "get_player_position_info" => {
            let player = arg_address(args, 0)?;
            let market_id = arg_address(args, 1)?;
            lookup_market(state, market_id.clone())?;
            let position = state
                .positions
                .get(&(market_id, player))
                .ok_or_else(|| abort("E_POSITION_NOT_FOUND"))?;
            Ok(vec![to_value(&PositionRecord::from(position))?])
        }
        "get_a_pool_balance_amount" => {
            let market = lookup_market(state, arg_address(args, 0)?)?;
            Ok(vec![json!(state.pool_balance(&market.id, Side::A).to_string())])
        }
        "get_b_pool_balance_amount" => {
            let market = lookup_market(state, arg_address(args, 0)?)?;
            Ok(vec![json!(state.pool_balance(&market.id, Side::B).to_string())])
        }
        other => Err(LedgerRpcError::RequestFailed(format!(
            "function {} not found",
            other
        ))),
    }
}

fn lookup_market(state: &MockState, market_id: String) -> Result<&Market, LedgerRpcError> {
    state
        .markets
        .get(&market_id)
        .ok_or_else(|| abort("E_MARKET_NOT_FOUND"))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, LedgerRpcError> {
    serde_json::to_value(value).map_err(|e| LedgerRpcError::InvalidResponse(e.to_string()))
}

fn abort(code: &str) -> LedgerRpcError {
    LedgerRpcError::ViewAborted(format!("Move abort in market: {}", code))
}

// ============================================================================
// ENTRY FUNCTIONS
// ============================================================================

fn commit(state: &mut MockState, hash: String, submission: &SignedSubmission) {
    state.version += 1;
    let version = state.version;
    let status = match execute(state, &submission.sender, &submission.payload) {
        Ok(()) => TransactionStatus::Committed {
            version,
            success: true,
            vm_status: "Executed successfully".to_string(),
        },
        Err(code) => TransactionStatus::Committed {
            version,
            success: false,
            vm_status: format!("Move abort in market: {}", code),
        },
    };
    state.transactions.insert(hash, status);
}

fn execute(
    state: &mut MockState,
    sender: &str,
    payload: &EntryFunctionPayload,
) -> Result<(), String> {
    let args = &payload.arguments;
    let now = state.now();

    match payload.function_name() {
        "create_market" => {
            let description = arg_string(args, 0).map_err(|e| e.to_string())?;
            let close_time = units::unix_secs_to_ledger(arg_u64(args, 1).map_err(|e| e.to_string())?);
            arg_address(args, 2).map_err(|e| e.to_string())?;
            if description.trim().is_empty() {
                return Err("E_EMPTY_DESCRIPTION".to_string());
            }
            if close_time <= now {
                return Err("E_INVALID_CLOSE_TIME".to_string());
            }
            let id = derive_id(&[sender.as_bytes(), description.as_bytes(), &now.to_be_bytes()]);
            state.markets.insert(
                id.clone(),
                Market {
                    id: id.clone(),
                    description,
                    create_time: now,
                    close_time,
                    open: true,
                    winning_side: None,
                    treasury: Some(sender.to_string()),
                    a_pool_id: Some(derive_id(&[id.as_bytes(), b"a_pool"])),
                    b_pool_id: Some(derive_id(&[id.as_bytes(), b"b_pool"])),
                    total_a_effective_stake: 0,
                    total_b_effective_stake: 0,
                },
            );
            Ok(())
        }
        "enter_position" => {
            let market_id = arg_address(args, 0).map_err(|e| e.to_string())?;
            let side = Side::from_direction(arg_bool(args, 1).map_err(|e| e.to_string())?);
            let stake = arg_u64(args, 2).map_err(|e| e.to_string())?;
            let key = (market_id.clone(), sender.to_string());

            let market = state
                .markets
                .get_mut(&market_id)
                .ok_or("E_MARKET_NOT_FOUND")?;
            if !market.open || now >= market.close_time {
                return Err("E_MARKET_CLOSED".to_string());
            }
            if stake == 0 {
                return Err("E_ZERO_STAKE".to_string());
            }
            if state.positions.contains_key(&key) {
                return Err("E_POSITION_EXISTS".to_string());
            }
            let total = match side {
                Side::A => &mut market.total_a_effective_stake,
                Side::B => &mut market.total_b_effective_stake,
            };
            let pool_key = (market_id, side);
            let new_total = total.checked_add(stake).ok_or("E_STAKE_OVERFLOW")?;
            let new_balance = state
                .pools
                .get(&pool_key)
                .copied()
                .unwrap_or(0)
                .checked_add(stake)
                .ok_or("E_STAKE_OVERFLOW")?;
            *total = new_total;
            state.pools.insert(pool_key, new_balance);
            state.positions.insert(
                key,
                Position {
                    player: sender.to_string(),
                    side,
                    stake_amount: stake,
                    effective_stake: stake,
                    create_time: Some(now),
                },
            );
            Ok(())
        }
        "settle_market" => {
            let market_id = arg_address(args, 0).map_err(|e| e.to_string())?;
            let winner = Side::from_direction(arg_bool(args, 1).map_err(|e| e.to_string())?);
            if let Some(admin) = &state.settle_admin {
                if admin != sender {
                    return Err("E_NOT_AUTHORIZED".to_string());
                }
            }
            let market = state
                .markets
                .get_mut(&market_id)
                .ok_or("E_MARKET_NOT_FOUND")?;
            if !market.open {
                return Err("E_MARKET_ALREADY_SETTLED".to_string());
            }
            if now < market.close_time {
                return Err("E_MARKET_NOT_CLOSED".to_string());
            }
            market.open = false;
            market.winning_side = Some(winner);
            Ok(())
        }
        "claim_winnings" => {
            let market_id = arg_address(args, 0).map_err(|e| e.to_string())?;
            let key = (market_id.clone(), sender.to_string());
            let market = state.markets.get(&market_id).ok_or("E_MARKET_NOT_FOUND")?;
            let winner = market.winning_side.ok_or("E_MARKET_NOT_SETTLED")?;
            let position = state.positions.get(&key).ok_or("E_POSITION_NOT_FOUND")?;
            if position.side != winner {
                return Err("E_NOT_WINNER".to_string());
            }
            if !state.claimed.insert(key) {
                return Err("E_ALREADY_CLAIMED".to_string());
            }
            Ok(())
        }
        other => Err(format!("E_FUNCTION_NOT_FOUND({})", other)),
    }
}

// ============================================================================
// ARGUMENT DECODING
// ============================================================================

fn arg(args: &[Value], index: usize) -> Result<&Value, LedgerRpcError> {
    args.get(index)
        .ok_or_else(|| LedgerRpcError::InvalidResponse(format!("missing argument {}", index)))
}

fn arg_string(args: &[Value], index: usize) -> Result<String, LedgerRpcError> {
    arg(args, index)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LedgerRpcError::InvalidResponse(format!("argument {} is not a string", index)))
}

fn arg_address(args: &[Value], index: usize) -> Result<String, LedgerRpcError> {
    let raw = arg_string(args, index)?;
    normalize_address(&raw).map_err(|e| LedgerRpcError::InvalidResponse(e.to_string()))
}

fn arg_u64(args: &[Value], index: usize) -> Result<u64, LedgerRpcError> {
    let value = arg(args, index)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| LedgerRpcError::InvalidResponse(format!("argument {} is not a u64", index)))
}

fn arg_bool(args: &[Value], index: usize) -> Result<bool, LedgerRpcError> {
    arg(args, index)?
        .as_bool()
        .ok_or_else(|| LedgerRpcError::InvalidResponse(format!("argument {} is not a bool", index)))
}

fn derive_id(parts: &[&[u8]]) -> String {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    format!("0x{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::TransactionSignature;

    const MARKET: &str = "0x6aae";
    const PLAYER: &str = "0xb0b";

    fn view(function: &str, arguments: Vec<Value>) -> ViewRequest {
        ViewRequest::new(format!("0x42::market::{}", function), arguments)
    }

    fn submission(sender: &str, seq: u64, function: &str, arguments: Vec<Value>) -> SignedSubmission {
        SignedSubmission {
            sender: sender.to_string(),
            sequence_number: seq.to_string(),
            max_gas_amount: "2000".to_string(),
            gas_unit_price: "100".to_string(),
            expiration_timestamp_secs: "0".to_string(),
            payload: EntryFunctionPayload::new(format!("0x42::market::{}", function), arguments),
            signature: TransactionSignature {
                signature_type: "ed25519_signature".to_string(),
                public_key: "0x01".to_string(),
                signature: "0x02".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_demo_market_views() {
        let ledger = MockLedger::with_demo_market(MARKET);

        let market = ledger.view(view("get_market_info", vec![json!(MARKET)])).await.unwrap();
        assert_eq!(market[0]["status"], true);
        assert_eq!(market[0]["winning_side"], json!({ "vec": [] }));

        let a = ledger
            .view(view("get_a_pool_balance_amount", vec![json!(MARKET)]))
            .await
            .unwrap();
        assert_eq!(a, vec![json!("30000000000")]);
        assert_eq!(ledger.view_count("get_a_pool_balance_amount"), 1);
    }

    #[tokio::test]
    async fn test_missing_entities_abort() {
        let ledger = MockLedger::with_demo_market(MARKET);

        let err = ledger
            .view(view("get_market_info", vec![json!("0x999")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerRpcError::ViewAborted(_)));

        let err = ledger
            .view(view("get_player_position_info", vec![json!(PLAYER), json!(MARKET)]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerRpcError::ViewAborted(_)));
    }

    #[tokio::test]
    async fn test_enter_then_duplicate_rejected_by_execution() {
        let ledger = MockLedger::with_demo_market(MARKET);

        let first = ledger
            .submit_transaction(submission(
                PLAYER,
                0,
                "enter_position",
                vec![json!(MARKET), json!(false), json!("5000000000")],
            ))
            .await
            .unwrap();
        assert!(matches!(
            ledger.transaction_by_hash(&first.hash).await.unwrap(),
            TransactionStatus::Committed { success: true, .. }
        ));
        assert_eq!(ledger.pool_balance(MARKET, Side::B), 15_000_000_000);

        let second = ledger
            .submit_transaction(submission(
                PLAYER,
                1,
                "enter_position",
                vec![json!(MARKET), json!(true), json!("1")],
            ))
            .await
            .unwrap();
        match ledger.transaction_by_hash(&second.hash).await.unwrap() {
            TransactionStatus::Committed { success, vm_status, .. } => {
                assert!(!success);
                assert!(vm_status.contains("E_POSITION_EXISTS"));
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stake_overflow_aborts_without_touching_pools() {
        let ledger = MockLedger::with_demo_market(MARKET);
        let before = ledger.market(MARKET).unwrap();

        let pending = ledger
            .submit_transaction(submission(
                PLAYER,
                0,
                "enter_position",
                vec![json!(MARKET), json!(true), json!("18446744073000000000")],
            ))
            .await
            .unwrap();
        match ledger.transaction_by_hash(&pending.hash).await.unwrap() {
            TransactionStatus::Committed { success, vm_status, .. } => {
                assert!(!success);
                assert!(vm_status.contains("E_STAKE_OVERFLOW"));
            }
            other => panic!("unexpected status {:?}", other),
        }

        assert_eq!(ledger.pool_balance(MARKET, Side::A), 30_000_000_000);
        assert_eq!(ledger.market(MARKET).unwrap(), before);
        assert!(ledger.position(MARKET, PLAYER).is_none());
    }

    #[tokio::test]
    async fn test_stale_sequence_number_rejected() {
        let ledger = MockLedger::with_demo_market(MARKET);
        let args = vec![json!(MARKET)];
        ledger
            .submit_transaction(submission(PLAYER, 0, "claim_winnings", args.clone()))
            .await
            .unwrap();
        let err = ledger
            .submit_transaction(submission(PLAYER, 0, "claim_winnings", args))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerRpcError::Rejected("SEQUENCE_NUMBER_TOO_OLD".into()));
    }

    #[tokio::test]
    async fn test_stalled_transactions_stay_pending_until_released() {
        let ledger = MockLedger::with_demo_market(MARKET);
        ledger.stall_transactions(true);

        let pending = ledger
            .submit_transaction(submission(
                PLAYER,
                0,
                "enter_position",
                vec![json!(MARKET), json!(true), json!("1000")],
            ))
            .await
            .unwrap();
        assert_eq!(
            ledger.transaction_by_hash(&pending.hash).await.unwrap(),
            TransactionStatus::Pending
        );
        assert!(ledger.position(MARKET, PLAYER).is_none());

        assert_eq!(ledger.release_stalled(), 1);
        assert!(ledger.position(MARKET, PLAYER).is_some());
    }

    #[tokio::test]
    async fn test_claim_only_once_for_winner() {
        let ledger = MockLedger::with_demo_market(MARKET);
        ledger.insert_position(
            MARKET,
            Position {
                player: PLAYER.to_string(),
                side: Side::A,
                stake_amount: 10,
                effective_stake: 10,
                create_time: None,
            },
        );
        ledger.resolve_market(MARKET, Side::A);

        let first = ledger
            .submit_transaction(submission(PLAYER, 0, "claim_winnings", vec![json!(MARKET)]))
            .await
            .unwrap();
        let second = ledger
            .submit_transaction(submission(PLAYER, 1, "claim_winnings", vec![json!(MARKET)]))
            .await
            .unwrap();

        assert!(matches!(
            ledger.transaction_by_hash(&first.hash).await.unwrap(),
            TransactionStatus::Committed { success: true, .. }
        ));
        assert!(matches!(
            ledger.transaction_by_hash(&second.hash).await.unwrap(),
            TransactionStatus::Committed { success: false, .. }
        ));
        assert!(ledger.is_claimed(MARKET, PLAYER));
    }
}
