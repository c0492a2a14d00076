// ============================================================================
// Orchestration Loop - MarketController
// ============================================================================
//
// Owns the one piece of shared mutable state: an Arc<ControllerState>
// snapshot published on a watch channel and always replaced whole.
//
// Refresh cycle:
//   1. take a new sequence token, mark the snapshot as refreshing
//   2. read market, pool A, pool B and (when connected) the position
//      concurrently
//   3. market failure   -> Failed
//      pool failure     -> zero balance + warning
//      position failure -> absent + warning (absence itself is not a failure)
//   4. commit only if no newer cycle has committed already
//
// Write actions validate locally, submit through the write gateway, publish
// a notification, then run exactly one refresh. The view is never updated
// optimistically.
//
// ============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::actions::{MarketAction, ModuleRef};
use crate::aggregator::{aggregate, AggregateInput, MarketView};
use crate::config::ClientConfig;
use crate::error::MarketError;
use crate::gateway::{FinalityPolicy, FinalityResult, LedgerReadGateway, LedgerWriteGateway};
use crate::models::{normalize_address, Side};
use crate::rpc::LedgerRpc;
use crate::signer::Signer;
use crate::units;

/// Source of "now" in ledger time
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

const NOTIFICATION_CAPACITY: usize = 64;

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshFailure {
    pub error: MarketError,
    pub message: String,
}

impl From<MarketError> for RefreshFailure {
    fn from(error: MarketError) -> Self {
        let message = match &error {
            MarketError::NotFound(_) => "Market not found".to_string(),
            other => other.to_string(),
        };
        RefreshFailure { error, message }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Loading,
    Ready(Arc<MarketView>),
    Failed(RefreshFailure),
}

/// Outcome of the most recent write action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionReport {
    pub action: MarketAction,
    pub result: FinalityResult,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerState {
    pub phase: Phase,
    /// A cycle is in flight; a previous `Ready` view stays visible meanwhile
    pub refreshing: bool,
    /// Degradations from the last committed cycle
    pub warnings: Vec<String>,
    pub last_action: Option<ActionReport>,
    /// Sequence token of the last committed cycle
    pub committed_sequence: u64,
}

impl ControllerState {
    fn initial() -> Self {
        Self {
            phase: Phase::Idle,
            refreshing: false,
            warnings: Vec::new(),
            last_action: None,
            committed_sequence: 0,
        }
    }

    pub fn view(&self) -> Option<&Arc<MarketView>> {
        match &self.phase {
            Phase::Ready(view) => Some(view),
            _ => None,
        }
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    /// Submitted, outcome not observed yet
    Unknown,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
        }
    }

    fn for_result(action: &MarketAction, result: &FinalityResult) -> Self {
        match result {
            FinalityResult::Committed { hash, version } => Notification::new(
                NotificationKind::Success,
                format!("{} confirmed", action.title()),
                format!("Transaction {} committed at version {}", hash, version),
            ),
            FinalityResult::Rejected { reason, .. } => Notification::new(
                NotificationKind::Error,
                format!("{} failed", action.title()),
                reason.clone(),
            ),
            FinalityResult::Unknown { hash, detail } => Notification::new(
                NotificationKind::Unknown,
                format!("{} pending", action.title()),
                format!(
                    "Transaction {} was submitted but not confirmed ({}). Refresh before trying again; resubmitting may apply it twice.",
                    hash.as_deref().unwrap_or("(no hash)"),
                    detail
                ),
            ),
        }
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct MarketController<R, S> {
    market_id: String,
    reads: LedgerReadGateway<R>,
    writes: LedgerWriteGateway<R, S>,
    signer: Arc<S>,
    clock: Clock,
    state_tx: watch::Sender<Arc<ControllerState>>,
    notify_tx: broadcast::Sender<Notification>,
    next_sequence: AtomicU64,
}

impl<R: LedgerRpc, S: Signer> MarketController<R, S> {
    pub fn new(
        rpc: Arc<R>,
        signer: Arc<S>,
        market_id: impl Into<String>,
        module: ModuleRef,
        policy: FinalityPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(ControllerState::initial()));
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            market_id: market_id.into(),
            reads: LedgerReadGateway::new(rpc.clone(), module.clone()),
            writes: LedgerWriteGateway::new(rpc, signer.clone(), module, policy),
            signer,
            clock: Arc::new(units::now_ledger),
            state_tx,
            notify_tx,
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ClientConfig, rpc: Arc<R>, signer: Arc<S>) -> Self {
        Self::new(
            rpc,
            signer,
            config.market_id.clone(),
            config.module_ref(),
            config.finality_policy(),
        )
    }

    /// Replace the ledger-time clock (tests pin time with this)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn signer(&self) -> &Arc<S> {
        &self.signer
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ControllerState>> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<ControllerState> {
        self.state_tx.borrow().clone()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    /// Number of refresh cycles started so far
    pub fn refresh_cycles(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }

    // ========================================================================
    // TRIGGERS
    // ========================================================================

    pub async fn mount(&self) -> Arc<ControllerState> {
        info!("[Controller] mounting market {}", self.market_id);
        self.refresh().await
    }

    pub async fn identity_changed(&self) -> Arc<ControllerState> {
        info!(
            "[Controller] identity changed to {}",
            self.signer.current_address().as_deref().unwrap_or("(disconnected)")
        );
        self.refresh().await
    }

    /// Runs one read cycle and returns the snapshot after it. A cycle
    /// overtaken by a newer one is discarded.
    pub async fn refresh(&self) -> Arc<ControllerState> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;

        self.state_tx.send_modify(|state| {
            let mut next = (**state).clone();
            next.refreshing = true;
            if next.phase == Phase::Idle {
                next.phase = Phase::Loading;
            }
            *state = Arc::new(next);
        });

        let caller = self.signer.current_address();
        let market_id = self.market_id.as_str();
        debug!("[Refresh] cycle {} for {}", sequence, market_id);

        let (market, pool_a, pool_b, position) = tokio::join!(
            self.reads.get_market(market_id),
            self.reads.get_pool_balance(market_id, Side::A),
            self.reads.get_pool_balance(market_id, Side::B),
            async {
                match caller.as_deref() {
                    Some(player) => self.reads.get_position(market_id, player).await,
                    None => Ok(None),
                }
            }
        );

        let mut warnings = Vec::new();
        let phase = match market {
            Err(e) => {
                error!("[Refresh] cycle {} failed reading market: {}", sequence, e);
                Phase::Failed(RefreshFailure::from(e))
            }
            Ok(market) => {
                let mut input = AggregateInput::new(market, (self.clock)());
                input.sequence = sequence;
                input.caller = caller;

                match pool_a {
                    Ok(pool) => input.pool_a = Some(pool),
                    Err(e) => warnings.push(format!("Side A pool balance unavailable: {}", e)),
                }
                match pool_b {
                    Ok(pool) => input.pool_b = Some(pool),
                    Err(e) => warnings.push(format!("Side B pool balance unavailable: {}", e)),
                }
                match position {
                    Ok(position) => input.position = position,
                    Err(e) => warnings.push(format!("Position unavailable: {}", e)),
                }

                Phase::Ready(Arc::new(aggregate(input)))
            }
        };

        self.commit(sequence, phase, warnings);
        self.snapshot()
    }

    fn commit(&self, sequence: u64, phase: Phase, warnings: Vec<String>) {
        let failure = match &phase {
            Phase::Failed(failure) => Some(failure.message.clone()),
            _ => None,
        };
        let published_warnings = warnings.clone();

        let committed = self.state_tx.send_if_modified(|state| {
            if sequence <= state.committed_sequence {
                return false;
            }
            let mut next = (**state).clone();
            next.phase = phase;
            next.warnings = warnings;
            next.committed_sequence = sequence;
            // Read under the channel lock: a cycle started after this load
            // flags `refreshing` again in its own send_modify
            next.refreshing = sequence < self.next_sequence.load(Ordering::SeqCst);
            *state = Arc::new(next);
            true
        });

        if !committed {
            debug!("[Refresh] discarding stale cycle {}", sequence);
            return;
        }

        for warning in published_warnings {
            warn!("[Refresh] {}", warning);
            self.notify(Notification::new(NotificationKind::Warning, "Partial market data", warning));
        }
        if let Some(message) = failure {
            self.notify(Notification::new(NotificationKind::Error, "Could not load market", message));
        }
    }

    fn notify(&self, notification: Notification) {
        // No subscribers is fine
        let _ = self.notify_tx.send(notification);
    }

    // ========================================================================
    // WRITE ACTIONS
    // ========================================================================

    /// `stake` is user text in whole tokens, e.g. "1.5"
    pub async fn enter_position(&self, side: Side, stake: &str) -> Result<FinalityResult, MarketError> {
        self.require_connected("Enter position")?;
        let stake = units::parse_stake(stake).map_err(|e| self.reject_locally("Enter position", e))?;

        self.run_action(MarketAction::EnterPosition {
            market_id: self.market_id.clone(),
            side,
            stake,
        })
        .await
    }

    pub async fn claim_winnings(&self) -> Result<FinalityResult, MarketError> {
        self.require_connected("Claim winnings")?;
        self.run_action(MarketAction::ClaimWinnings {
            market_id: self.market_id.clone(),
        })
        .await
    }

    pub async fn settle_market(&self, winning_side: Side) -> Result<FinalityResult, MarketError> {
        self.require_connected("Settle market")?;
        self.run_action(MarketAction::SettleMarket {
            market_id: self.market_id.clone(),
            winning_side,
        })
        .await
    }

    /// Creates a new market closing at `close_at`, staked in `fa_metadata`.
    pub async fn create_market(
        &self,
        description: &str,
        close_at: DateTime<Utc>,
        fa_metadata: &str,
    ) -> Result<FinalityResult, MarketError> {
        const TITLE: &str = "Create market";
        self.require_connected(TITLE)?;

        let description = description.trim();
        if description.is_empty() {
            return Err(self.reject_locally(TITLE, MarketError::validation("description is required")));
        }
        let close_time_secs =
            units::datetime_to_unix_secs(close_at).map_err(|e| self.reject_locally(TITLE, e))?;
        if units::unix_secs_to_ledger(close_time_secs) <= (self.clock)() {
            return Err(self.reject_locally(
                TITLE,
                MarketError::validation("close time must be in the future"),
            ));
        }
        let fa_metadata = normalize_address(fa_metadata).map_err(|e| self.reject_locally(TITLE, e))?;

        self.run_action(MarketAction::CreateMarket {
            description: description.to_string(),
            close_time_secs,
            fa_metadata,
        })
        .await
    }

    fn require_connected(&self, title: &str) -> Result<(), MarketError> {
        match self.signer.current_address() {
            Some(_) => Ok(()),
            None => Err(self.reject_locally(title, MarketError::NotConnected)),
        }
    }

    /// Failure before anything was sent: notify, no refresh
    fn reject_locally(&self, title: &str, err: MarketError) -> MarketError {
        warn!("[Controller] {} not attempted: {}", title, err);
        let message = match &err {
            MarketError::NotConnected => "Please connect your wallet first".to_string(),
            other => other.to_string(),
        };
        self.notify(Notification::new(NotificationKind::Error, title, message));
        err
    }

    async fn run_action(&self, action: MarketAction) -> Result<FinalityResult, MarketError> {
        let result = match self.writes.submit(&action).await {
            Ok(result) => result,
            Err(e) => return Err(self.reject_locally(action.title(), e)),
        };

        info!("[Controller] {} finished: {:?}", action.name(), result);
        self.notify(Notification::for_result(&action, &result));

        let report = ActionReport {
            action,
            result: result.clone(),
            finished_at: Utc::now(),
        };
        self.state_tx.send_modify(|state| {
            let mut next = (**state).clone();
            next.last_action = Some(report);
            *state = Arc::new(next);
        });

        // Whatever the outcome, show what the ledger now says
        self.refresh().await;
        Ok(result)
    }
}
