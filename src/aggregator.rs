// ============================================================================
// Market State Aggregator
// ============================================================================
//
// Pure reduction of raw ledger reads into one immutable MarketView.
//
// Status (first matching rule wins):
//   1. winning side present        -> SettledA / SettledB
//   2. market not open             -> ClosedUnsettled
//   3. now >= close_time           -> ClosedUnsettled
//   4. otherwise                   -> Active
//
// Odds: T = a + b. T == 0 gives even odds (1.0 / 1.0). Otherwise each side
// pays T / side_balance, and a side with no stake is pinned to 1.0.
//
// Both `now` and `close_time` are ledger time.
//
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Market, Pool, Position, Side};
use crate::units::{self, TimeRemaining};

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Active,
    ClosedUnsettled,
    SettledA,
    SettledB,
}

impl MarketStatus {
    pub fn winner(&self) -> Option<Side> {
        match self {
            MarketStatus::SettledA => Some(Side::A),
            MarketStatus::SettledB => Some(Side::B),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.winner().is_some()
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarketStatus::Active => "Active",
            MarketStatus::ClosedUnsettled => "Closed, awaiting settlement",
            MarketStatus::SettledA => "Settled: Side A wins",
            MarketStatus::SettledB => "Settled: Side B wins",
        }
    }
}

pub fn derive_status(market: &Market, now: u64) -> MarketStatus {
    match market.winning_side {
        Some(Side::A) => MarketStatus::SettledA,
        Some(Side::B) => MarketStatus::SettledB,
        None if !market.open => MarketStatus::ClosedUnsettled,
        None if now >= market.close_time => MarketStatus::ClosedUnsettled,
        None => MarketStatus::Active,
    }
}

// ============================================================================
// ODDS
// ============================================================================

/// Payout multipliers per side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    pub a: f64,
    pub b: f64,
}

pub fn compute_odds(pool_a: u64, pool_b: u64) -> Odds {
    let total = u128::from(pool_a) + u128::from(pool_b);
    if total == 0 {
        return Odds { a: 1.0, b: 1.0 };
    }
    let side_odds = |balance: u64| {
        if balance > 0 {
            total as f64 / balance as f64
        } else {
            1.0
        }
    };
    Odds {
        a: side_odds(pool_a),
        b: side_odds(pool_b),
    }
}

/// Percentage of total stake on each side; 50/50 when nothing is staked
pub fn pool_shares(pool_a: u64, pool_b: u64) -> (f64, f64) {
    let total = u128::from(pool_a) + u128::from(pool_b);
    if total == 0 {
        return (50.0, 50.0);
    }
    let a = pool_a as f64 / total as f64 * 100.0;
    (a, 100.0 - a)
}

// ============================================================================
// ELIGIBILITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub can_enter_position: bool,
    pub can_claim_winnings: bool,
    pub can_settle: bool,
}

/// Settlement is only gated on a connected caller and an open market; any
/// further authorization is enforced by the ledger.
pub fn eligibility(
    market: &Market,
    status: MarketStatus,
    position: Option<&Position>,
    connected: bool,
) -> Eligibility {
    let can_claim_winnings = match (position, status.winner()) {
        (Some(position), Some(winner)) => position.side == winner,
        _ => false,
    };

    Eligibility {
        can_enter_position: status == MarketStatus::Active && connected,
        can_claim_winnings,
        can_settle: connected && market.open,
    }
}

// ============================================================================
// VIEW MODEL
// ============================================================================

/// Everything one refresh cycle read. Pools and position may be missing.
#[derive(Debug, Clone)]
pub struct AggregateInput {
    pub market: Market,
    pub pool_a: Option<Pool>,
    pub pool_b: Option<Pool>,
    pub position: Option<Position>,
    pub caller: Option<String>,
    /// Ledger time
    pub now: u64,
    pub sequence: u64,
}

impl AggregateInput {
    pub fn new(market: Market, now: u64) -> Self {
        Self {
            market,
            pool_a: None,
            pool_b: None,
            position: None,
            caller: None,
            now,
            sequence: 0,
        }
    }

    pub fn with_pools(mut self, balance_a: u64, balance_b: u64) -> Self {
        self.pool_a = Some(Pool { side: Side::A, balance: balance_a });
        self.pool_b = Some(Pool { side: Side::B, balance: balance_b });
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }
}

/// Immutable snapshot of one market as seen by one caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketView {
    pub market: Market,
    pub pool_a: Pool,
    pub pool_b: Pool,
    pub position: Option<Position>,
    pub caller: Option<String>,
    pub status: MarketStatus,
    pub odds_a: f64,
    pub odds_b: f64,
    pub can_enter_position: bool,
    pub can_claim_winnings: bool,
    pub can_settle: bool,
    pub total_stake: u64,
    pub share_a_pct: f64,
    pub share_b_pct: f64,
    pub time_remaining: TimeRemaining,
    /// Ledger time the view was derived at
    pub now: u64,
    /// Refresh cycle that produced this view
    pub sequence: u64,
    pub built_at: DateTime<Utc>,
}

impl MarketView {
    pub fn pool(&self, side: Side) -> &Pool {
        match side {
            Side::A => &self.pool_a,
            Side::B => &self.pool_b,
        }
    }

    pub fn odds(&self, side: Side) -> f64 {
        match side {
            Side::A => self.odds_a,
            Side::B => self.odds_b,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.caller.is_some()
    }
}

pub fn aggregate(input: AggregateInput) -> MarketView {
    let AggregateInput {
        market,
        pool_a,
        pool_b,
        position,
        caller,
        now,
        sequence,
    } = input;

    let pool_a = pool_a.unwrap_or(Pool::empty(Side::A));
    let pool_b = pool_b.unwrap_or(Pool::empty(Side::B));

    let status = derive_status(&market, now);
    let odds = compute_odds(pool_a.balance, pool_b.balance);
    let (share_a_pct, share_b_pct) = pool_shares(pool_a.balance, pool_b.balance);
    let flags = eligibility(&market, status, position.as_ref(), caller.is_some());
    let time_remaining = units::time_remaining(market.close_time, now);

    MarketView {
        total_stake: pool_a.balance.saturating_add(pool_b.balance),
        pool_a,
        pool_b,
        position,
        caller,
        status,
        odds_a: odds.a,
        odds_b: odds.b,
        can_enter_position: flags.can_enter_position,
        can_claim_winnings: flags.can_claim_winnings,
        can_settle: flags.can_settle,
        share_a_pct,
        share_b_pct,
        time_remaining,
        now,
        sequence,
        built_at: Utc::now(),
        market,
    }
}
