// Raw ledger entities and their wire representations.
//
// View functions return Move structs as JSON: u64 values arrive as decimal
// strings and Option<T> arrives as {"vec": [..]}.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MarketError;

// ============================================================================
// SIDE
// ============================================================================

/// Outcome side. A is the bullish / "yes" side, B the bearish / "no" side.
/// On the wire a side is the boolean `direction`, `true` meaning A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn from_direction(direction: bool) -> Self {
        if direction {
            Side::A
        } else {
            Side::B
        }
    }

    pub fn as_direction(&self) -> bool {
        matches!(self, Side::A)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::A => "Side A (Yes)",
            Side::B => "Side B (No)",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::A => write!(f, "bullish"),
            Side::B => write!(f, "bearish"),
        }
    }
}

// ============================================================================
// ADDRESSES
// ============================================================================

/// Normalizes a ledger address or object handle to lowercase `0x` hex.
/// Only well-formedness is checked, never existence.
pub fn normalize_address(raw: &str) -> Result<String, MarketError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MarketError::validation("address is empty"));
    }
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| MarketError::validation(format!("address '{}' must start with 0x", trimmed)))?;
    if hex_part.is_empty() || hex_part.len() > 64 {
        return Err(MarketError::validation(format!("address '{}' has invalid length", trimmed)));
    }
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(MarketError::validation(format!("address '{}' is not hex", trimmed)));
    }
    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

// ============================================================================
// MOVE WIRE HELPERS
// ============================================================================

/// Move u64, serialized as a decimal string and accepted as string or number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveU64(pub u64);

impl Serialize for MoveU64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for MoveU64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(MoveU64(n)),
            Raw::Text(s) => s
                .parse::<u64>()
                .map(MoveU64)
                .map_err(|e| serde::de::Error::custom(format!("invalid u64 '{}': {}", s, e))),
        }
    }
}

/// Move Option<T>: `{"vec": []}` / `{"vec": [x]}`, with plain null/value accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveOption<T> {
    Wrapped { vec: Vec<T> },
    Plain(Option<T>),
}

impl<T> MoveOption<T> {
    pub fn some(value: T) -> Self {
        MoveOption::Wrapped { vec: vec![value] }
    }

    pub fn none() -> Self {
        MoveOption::Wrapped { vec: Vec::new() }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            MoveOption::Wrapped { vec } => vec.into_iter().next(),
            MoveOption::Plain(value) => value,
        }
    }
}

impl<T> Default for MoveOption<T> {
    fn default() -> Self {
        MoveOption::none()
    }
}

// ============================================================================
// MARKET
// ============================================================================

/// One prediction question as read from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub description: String,
    /// Ledger time (microseconds)
    pub create_time: u64,
    /// Ledger time (microseconds)
    pub close_time: u64,
    /// Ledger-maintained status flag, independent of close time
    pub open: bool,
    pub winning_side: Option<Side>,
    pub treasury: Option<String>,
    pub a_pool_id: Option<String>,
    pub b_pool_id: Option<String>,
    pub total_a_effective_stake: u64,
    pub total_b_effective_stake: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRef {
    pub id: String,
}

/// `MarketView` struct as returned by `get_market_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub treasury: Option<String>,
    #[serde(default)]
    pub winning_side: MoveOption<bool>,
    pub create_time: MoveU64,
    pub close_time: MoveU64,
    #[serde(default)]
    pub a_pool: Option<PoolRef>,
    #[serde(default)]
    pub b_pool: Option<PoolRef>,
    #[serde(default)]
    pub total_a_effective_stake: MoveU64,
    #[serde(default)]
    pub total_b_effective_stake: MoveU64,
    /// `true` while the market is open
    pub status: bool,
}

impl From<MarketRecord> for Market {
    fn from(record: MarketRecord) -> Self {
        Market {
            id: normalize_address(&record.id).unwrap_or(record.id),
            description: record.description,
            create_time: record.create_time.0,
            close_time: record.close_time.0,
            open: record.status,
            winning_side: record.winning_side.into_option().map(Side::from_direction),
            treasury: record.treasury,
            a_pool_id: record.a_pool.map(|p| p.id),
            b_pool_id: record.b_pool.map(|p| p.id),
            total_a_effective_stake: record.total_a_effective_stake.0,
            total_b_effective_stake: record.total_b_effective_stake.0,
        }
    }
}

impl From<&Market> for MarketRecord {
    fn from(market: &Market) -> Self {
        MarketRecord {
            id: market.id.clone(),
            description: market.description.clone(),
            treasury: market.treasury.clone(),
            winning_side: market
                .winning_side
                .map(|s| MoveOption::some(s.as_direction()))
                .unwrap_or_default(),
            create_time: MoveU64(market.create_time),
            close_time: MoveU64(market.close_time),
            a_pool: market.a_pool_id.clone().map(|id| PoolRef { id }),
            b_pool: market.b_pool_id.clone().map(|id| PoolRef { id }),
            total_a_effective_stake: MoveU64(market.total_a_effective_stake),
            total_b_effective_stake: MoveU64(market.total_b_effective_stake),
            status: market.open,
        }
    }
}

// ============================================================================
// POOL
// ============================================================================

/// Staked value backing one side of a market, in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub side: Side,
    pub balance: u64,
}

impl Pool {
    pub fn empty(side: Side) -> Self {
        Pool { side, balance: 0 }
    }
}

// ============================================================================
// POSITION
// ============================================================================

/// A participant's stake in one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub player: String,
    pub side: Side,
    pub stake_amount: u64,
    pub effective_stake: u64,
    /// Ledger time, when the ledger reports it
    pub create_time: Option<u64>,
}

/// `PositionView` struct as returned by `get_player_position_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub player_address: String,
    pub direction: bool,
    pub stake_amount: MoveU64,
    pub effective_stake: MoveU64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<MoveU64>,
}

impl From<PositionRecord> for Position {
    fn from(record: PositionRecord) -> Self {
        Position {
            player: normalize_address(&record.player_address).unwrap_or(record.player_address),
            side: Side::from_direction(record.direction),
            stake_amount: record.stake_amount.0,
            effective_stake: record.effective_stake.0,
            create_time: record.create_time.map(|t| t.0),
        }
    }
}

impl From<&Position> for PositionRecord {
    fn from(position: &Position) -> Self {
        PositionRecord {
            player_address: position.player.clone(),
            direction: position.side.as_direction(),
            stake_amount: MoveU64(position.stake_amount),
            effective_stake: MoveU64(position.effective_stake),
            create_time: position.create_time.map(MoveU64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address(" 0xABCdef ").unwrap(), "0xabcdef");
        assert_eq!(normalize_address("0X1").unwrap(), "0x1");
        let too_long = format!("0x{}", "a".repeat(65));
        for bad in ["", "abc", "0x", "0xzz", too_long.as_str()] {
            assert!(normalize_address(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_decode_market_record() {
        let raw = json!({
            "id": "0x6AAE",
            "description": "Will the stablecoin campaign reach 1M impressions?",
            "treasury": "0xfeed",
            "winning_side": { "vec": [false] },
            "create_time": "1751371200000000",
            "close_time": 1751457600000000u64,
            "a_pool": { "id": "0xa1" },
            "b_pool": { "id": "0xb1" },
            "total_a_effective_stake": "300",
            "total_b_effective_stake": "100",
            "status": false
        });

        let market: Market = serde_json::from_value::<MarketRecord>(raw).unwrap().into();
        assert_eq!(market.id, "0x6aae");
        assert_eq!(market.create_time, 1_751_371_200_000_000);
        assert_eq!(market.close_time, 1_751_457_600_000_000);
        assert!(!market.open);
        assert_eq!(market.winning_side, Some(Side::B));
        assert_eq!(market.a_pool_id.as_deref(), Some("0xa1"));
        assert_eq!(market.total_a_effective_stake, 300);
    }

    #[test]
    fn test_unresolved_winner_forms() {
        for winner in [json!({ "vec": [] }), json!(null)] {
            let raw = json!({
                "id": "0x1",
                "description": "q",
                "winning_side": winner,
                "create_time": "1",
                "close_time": "2",
                "status": true
            });
            let market: Market = serde_json::from_value::<MarketRecord>(raw).unwrap().into();
            assert_eq!(market.winning_side, None);
        }
    }

    #[test]
    fn test_bad_u64_is_a_decode_error() {
        let raw = json!({
            "id": "0x1",
            "description": "q",
            "create_time": "soon",
            "close_time": "2",
            "status": true
        });
        assert!(serde_json::from_value::<MarketRecord>(raw).is_err());
    }

    #[test]
    fn test_decode_position_record() {
        let raw = json!({
            "player_address": "0xB0B",
            "direction": true,
            "stake_amount": "2000000000",
            "effective_stake": "1900000000"
        });
        let position: Position = serde_json::from_value::<PositionRecord>(raw).unwrap().into();
        assert_eq!(position.player, "0xb0b");
        assert_eq!(position.side, Side::A);
        assert_eq!(position.stake_amount, 2_000_000_000);
        assert_eq!(position.effective_stake, 1_900_000_000);
        assert_eq!(position.create_time, None);
    }

    #[test]
    fn test_market_record_encodes_move_types() {
        let market = Market {
            id: "0x1".into(),
            description: "q".into(),
            create_time: 10,
            close_time: 20,
            open: false,
            winning_side: Some(Side::A),
            treasury: None,
            a_pool_id: None,
            b_pool_id: None,
            total_a_effective_stake: 0,
            total_b_effective_stake: 0,
        };
        let value = serde_json::to_value(MarketRecord::from(&market)).unwrap();
        assert_eq!(value["close_time"], "20");
        assert_eq!(value["winning_side"], json!({ "vec": [true] }));
        assert_eq!(value["status"], false);
    }

    #[test]
    fn test_side_direction() {
        assert_eq!(Side::from_direction(true), Side::A);
        assert_eq!(Side::from_direction(false), Side::B);
        assert!(Side::A.as_direction());
        assert_eq!(Side::B.label(), "Side B (No)");
    }
}
