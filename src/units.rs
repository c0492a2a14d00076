// ============================================================================
// Unit conversions
// ============================================================================
//
// The ledger keeps timestamps in microseconds and token amounts in integer
// minor units (10^9 per token). Every conversion between those and wall-clock
// or display values goes through this module.
//
// ============================================================================

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::MarketError;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Ledger time units (microseconds) per wall-clock millisecond
pub const LEDGER_MICROS_PER_MILLI: u64 = 1_000;

/// Ledger time units per Unix second
pub const LEDGER_MICROS_PER_SEC: u64 = 1_000 * LEDGER_MICROS_PER_MILLI;

/// Number of decimal places in a token amount
pub const TOKEN_DECIMALS: u32 = 9;

/// Minor units per whole token
pub const MINOR_UNITS_PER_TOKEN: u64 = 1_000_000_000;

const MILLIS_PER_HOUR: u64 = 60 * 60 * 1000;
const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;

// ============================================================================
// TIME
// ============================================================================

/// Ledger microseconds -> wall-clock milliseconds
pub fn ledger_to_millis(ledger_time: u64) -> u64 {
    ledger_time / LEDGER_MICROS_PER_MILLI
}

/// Wall-clock milliseconds -> ledger microseconds
pub fn millis_to_ledger(millis: u64) -> u64 {
    millis.saturating_mul(LEDGER_MICROS_PER_MILLI)
}

pub fn ledger_to_datetime(ledger_time: u64) -> Option<DateTime<Utc>> {
    let millis = i64::try_from(ledger_to_millis(ledger_time)).ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Converts a wall-clock instant into ledger time. Instants before the epoch
/// cannot be expressed on the ledger.
pub fn datetime_to_ledger(at: DateTime<Utc>) -> Result<u64, MarketError> {
    let millis = u64::try_from(at.timestamp_millis())
        .map_err(|_| MarketError::validation(format!("time {} is before the epoch", at)))?;
    Ok(millis_to_ledger(millis))
}

/// Wall-clock instant -> whole Unix seconds. `create_market` takes its
/// close time in this unit and stores it scaled to ledger time.
pub fn datetime_to_unix_secs(at: DateTime<Utc>) -> Result<u64, MarketError> {
    u64::try_from(at.timestamp())
        .map_err(|_| MarketError::validation(format!("time {} is before the epoch", at)))
}

/// Unix seconds -> ledger microseconds
pub fn unix_secs_to_ledger(secs: u64) -> u64 {
    secs.saturating_mul(LEDGER_MICROS_PER_SEC)
}

/// Current wall-clock time in ledger units
pub fn now_ledger() -> u64 {
    datetime_to_ledger(Utc::now()).unwrap_or(0)
}

/// Time left before a market closes, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimeRemaining {
    Closed,
    Remaining { days: u64, hours: u64 },
}

impl std::fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeRemaining::Closed => write!(f, "Closed"),
            TimeRemaining::Remaining { days, hours } if *days > 0 => {
                write!(f, "{}d {}h remaining", days, hours)
            }
            TimeRemaining::Remaining { hours, .. } => write!(f, "{}h remaining", hours),
        }
    }
}

/// Both arguments are ledger time; they are converted with the same ratio
/// before subtracting.
pub fn time_remaining(close_time: u64, now: u64) -> TimeRemaining {
    let close_ms = ledger_to_millis(close_time);
    let now_ms = ledger_to_millis(now);
    if close_ms <= now_ms {
        return TimeRemaining::Closed;
    }
    let remaining = close_ms - now_ms;
    TimeRemaining::Remaining {
        days: remaining / MILLIS_PER_DAY,
        hours: (remaining % MILLIS_PER_DAY) / MILLIS_PER_HOUR,
    }
}

// ============================================================================
// TOKEN AMOUNTS
// ============================================================================

/// Minor units -> exact token amount
pub fn minor_to_decimal(minor: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(minor), TOKEN_DECIMALS)
}

/// Whole-token amount -> minor units. Fails on negative values, more
/// precision than the ledger keeps, or overflow.
pub fn decimal_to_minor(amount: Decimal) -> Result<u64, MarketError> {
    if amount.is_sign_negative() {
        return Err(MarketError::validation("amount cannot be negative"));
    }
    if amount.normalize().scale() > TOKEN_DECIMALS {
        return Err(MarketError::validation(format!(
            "amount has more than {} decimal places",
            TOKEN_DECIMALS
        )));
    }
    amount
        .checked_mul(Decimal::from(MINOR_UNITS_PER_TOKEN))
        .and_then(|minor| minor.to_u64())
        .ok_or_else(|| MarketError::validation("amount is too large"))
}

/// Parses a user-entered stake ("1.5") into minor units.
pub fn parse_stake(input: &str) -> Result<u64, MarketError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(MarketError::validation("stake amount is required"));
    }
    let amount = Decimal::from_str(trimmed)
        .map_err(|_| MarketError::validation(format!("stake '{}' is not a number", trimmed)))?;
    if amount <= Decimal::ZERO {
        return Err(MarketError::validation("stake must be greater than zero"));
    }
    decimal_to_minor(amount)
}

/// Display form with two decimal places ("1.50")
pub fn format_stake(minor: u64) -> String {
    let rounded = minor_to_decimal(minor)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ledger_time_round_trip_through_datetime() {
        let at = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let ledger = datetime_to_ledger(at).unwrap();
        assert_eq!(ledger, 1_751_371_200_000_000);
        assert_eq!(ledger_to_millis(ledger), 1_751_371_200_000);
        assert_eq!(ledger_to_datetime(ledger), Some(at));
    }

    #[test]
    fn test_pre_epoch_rejected() {
        let at = Utc.with_ymd_and_hms(1969, 12, 31, 0, 0, 0).unwrap();
        assert!(matches!(datetime_to_ledger(at), Err(MarketError::ValidationFailure(_))));
    }

    #[test]
    fn test_unix_seconds_for_create_market() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(datetime_to_unix_secs(at).unwrap(), 1_893_456_000);
        assert_eq!(unix_secs_to_ledger(1_893_456_000), 1_893_456_000_000_000);
        assert_eq!(unix_secs_to_ledger(1_893_456_000), datetime_to_ledger(at).unwrap());

        // Sub-second precision is dropped, not rounded up
        let late = at + chrono::Duration::milliseconds(999);
        assert_eq!(datetime_to_unix_secs(late).unwrap(), 1_893_456_000);

        let pre_epoch = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            datetime_to_unix_secs(pre_epoch),
            Err(MarketError::ValidationFailure(_))
        ));
    }

    #[test]
    fn test_time_remaining() {
        let now = millis_to_ledger(1_000_000);
        assert_eq!(time_remaining(now, now), TimeRemaining::Closed);
        assert_eq!(time_remaining(now - 1, now), TimeRemaining::Closed);

        let close = now + millis_to_ledger(2 * MILLIS_PER_DAY + 3 * MILLIS_PER_HOUR + 59_000);
        let remaining = time_remaining(close, now);
        assert_eq!(remaining, TimeRemaining::Remaining { days: 2, hours: 3 });
        assert_eq!(remaining.to_string(), "2d 3h remaining");

        let close = now + millis_to_ledger(5 * MILLIS_PER_HOUR);
        assert_eq!(time_remaining(close, now).to_string(), "5h remaining");
        assert_eq!(TimeRemaining::Closed.to_string(), "Closed");
    }

    #[test]
    fn test_parse_stake() {
        assert_eq!(parse_stake("1").unwrap(), 1_000_000_000);
        assert_eq!(parse_stake(" 1.5 ").unwrap(), 1_500_000_000);
        assert_eq!(parse_stake("0.000000001").unwrap(), 1);
        assert_eq!(parse_stake("2.500000000000").unwrap(), 2_500_000_000);
    }

    #[test]
    fn test_parse_stake_rejects_bad_input() {
        for input in ["", "   ", "abc", "1.2.3", "0", "-1", "0.0000000001", "99999999999999999999"] {
            assert!(
                matches!(parse_stake(input), Err(MarketError::ValidationFailure(_))),
                "expected validation failure for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_minor_unit_display() {
        assert_eq!(minor_to_decimal(1_500_000_000), dec!(1.5));
        assert_eq!(minor_to_decimal(0), Decimal::ZERO);
        assert_eq!(format_stake(1_500_000_000), "1.50");
        assert_eq!(format_stake(1_234_567_890), "1.23");
        assert_eq!(format_stake(1_235_000_000), "1.24");
        assert_eq!(format_stake(0), "0.00");
        assert_eq!(decimal_to_minor(dec!(300)).unwrap(), 300_000_000_000);
    }
}
