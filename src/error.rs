// ============================================================================
// Error taxonomy for market reads, writes and local validation
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::rpc::LedgerRpcError;

/// Every failure the client can surface to a caller.
///
/// `NotFound` is only an error for entities that must exist (the market).
/// Position lookups turn it into `None` before it reaches this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MarketError {
    /// Transport or deserialization failure on a view call
    ReadFailure(String),
    /// Entity does not exist on the ledger
    NotFound(String),
    /// Ledger simulation or execution rejected a write
    WriteRejected(String),
    /// Gave up waiting for confirmation; ledger state may still change
    FinalityUnknown(String),
    /// Malformed local input, rejected before any network call
    ValidationFailure(String),
    /// No identity is connected, so the action was never attempted
    NotConnected,
}

impl MarketError {
    /// Short machine-readable label, used in logs and API responses
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::ReadFailure(_) => "read_failure",
            MarketError::NotFound(_) => "not_found",
            MarketError::WriteRejected(_) => "write_rejected",
            MarketError::FinalityUnknown(_) => "finality_unknown",
            MarketError::ValidationFailure(_) => "validation_failure",
            MarketError::NotConnected => "not_connected",
        }
    }

    /// Whether a user-triggered refresh or retry can clear this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MarketError::ReadFailure(_) | MarketError::FinalityUnknown(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        MarketError::ValidationFailure(msg.into())
    }
}

impl std::fmt::Display for MarketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketError::ReadFailure(msg) => write!(f, "Ledger read failed: {}", msg),
            MarketError::NotFound(what) => write!(f, "Not found: {}", what),
            MarketError::WriteRejected(msg) => write!(f, "Transaction rejected: {}", msg),
            MarketError::FinalityUnknown(msg) => write!(f, "Transaction finality unknown: {}", msg),
            MarketError::ValidationFailure(msg) => write!(f, "Invalid input: {}", msg),
            MarketError::NotConnected => write!(f, "Wallet not connected"),
        }
    }
}

impl std::error::Error for MarketError {}

/// Read-path mapping. The write path classifies transport errors itself,
/// because a failed submit may still have reached the ledger.
impl From<LedgerRpcError> for MarketError {
    fn from(err: LedgerRpcError) -> Self {
        match err {
            LedgerRpcError::NotFound(what) => MarketError::NotFound(what),
            LedgerRpcError::ViewAborted(msg) => MarketError::NotFound(msg),
            LedgerRpcError::Rejected(msg) => MarketError::WriteRejected(msg),
            other => MarketError::ReadFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_mapping() {
        assert_eq!(
            MarketError::from(LedgerRpcError::ViewAborted("E_NO_POSITION".into())),
            MarketError::NotFound("E_NO_POSITION".into())
        );
        assert_eq!(
            MarketError::from(LedgerRpcError::Rejected("SEQUENCE_NUMBER_TOO_OLD".into())),
            MarketError::WriteRejected("SEQUENCE_NUMBER_TOO_OLD".into())
        );
        assert!(matches!(
            MarketError::from(LedgerRpcError::RequestFailed("connection refused".into())),
            MarketError::ReadFailure(_)
        ));
        assert!(matches!(
            MarketError::from(LedgerRpcError::Timeout),
            MarketError::ReadFailure(_)
        ));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(MarketError::ReadFailure("x".into()).is_recoverable());
        assert!(MarketError::FinalityUnknown("0xabc".into()).is_recoverable());
        assert!(!MarketError::WriteRejected("x".into()).is_recoverable());
        assert!(!MarketError::NotConnected.is_recoverable());
        assert_eq!(MarketError::NotConnected.kind(), "not_connected");
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(MarketError::validation("stake must be a number")).unwrap();
        assert_eq!(json["kind"], "validation_failure");
        assert_eq!(json["detail"], "stake must be a number");
    }
}
