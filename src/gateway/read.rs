// ============================================================================
// Ledger Read Gateway
// ============================================================================
//
// Typed, side-effect-free reads of market state. Identifiers are checked for
// well-formedness before any call; existence is the ledger's business.
//
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::actions::{
    ModuleRef, GET_A_POOL_BALANCE, GET_B_POOL_BALANCE, GET_MARKET_INFO, GET_PLAYER_POSITION_INFO,
};
use crate::error::MarketError;
use crate::models::{normalize_address, Market, MarketRecord, MoveU64, Pool, Position, PositionRecord, Side};
use crate::rpc::{LedgerRpc, LedgerRpcError};

pub struct LedgerReadGateway<R> {
    rpc: Arc<R>,
    module: ModuleRef,
}

impl<R: LedgerRpc> LedgerReadGateway<R> {
    pub fn new(rpc: Arc<R>, module: ModuleRef) -> Self {
        Self { rpc, module }
    }

    /// A missing market is `NotFound`; every other failure is `ReadFailure`.
    pub async fn get_market(&self, market_id: &str) -> Result<Market, MarketError> {
        let id = normalize_address(market_id)?;
        let values = self
            .rpc
            .view(self.module.view(GET_MARKET_INFO, vec![json!(id)]))
            .await
            .map_err(|e| match e {
                LedgerRpcError::ViewAborted(_) | LedgerRpcError::NotFound(_) => {
                    MarketError::NotFound(format!("market {}", id))
                }
                other => MarketError::ReadFailure(other.to_string()),
            })?;

        let record: MarketRecord = decode_first(values, GET_MARKET_INFO)?;
        Ok(record.into())
    }

    /// `Ok(None)` when the participant holds no position in this market.
    pub async fn get_position(
        &self,
        market_id: &str,
        participant: &str,
    ) -> Result<Option<Position>, MarketError> {
        let market = normalize_address(market_id)?;
        let player = normalize_address(participant)?;

        let request = self
            .module
            .view(GET_PLAYER_POSITION_INFO, vec![json!(player), json!(market)]);
        let values = match self.rpc.view(request).await {
            Ok(values) => values,
            Err(e @ LedgerRpcError::ViewAborted(_)) | Err(e @ LedgerRpcError::NotFound(_)) => {
                if is_missing_position(&e) {
                    debug!("[ReadGateway] no position for {} in {}", player, market);
                } else {
                    warn!(
                        "[ReadGateway] position view for {} in {} failed for another reason, treating as no position: {}",
                        player, market, e
                    );
                }
                return Ok(None);
            }
            Err(e) => return Err(MarketError::ReadFailure(e.to_string())),
        };

        let record: PositionRecord = decode_first(values, GET_PLAYER_POSITION_INFO)?;
        Ok(Some(record.into()))
    }

    pub async fn get_pool_balance(&self, market_id: &str, side: Side) -> Result<Pool, MarketError> {
        let id = normalize_address(market_id)?;
        let function = match side {
            Side::A => GET_A_POOL_BALANCE,
            Side::B => GET_B_POOL_BALANCE,
        };

        let values = self.rpc.view(self.module.view(function, vec![json!(id)])).await?;
        let balance: MoveU64 = decode_first(values, function)?;
        Ok(Pool {
            side,
            balance: balance.0,
        })
    }
}

/// Abort code the market module raises when a participant has no position
pub const POSITION_NOT_FOUND_ABORT: &str = "E_POSITION_NOT_FOUND";

/// True only for the module's own "no position" abort. A 404 (wrong module
/// or function) or any other abort is a different problem.
fn is_missing_position(err: &LedgerRpcError) -> bool {
    matches!(err, LedgerRpcError::ViewAborted(message) if message.contains(POSITION_NOT_FOUND_ABORT))
}

/// View functions return a list of values; every market view returns one.
fn decode_first<T: DeserializeOwned>(values: Vec<Value>, function: &str) -> Result<T, MarketError> {
    let first = values
        .into_iter()
        .next()
        .ok_or_else(|| MarketError::ReadFailure(format!("{} returned no values", function)))?;
    serde_json::from_value(first)
        .map_err(|e| MarketError::ReadFailure(format!("could not decode {}: {}", function, e)))
}
