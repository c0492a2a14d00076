// ============================================================================
// Market actions - entry-function payloads for the market module
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::Side;
use crate::rpc::{EntryFunctionPayload, ViewRequest};

/// Address the market module is published under
pub const DEFAULT_MODULE_ADDRESS: &str =
    "0x42c1c1c959c6739a3c17fdf5e6e22d85bb5e3834e47c5830330dbce0a0c486b7";

pub const DEFAULT_MODULE_NAME: &str = "market";

// Entry functions
pub const CREATE_MARKET: &str = "create_market";
pub const ENTER_POSITION: &str = "enter_position";
pub const SETTLE_MARKET: &str = "settle_market";
pub const CLAIM_WINNINGS: &str = "claim_winnings";

// View functions
pub const GET_MARKET_INFO: &str = "get_market_info";
pub const GET_PLAYER_POSITION_INFO: &str = "get_player_position_info";
pub const GET_A_POOL_BALANCE: &str = "get_a_pool_balance_amount";
pub const GET_B_POOL_BALANCE: &str = "get_b_pool_balance_amount";

/// Where the market program lives on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    pub address: String,
    pub module: String,
}

impl ModuleRef {
    pub fn new(address: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            module: module.into(),
        }
    }

    /// Fully qualified `<address>::<module>::<name>`
    pub fn function(&self, name: &str) -> String {
        format!("{}::{}::{}", self.address, self.module, name)
    }

    pub fn view(&self, name: &str, arguments: Vec<Value>) -> ViewRequest {
        ViewRequest::new(self.function(name), arguments)
    }
}

impl Default for ModuleRef {
    fn default() -> Self {
        Self::new(DEFAULT_MODULE_ADDRESS, DEFAULT_MODULE_NAME)
    }
}

/// A user-initiated state change. Amounts are minor units and the new
/// market's close time is Unix seconds; conversion from user input happens
/// before an action is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MarketAction {
    CreateMarket {
        description: String,
        close_time_secs: u64,
        fa_metadata: String,
    },
    EnterPosition {
        market_id: String,
        side: Side,
        stake: u64,
    },
    SettleMarket {
        market_id: String,
        winning_side: Side,
    },
    ClaimWinnings {
        market_id: String,
    },
}

impl MarketAction {
    /// Entry function this action calls
    pub fn name(&self) -> &'static str {
        match self {
            MarketAction::CreateMarket { .. } => CREATE_MARKET,
            MarketAction::EnterPosition { .. } => ENTER_POSITION,
            MarketAction::SettleMarket { .. } => SETTLE_MARKET,
            MarketAction::ClaimWinnings { .. } => CLAIM_WINNINGS,
        }
    }

    /// Human-readable label for notifications
    pub fn title(&self) -> &'static str {
        match self {
            MarketAction::CreateMarket { .. } => "Create market",
            MarketAction::EnterPosition { .. } => "Enter position",
            MarketAction::SettleMarket { .. } => "Settle market",
            MarketAction::ClaimWinnings { .. } => "Claim winnings",
        }
    }

    /// Positional arguments in the order the module declares them. u64 values
    /// are sent as decimal strings.
    pub fn entry_function(&self, module: &ModuleRef) -> EntryFunctionPayload {
        let arguments = match self {
            MarketAction::CreateMarket {
                description,
                close_time_secs,
                fa_metadata,
            } => vec![
                json!(description),
                json!(close_time_secs.to_string()),
                json!(fa_metadata),
            ],
            MarketAction::EnterPosition {
                market_id,
                side,
                stake,
            } => vec![
                json!(market_id),
                json!(side.as_direction()),
                json!(stake.to_string()),
            ],
            MarketAction::SettleMarket {
                market_id,
                winning_side,
            } => vec![json!(market_id), json!(winning_side.as_direction())],
            MarketAction::ClaimWinnings { market_id } => vec![json!(market_id)],
        };

        EntryFunctionPayload::new(module.function(self.name()), arguments)
    }
}
