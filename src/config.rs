// ============================================================================
// Client configuration
// ============================================================================
//
// Environment only, no CLI flags. Every value has a default so the client
// starts against a local fullnode (or the mock ledger) with no setup.
//
// ============================================================================

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::actions::{ModuleRef, DEFAULT_MODULE_ADDRESS, DEFAULT_MODULE_NAME};
use crate::gateway::write::{FinalityPolicy, DEFAULT_FINALITY_POLL_MS, DEFAULT_FINALITY_TIMEOUT_SECS};
use crate::rpc::{HttpLedgerRpc, LedgerBackend, MockLedger, DEFAULT_LEDGER_RPC_URL, DEFAULT_TIMEOUT_SECS};
use crate::signer::DEFAULT_SIGNER_SEED;

/// Market shown by default
pub const DEFAULT_MARKET_ID: &str =
    "0x6aaeea3d012eb3cc9431cc9266e974c627bccc4b200f0fc7bfbd9425cf364ace";

/// Stake token (fungible asset metadata object) for new markets
pub const DEFAULT_FA_METADATA: &str =
    "0xd385ad597a4b14dbd4ad3ab0d1edeb973c2d987f53b9d591b6f0a6f2717a86d0";

pub const DEFAULT_FEED_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_FEED_CAMPAIGN: &str = "stablecoin";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:1234";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub ledger_rpc_url: String,
    pub mock_mode: bool,
    pub module_address: String,
    pub module_name: String,
    pub market_id: String,
    pub fa_metadata: String,
    pub finality_timeout: Duration,
    pub finality_poll_interval: Duration,
    pub rpc_timeout: Duration,
    pub feed_base_url: String,
    pub feed_campaign: String,
    pub signer_seed: String,
    pub bind_addr: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ledger_rpc_url: DEFAULT_LEDGER_RPC_URL.to_string(),
            mock_mode: false,
            module_address: DEFAULT_MODULE_ADDRESS.to_string(),
            module_name: DEFAULT_MODULE_NAME.to_string(),
            market_id: DEFAULT_MARKET_ID.to_string(),
            fa_metadata: DEFAULT_FA_METADATA.to_string(),
            finality_timeout: Duration::from_secs(DEFAULT_FINALITY_TIMEOUT_SECS),
            finality_poll_interval: Duration::from_millis(DEFAULT_FINALITY_POLL_MS),
            rpc_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            feed_base_url: DEFAULT_FEED_BASE_URL.to_string(),
            feed_campaign: DEFAULT_FEED_CAMPAIGN.to_string(),
            signer_seed: DEFAULT_SIGNER_SEED.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load from environment variables (after `.env`, if present)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Mock ledger with a short finality wait (for testing)
    pub fn mock() -> Self {
        Self {
            mock_mode: true,
            finality_timeout: Duration::from_secs(2),
            finality_poll_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).filter(|v| !v.is_empty()).unwrap_or(default);
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| u64::from_str(v.trim()).ok())
                .unwrap_or(default)
        };

        Self {
            ledger_rpc_url: text("LEDGER_RPC_URL", defaults.ledger_rpc_url),
            mock_mode: lookup("LEDGER_MOCK_MODE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            module_address: text("MARKET_MODULE_ADDRESS", defaults.module_address),
            module_name: text("MARKET_MODULE_NAME", defaults.module_name),
            market_id: text("MARKET_ID", defaults.market_id),
            fa_metadata: text("FA_METADATA", defaults.fa_metadata),
            finality_timeout: Duration::from_secs(number(
                "FINALITY_TIMEOUT_SECS",
                DEFAULT_FINALITY_TIMEOUT_SECS,
            )),
            finality_poll_interval: Duration::from_millis(number(
                "FINALITY_POLL_MS",
                DEFAULT_FINALITY_POLL_MS,
            )),
            rpc_timeout: Duration::from_secs(number("RPC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
            feed_base_url: text("FEED_BASE_URL", defaults.feed_base_url),
            feed_campaign: text("FEED_CAMPAIGN", defaults.feed_campaign),
            signer_seed: text("SIGNER_SEED", defaults.signer_seed),
            bind_addr: text("BIND_ADDR", defaults.bind_addr),
        }
    }

    pub fn module_ref(&self) -> ModuleRef {
        ModuleRef::new(self.module_address.clone(), self.module_name.clone())
    }

    pub fn finality_policy(&self) -> FinalityPolicy {
        FinalityPolicy {
            timeout: self.finality_timeout,
            poll_interval: self.finality_poll_interval,
        }
    }

    /// Fullnode client, or a mock ledger seeded with the configured market
    pub fn ledger_backend(&self) -> Arc<LedgerBackend> {
        if self.mock_mode {
            Arc::new(LedgerBackend::Mock(MockLedger::with_demo_market(&self.market_id)))
        } else {
            Arc::new(LedgerBackend::Http(HttpLedgerRpc::new(
                self.ledger_rpc_url.clone(),
                self.rpc_timeout,
            )))
        }
    }
}
