/// Info Meme Market client
/// Reads binary prediction markets from the ledger, reduces them to a view
/// model, and drives signed market actions through to finality.

pub mod actions;
pub mod aggregator;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod signer;
pub mod units;

#[path = "../rpc/mod.rs"]
pub mod rpc;

#[path = "../feed/mod.rs"]
pub mod feed;

pub use actions::{MarketAction, ModuleRef};
pub use aggregator::{aggregate, compute_odds, derive_status, AggregateInput, MarketStatus, MarketView, Odds};
pub use config::ClientConfig;
pub use error::MarketError;
pub use gateway::{FinalityPolicy, FinalityResult, LedgerReadGateway, LedgerWriteGateway};
pub use models::{Market, Pool, Position, Side};
pub use orchestrator::{
    ActionReport, Clock, ControllerState, MarketController, Notification, NotificationKind, Phase,
    RefreshFailure,
};
pub use rpc::{HttpLedgerRpc, LedgerBackend, LedgerRpc, LedgerRpcError, MockLedger};
pub use signer::{DevKey, DevKeySigner, Signer, TxHandle};
pub use feed::{CampaignFeedClient, Participant, Tweet};
