//! Ledger gateways: typed reads and the sign/submit/await write path.

pub mod read;
pub mod write;

pub use read::LedgerReadGateway;
pub use write::{FinalityPolicy, FinalityResult, LedgerWriteGateway};
