// ============================================================================
// RPC Module - Ledger Communication
// ============================================================================
//
// This module handles all communication with the ledger fullnode: view calls,
// transaction submission and transaction status lookups.
//
// Components:
//   - ledger_rpc: REST client, wire types and the LedgerRpc trait
//   - mock_ledger: in-memory ledger for mock mode and tests
//
// ============================================================================

pub mod ledger_rpc;
pub mod mock_ledger;

pub use ledger_rpc::*;
pub use mock_ledger::MockLedger;
