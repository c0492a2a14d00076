// ============================================================================
// Feed Module - Off-chain Campaign Activity
// ============================================================================
//
// Read-only client for the campaign service: social posts and participant
// records shown next to a market. Feed data never feeds into market status
// or eligibility.
//
// ============================================================================

pub mod campaign_feed;

pub use campaign_feed::*;
