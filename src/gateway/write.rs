// ============================================================================
// Ledger Write Gateway
// ============================================================================
//
// Sign, submit, then wait for finality. The outcome is one of committed,
// rejected or unknown; a timeout is never reported as success or failure.
// No retries: resubmitting a write whose first attempt is still unknown
// could apply it twice.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::actions::{MarketAction, ModuleRef};
use crate::error::MarketError;
use crate::rpc::{LedgerRpc, TransactionStatus};
use crate::signer::Signer;

pub const DEFAULT_FINALITY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FINALITY_POLL_MS: u64 = 500;

/// How long to wait for a submitted transaction to become final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalityPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for FinalityPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_FINALITY_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_FINALITY_POLL_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FinalityResult {
    /// Final and successfully executed
    Committed { hash: String, version: u64 },
    /// Refused at submission (`hash` absent) or executed and aborted
    Rejected { hash: Option<String>, reason: String },
    /// Confirmation never observed; the ledger may still apply it
    Unknown { hash: Option<String>, detail: String },
}

impl FinalityResult {
    pub fn is_committed(&self) -> bool {
        matches!(self, FinalityResult::Committed { .. })
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            FinalityResult::Committed { hash, .. } => Some(hash),
            FinalityResult::Rejected { hash, .. } | FinalityResult::Unknown { hash, .. } => {
                hash.as_deref()
            }
        }
    }

    /// Result view of the outcome: the committed hash, or the matching error
    pub fn into_result(self) -> Result<String, MarketError> {
        match self {
            FinalityResult::Committed { hash, .. } => Ok(hash),
            FinalityResult::Rejected { reason, .. } => Err(MarketError::WriteRejected(reason)),
            FinalityResult::Unknown { hash, detail } => Err(MarketError::FinalityUnknown(match hash {
                Some(hash) => format!("{} ({})", detail, hash),
                None => detail,
            })),
        }
    }
}

pub struct LedgerWriteGateway<R, S> {
    rpc: Arc<R>,
    signer: Arc<S>,
    module: ModuleRef,
    policy: FinalityPolicy,
}

impl<R: LedgerRpc, S: Signer> LedgerWriteGateway<R, S> {
    pub fn new(rpc: Arc<R>, signer: Arc<S>, module: ModuleRef, policy: FinalityPolicy) -> Self {
        Self {
            rpc,
            signer,
            module,
            policy,
        }
    }

    pub fn signer(&self) -> &Arc<S> {
        &self.signer
    }

    /// Submits one action and waits for its outcome. `Err` only when nothing
    /// was sent (no identity, or malformed input caught by the signer).
    pub async fn submit(&self, action: &MarketAction) -> Result<FinalityResult, MarketError> {
        if self.signer.current_address().is_none() {
            return Err(MarketError::NotConnected);
        }

        let payload = action.entry_function(&self.module);
        info!("[WriteGateway] submitting {}", action.name());

        match self.signer.sign_and_submit(payload).await {
            Ok(handle) => Ok(self.wait_for_finality(&handle.hash).await),
            Err(MarketError::WriteRejected(reason)) => Ok(FinalityResult::Rejected { hash: None, reason }),
            Err(MarketError::FinalityUnknown(detail)) => Ok(FinalityResult::Unknown { hash: None, detail }),
            Err(other) => Err(other),
        }
    }

    /// Polls the transaction until it is final or the policy timeout elapses.
    pub async fn wait_for_finality(&self, hash: &str) -> FinalityResult {
        match tokio::time::timeout(self.policy.timeout, self.poll_until_final(hash)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "[WriteGateway] {} not final after {:?}, outcome unknown",
                    hash, self.policy.timeout
                );
                FinalityResult::Unknown {
                    hash: Some(hash.to_string()),
                    detail: format!("not final after {}s", self.policy.timeout.as_secs_f64()),
                }
            }
        }
    }

    async fn poll_until_final(&self, hash: &str) -> FinalityResult {
        loop {
            match self.rpc.transaction_by_hash(hash).await {
                Ok(TransactionStatus::Committed {
                    version,
                    success: true,
                    ..
                }) => {
                    info!("[WriteGateway] {} committed at version {}", hash, version);
                    return FinalityResult::Committed {
                        hash: hash.to_string(),
                        version,
                    };
                }
                Ok(TransactionStatus::Committed {
                    success: false,
                    vm_status,
                    ..
                }) => {
                    warn!("[WriteGateway] {} failed: {}", hash, vm_status);
                    return FinalityResult::Rejected {
                        hash: Some(hash.to_string()),
                        reason: vm_status,
                    };
                }
                Ok(TransactionStatus::Pending) => {}
                // Keep polling; only the timeout ends the wait
                Err(e) => debug!("[WriteGateway] status lookup for {} failed: {}", hash, e),
            }
            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }
}
