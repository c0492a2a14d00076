/// Signing identity for market writes.
///
/// The client never holds user wallet keys. Writes go through a [`Signer`],
/// which knows the connected address and turns an entry-function payload into
/// a submitted transaction. [`DevKeySigner`] is the local development signer:
/// deterministic Ed25519 keys derived from a seed, so the same names map to
/// the same addresses across restarts.

use chrono::Utc;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::error::MarketError;
use crate::rpc::{
    EntryFunctionPayload, LedgerRpc, LedgerRpcError, SignedSubmission, TransactionSignature,
};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Seed used when none is configured (NEVER use in production!)
pub const DEFAULT_SIGNER_SEED: &str = "INFOMEME_DEV_SIGNER_MASTER_SEED_01";

/// Seconds a signed transaction stays valid
pub const TX_EXPIRY_SECS: i64 = 600;

pub const MAX_GAS_AMOUNT: u64 = 20_000;
pub const GAS_UNIT_PRICE: u64 = 100;

/// Authentication-key scheme byte for single Ed25519 keys
const ED25519_SCHEME: u8 = 0x00;

// ============================================================================
// SIGNER TRAIT
// ============================================================================

/// Result of a successful submission: the transaction exists on the ledger
/// but is not final yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHandle {
    pub hash: String,
    pub sender: String,
}

pub trait Signer: Send + Sync {
    /// Connected participant address, `None` when disconnected
    fn current_address(&self) -> Option<String>;

    /// Signs and submits. `NotConnected` when no identity is available,
    /// `WriteRejected` when the ledger refuses the transaction up front,
    /// `FinalityUnknown` when the request may or may not have reached it.
    fn sign_and_submit(
        &self,
        payload: EntryFunctionPayload,
    ) -> impl Future<Output = Result<TxHandle, MarketError>> + Send;
}

// ============================================================================
// DEV KEY
// ============================================================================

/// Deterministic Ed25519 identity
#[derive(Clone)]
pub struct DevKey {
    pub name: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    pub address: String,
}

impl DevKey {
    /// Derive a key for `name`: SHA256(seed || name)
    pub fn from_seed(seed: &[u8], name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(name.as_bytes());
        let derived_key: [u8; 32] = hasher.finalize().into();

        let signing_key = SigningKey::from_bytes(&derived_key);
        let verifying_key = signing_key.verifying_key();
        let address = auth_key_address(&verifying_key);

        DevKey {
            name: name.to_string(),
            signing_key,
            verifying_key,
            address,
        }
    }

    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.verifying_key.as_bytes()))
    }

    pub fn sign_hex(&self, message: &[u8]) -> String {
        format!("0x{}", hex::encode(self.signing_key.sign(message).to_bytes()))
    }

    pub fn verify_hex(&self, message: &[u8], signature_hex: &str) -> bool {
        let Ok(bytes) = hex::decode(signature_hex.trim_start_matches("0x")) else {
            return false;
        };
        let Ok(array) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        self.verifying_key
            .verify(message, &Signature::from_bytes(&array))
            .is_ok()
    }
}

impl std::fmt::Debug for DevKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevKey")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}

/// Account address = SHA3-256(public_key || scheme)
fn auth_key_address(key: &VerifyingKey) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(key.as_bytes());
    hasher.update([ED25519_SCHEME]);
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Canonical bytes to sign:
/// SHA256(sender || sequence_number || expiration || payload_json)
pub fn signing_bytes(
    sender: &str,
    sequence_number: u64,
    expiration_secs: u64,
    payload: &EntryFunctionPayload,
) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(sender.as_bytes());
    hasher.update(sequence_number.to_be_bytes());
    hasher.update(expiration_secs.to_be_bytes());
    hasher.update(serde_json::to_vec(payload).unwrap_or_default());
    hasher.finalize().to_vec()
}

// ============================================================================
// DEV KEY SIGNER
// ============================================================================

/// Signs with a local [`DevKey`] and submits through a [`LedgerRpc`].
/// Identity can be switched at runtime.
pub struct DevKeySigner<R> {
    rpc: Arc<R>,
    seed: Vec<u8>,
    key: RwLock<Option<DevKey>>,
}

impl<R: LedgerRpc> DevKeySigner<R> {
    /// Signer with no connected identity
    pub fn disconnected(rpc: Arc<R>, seed: &[u8]) -> Self {
        Self {
            rpc,
            seed: seed.to_vec(),
            key: RwLock::new(None),
        }
    }

    pub fn connected(rpc: Arc<R>, seed: &[u8], name: &str) -> Self {
        let signer = Self::disconnected(rpc, seed);
        signer.connect(name);
        signer
    }

    /// Switches to the identity derived for `name` and returns its address
    pub fn connect(&self, name: &str) -> String {
        let key = DevKey::from_seed(&self.seed, name);
        let address = key.address.clone();
        info!("[Signer] connected '{}' as {}", name, address);
        *self.key.write().unwrap_or_else(|p| p.into_inner()) = Some(key);
        address
    }

    pub fn disconnect(&self) {
        if let Some(key) = self.key.write().unwrap_or_else(|p| p.into_inner()).take() {
            info!("[Signer] disconnected {}", key.address);
        }
    }

    fn current_key(&self) -> Option<DevKey> {
        self.key.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl<R: LedgerRpc> Signer for DevKeySigner<R> {
    fn current_address(&self) -> Option<String> {
        self.current_key().map(|k| k.address)
    }

    async fn sign_and_submit(&self, payload: EntryFunctionPayload) -> Result<TxHandle, MarketError> {
        let key = self.current_key().ok_or(MarketError::NotConnected)?;

        // Nothing has been sent yet, so a failed lookup means "not applied"
        let sequence_number = self
            .rpc
            .account_sequence_number(&key.address)
            .await
            .map_err(|e| {
                MarketError::WriteRejected(format!("could not read account sequence number: {}", e))
            })?;

        let expiration = u64::try_from(Utc::now().timestamp() + TX_EXPIRY_SECS).unwrap_or(0);
        let message = signing_bytes(&key.address, sequence_number, expiration, &payload);
        let function = payload.function_name().to_string();

        let submission = SignedSubmission {
            sender: key.address.clone(),
            sequence_number: sequence_number.to_string(),
            max_gas_amount: MAX_GAS_AMOUNT.to_string(),
            gas_unit_price: GAS_UNIT_PRICE.to_string(),
            expiration_timestamp_secs: expiration.to_string(),
            payload,
            signature: TransactionSignature {
                signature_type: "ed25519_signature".to_string(),
                public_key: key.public_key_hex(),
                signature: key.sign_hex(&message),
            },
        };

        match self.rpc.submit_transaction(submission).await {
            Ok(pending) => {
                info!("[Signer] submitted {} as {}", function, pending.hash);
                Ok(TxHandle {
                    hash: pending.hash,
                    sender: key.address,
                })
            }
            Err(LedgerRpcError::Rejected(reason)) => {
                warn!("[Signer] {} rejected at submission: {}", function, reason);
                Err(MarketError::WriteRejected(reason))
            }
            Err(e) => {
                warn!("[Signer] {} submission outcome unknown: {}", function, e);
                Err(MarketError::FinalityUnknown(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockLedger;
    use serde_json::json;

    fn payload() -> EntryFunctionPayload {
        EntryFunctionPayload::new("0x42::market::claim_winnings".into(), vec![json!("0x1")])
    }

    #[test]
    fn test_deterministic_keys() {
        let alice = DevKey::from_seed(DEFAULT_SIGNER_SEED.as_bytes(), "alice");
        let again = DevKey::from_seed(DEFAULT_SIGNER_SEED.as_bytes(), "alice");
        let bob = DevKey::from_seed(DEFAULT_SIGNER_SEED.as_bytes(), "bob");

        assert_eq!(alice.address, again.address);
        assert_ne!(alice.address, bob.address);
        assert_eq!(alice.address.len(), 66);
        assert!(alice.address.starts_with("0x"));
    }

    #[test]
    fn test_sign_and_verify() {
        let key = DevKey::from_seed(b"seed", "alice");
        let message = signing_bytes(&key.address, 3, 1_700_000_000, &payload());
        let signature = key.sign_hex(&message);

        assert!(key.verify_hex(&message, &signature));
        assert!(!key.verify_hex(b"tampered", &signature));
        assert!(!key.verify_hex(&message, "0xdead"));
    }

    #[test]
    fn test_signing_bytes_depend_on_sequence_number() {
        let a = signing_bytes("0x1", 0, 100, &payload());
        let b = signing_bytes("0x1", 1, 100, &payload());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_disconnected_signer_refuses() {
        let signer = DevKeySigner::disconnected(Arc::new(MockLedger::new()), b"seed");
        assert_eq!(signer.current_address(), None);
        assert_eq!(
            signer.sign_and_submit(payload()).await.unwrap_err(),
            MarketError::NotConnected
        );
    }

    #[tokio::test]
    async fn test_submit_uses_account_sequence_number() {
        let ledger = Arc::new(MockLedger::new());
        let signer = DevKeySigner::connected(ledger.clone(), b"seed", "alice");

        let first = signer.sign_and_submit(payload()).await.unwrap();
        let second = signer.sign_and_submit(payload()).await.unwrap();
        assert_ne!(first.hash, second.hash);

        let submissions = ledger.submissions();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].sequence_number, "0");
        assert_eq!(submissions[1].sequence_number, "1");
        assert_eq!(Some(submissions[0].sender.clone()), signer.current_address());
    }

    #[tokio::test]
    async fn test_rejection_and_identity_switch() {
        let ledger = Arc::new(MockLedger::new());
        let signer = DevKeySigner::connected(ledger.clone(), b"seed", "alice");
        let alice = signer.current_address();

        ledger.reject_next_submission("INSUFFICIENT_BALANCE_FOR_TRANSACTION_FEE");
        assert!(matches!(
            signer.sign_and_submit(payload()).await,
            Err(MarketError::WriteRejected(_))
        ));

        let bob = signer.connect("bob");
        assert_ne!(Some(bob), alice);
        signer.disconnect();
        assert_eq!(signer.current_address(), None);
    }
}
