// ============================================================================
// Ledger RPC - fullnode REST transport
// ============================================================================
//
// Typed wrapper over the ledger's REST endpoints. Holds no state besides the
// HTTP client.
//
// Endpoints:
//   POST /view                        - call a view function
//   GET  /accounts/:address           - account sequence number
//   POST /transactions                - submit a signed transaction
//   GET  /transactions/by_hash/:hash  - pending / committed status
//
// ============================================================================

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use super::mock_ledger::MockLedger;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default timeout for ledger RPC calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default ledger RPC URL (local testnet fullnode)
pub const DEFAULT_LEDGER_RPC_URL: &str = "http://localhost:8080/v1";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerRpcError {
    /// HTTP request failed before a response arrived
    RequestFailed(String),
    /// Response body could not be decoded
    InvalidResponse(String),
    /// View function aborted (Move abort, e.g. missing resource)
    ViewAborted(String),
    /// Resource does not exist
    NotFound(String),
    /// Ledger refused a submission (failed validation or simulation)
    Rejected(String),
    /// Timeout waiting for the ledger
    Timeout,
}

impl std::fmt::Display for LedgerRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerRpcError::RequestFailed(msg) => write!(f, "Ledger request failed: {}", msg),
            LedgerRpcError::InvalidResponse(msg) => write!(f, "Invalid ledger response: {}", msg),
            LedgerRpcError::ViewAborted(msg) => write!(f, "View function aborted: {}", msg),
            LedgerRpcError::NotFound(what) => write!(f, "Not found on ledger: {}", what),
            LedgerRpcError::Rejected(msg) => write!(f, "Ledger rejected transaction: {}", msg),
            LedgerRpcError::Timeout => write!(f, "Ledger RPC timeout"),
        }
    }
}

impl std::error::Error for LedgerRpcError {}

impl From<reqwest::Error> for LedgerRpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LedgerRpcError::Timeout
        } else if err.is_decode() {
            LedgerRpcError::InvalidResponse(err.to_string())
        } else {
            LedgerRpcError::RequestFailed(err.to_string())
        }
    }
}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

/// Read-only call: `<address>::<module>::<function>` with positional arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRequest {
    pub function: String,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

impl ViewRequest {
    pub fn new(function: String, arguments: Vec<Value>) -> Self {
        Self {
            function,
            type_arguments: Vec::new(),
            arguments,
        }
    }

    /// Last path segment of the function identifier
    pub fn function_name(&self) -> &str {
        short_name(&self.function)
    }
}

/// Entry-function call to be signed and submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    pub function: String,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

impl EntryFunctionPayload {
    pub fn new(function: String, arguments: Vec<Value>) -> Self {
        Self {
            payload_type: "entry_function_payload".to_string(),
            function,
            type_arguments: Vec::new(),
            arguments,
        }
    }

    pub fn function_name(&self) -> &str {
        short_name(&self.function)
    }
}

fn short_name(function: &str) -> &str {
    function.rsplit("::").next().unwrap_or(function)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSignature {
    #[serde(rename = "type")]
    pub signature_type: String,
    pub public_key: String,
    pub signature: String,
}

/// Signed transaction body for `POST /transactions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedSubmission {
    pub sender: String,
    pub sequence_number: String,
    pub max_gas_amount: String,
    pub gas_unit_price: String,
    pub expiration_timestamp_secs: String,
    pub payload: EntryFunctionPayload,
    pub signature: TransactionSignature,
}

/// Accepted-but-not-final submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: String,
}

/// What the ledger currently knows about a transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Committed {
        version: u64,
        success: bool,
        vm_status: String,
    },
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    #[serde(rename = "type")]
    tx_type: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    vm_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    sequence_number: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    vm_error_code: Option<u64>,
}

impl ErrorBody {
    fn is_abort(&self) -> bool {
        self.vm_error_code.is_some() || self.message.contains("ABORTED")
    }

    fn describe(&self, status: StatusCode) -> String {
        match &self.error_code {
            Some(code) => format!("{} ({}): {}", status, code, self.message),
            None => format!("{}: {}", status, self.message),
        }
    }
}

// ============================================================================
// LEDGER RPC TRAIT
// ============================================================================

/// The two logical ledger operations the client consumes (view and
/// submit/await), plus the account lookup signing needs.
pub trait LedgerRpc: Send + Sync {
    fn view(
        &self,
        request: ViewRequest,
    ) -> impl Future<Output = Result<Vec<Value>, LedgerRpcError>> + Send;

    fn account_sequence_number(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<u64, LedgerRpcError>> + Send;

    fn submit_transaction(
        &self,
        submission: SignedSubmission,
    ) -> impl Future<Output = Result<PendingTransaction, LedgerRpcError>> + Send;

    fn transaction_by_hash(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<TransactionStatus, LedgerRpcError>> + Send;
}

// ============================================================================
// HTTP LEDGER RPC
// ============================================================================

/// REST client for a ledger fullnode
#[derive(Debug, Clone)]
pub struct HttpLedgerRpc {
    /// Fullnode base URL, e.g. http://localhost:8080/v1
    endpoint_url: String,

    /// HTTP client
    client: Client,
}

impl HttpLedgerRpc {
    pub fn new(endpoint_url: impl Into<String>, timeout: Duration) -> Self {
        let endpoint_url = endpoint_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        HttpLedgerRpc { endpoint_url, client }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint_url, path)
    }

    async fn error_body(response: reqwest::Response) -> ErrorBody {
        let text = response.text().await.unwrap_or_default();
        serde_json::from_str::<ErrorBody>(&text).unwrap_or(ErrorBody {
            message: text,
            ..Default::default()
        })
    }
}

impl LedgerRpc for HttpLedgerRpc {
    async fn view(&self, request: ViewRequest) -> Result<Vec<Value>, LedgerRpcError> {
        let response = self
            .client
            .post(self.url("/view"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Vec<Value>>()
                .await
                .map_err(|e| LedgerRpcError::InvalidResponse(e.to_string()));
        }

        let body = Self::error_body(response).await;
        if status == StatusCode::NOT_FOUND {
            Err(LedgerRpcError::NotFound(body.describe(status)))
        } else if body.is_abort() {
            Err(LedgerRpcError::ViewAborted(body.message))
        } else {
            Err(LedgerRpcError::RequestFailed(body.describe(status)))
        }
    }

    async fn account_sequence_number(&self, address: &str) -> Result<u64, LedgerRpcError> {
        let response = self
            .client
            .get(self.url(&format!("/accounts/{}", address)))
            .send()
            .await?;

        // Accounts that never transacted do not exist yet
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(LedgerRpcError::RequestFailed(
                Self::error_body(response).await.describe(status),
            ));
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| LedgerRpcError::InvalidResponse(e.to_string()))?;

        account
            .sequence_number
            .parse()
            .map_err(|e| LedgerRpcError::InvalidResponse(format!("sequence_number: {}", e)))
    }

    async fn submit_transaction(
        &self,
        submission: SignedSubmission,
    ) -> Result<PendingTransaction, LedgerRpcError> {
        let response = self
            .client
            .post(self.url("/transactions"))
            .json(&submission)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<PendingTransaction>()
                .await
                .map_err(|e| LedgerRpcError::InvalidResponse(e.to_string()));
        }

        let body = Self::error_body(response).await;
        if status.is_client_error() {
            Err(LedgerRpcError::Rejected(body.describe(status)))
        } else {
            Err(LedgerRpcError::RequestFailed(body.describe(status)))
        }
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<TransactionStatus, LedgerRpcError> {
        let response = self
            .client
            .get(self.url(&format!("/transactions/by_hash/{}", hash)))
            .send()
            .await?;

        // Not indexed yet
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(TransactionStatus::Pending);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(LedgerRpcError::RequestFailed(
                Self::error_body(response).await.describe(status),
            ));
        }

        let tx: TransactionResponse = response
            .json()
            .await
            .map_err(|e| LedgerRpcError::InvalidResponse(e.to_string()))?;

        if tx.tx_type == "pending_transaction" {
            return Ok(TransactionStatus::Pending);
        }

        let version = tx
            .version
            .as_deref()
            .unwrap_or("0")
            .parse()
            .map_err(|e| LedgerRpcError::InvalidResponse(format!("version: {}", e)))?;

        Ok(TransactionStatus::Committed {
            version,
            success: tx.success.unwrap_or(false),
            vm_status: tx.vm_status.unwrap_or_default(),
        })
    }
}

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Live fullnode or in-memory mock, picked at startup from configuration
#[derive(Debug)]
pub enum LedgerBackend {
    Http(HttpLedgerRpc),
    Mock(MockLedger),
}

impl LedgerBackend {
    pub fn is_mock(&self) -> bool {
        matches!(self, LedgerBackend::Mock(_))
    }

    pub fn describe(&self) -> String {
        match self {
            LedgerBackend::Http(rpc) => format!("fullnode at {}", rpc.endpoint_url()),
            LedgerBackend::Mock(_) => "in-memory mock ledger".to_string(),
        }
    }
}

impl LedgerRpc for LedgerBackend {
    async fn view(&self, request: ViewRequest) -> Result<Vec<Value>, LedgerRpcError> {
        match self {
            LedgerBackend::Http(rpc) => rpc.view(request).await,
            LedgerBackend::Mock(mock) => mock.view(request).await,
        }
    }

    async fn account_sequence_number(&self, address: &str) -> Result<u64, LedgerRpcError> {
        match self {
            LedgerBackend::Http(rpc) => rpc.account_sequence_number(address).await,
            LedgerBackend::Mock(mock) => mock.account_sequence_number(address).await,
        }
    }

    async fn submit_transaction(
        &self,
        submission: SignedSubmission,
    ) -> Result<PendingTransaction, LedgerRpcError> {
        match self {
            LedgerBackend::Http(rpc) => rpc.submit_transaction(submission).await,
            LedgerBackend::Mock(mock) => mock.submit_transaction(submission).await,
        }
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<TransactionStatus, LedgerRpcError> {
        match self {
            LedgerBackend::Http(rpc) => rpc.transaction_by_hash(hash).await,
            LedgerBackend::Mock(mock) => mock.transaction_by_hash(hash).await,
        }
    }
}
