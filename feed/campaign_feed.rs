// ============================================================================
// Campaign Feed Client
// ============================================================================
//
// GET {base}/api/v1/campaigns/{campaign}/tweets
// GET {base}/api/v1/campaigns/{campaign}/users
//
// Records are passed through mostly as-is; only the fields the client shows
// are typed, everything else lands in `extra`.
//
// ============================================================================

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::MarketError;

// ============================================================================
// RECORDS
// ============================================================================

/// One social post attributed to the campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    #[serde(default)]
    pub id: Value,
    #[serde(default, alias = "username", alias = "author_name")]
    pub author: String,
    #[serde(default, alias = "content")]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One campaign participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default, alias = "name")]
    pub username: String,
    #[serde(default, alias = "wallet_address")]
    pub address: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// CLIENT
// ============================================================================

#[derive(Debug, Clone)]
pub struct CampaignFeedClient {
    base_url: String,
    campaign: String,
    client: Client,
}

impl CampaignFeedClient {
    pub fn new(base_url: impl Into<String>, campaign: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            campaign: campaign.into(),
            client,
        }
    }

    pub fn campaign(&self) -> &str {
        &self.campaign
    }

    fn endpoint(&self, resource: &str) -> String {
        format!(
            "{}/api/v1/campaigns/{}/{}",
            self.base_url, self.campaign, resource
        )
    }

    pub async fn tweets(&self) -> Result<Vec<Tweet>, MarketError> {
        self.fetch("tweets").await
    }

    pub async fn participants(&self) -> Result<Vec<Participant>, MarketError> {
        self.fetch("users").await
    }

    async fn fetch<T: DeserializeOwned>(&self, resource: &str) -> Result<Vec<T>, MarketError> {
        let url = self.endpoint(resource);
        debug!("[Feed] GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketError::ReadFailure(format!("feed request failed: {}", e)))?;

        if !response.status().is_success() {
            warn!("[Feed] {} returned {}", url, response.status());
            return Err(MarketError::ReadFailure(format!(
                "HTTP error! status: {}",
                response.status()
            )));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| MarketError::ReadFailure(format!("invalid feed response: {}", e)))
    }
}
