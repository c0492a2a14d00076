// Application state management

use std::sync::Arc;
use tracing::info;

use infomeme_market::{
    CampaignFeedClient, ClientConfig, DevKeySigner, LedgerBackend, MarketController,
};

pub type Signer = DevKeySigner<LedgerBackend>;
pub type Controller = MarketController<LedgerBackend, Signer>;
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: ClientConfig,
    pub ledger: Arc<LedgerBackend>,
    pub controller: Controller,
    pub feed: CampaignFeedClient,
}

impl AppState {
    pub fn new(config: ClientConfig) -> Self {
        info!("Initializing Info Meme market client...");

        let ledger = config.ledger_backend();
        info!("Ledger: {}", ledger.describe());
        if ledger.is_mock() {
            info!("Mock mode: ENABLED (in-memory ledger, nothing leaves this process)");
        }

        // Starts disconnected; the UI connects an identity explicitly
        let signer = Arc::new(DevKeySigner::disconnected(
            ledger.clone(),
            config.signer_seed.as_bytes(),
        ));
        let controller = MarketController::from_config(&config, ledger.clone(), signer);
        let feed = CampaignFeedClient::new(
            config.feed_base_url.clone(),
            config.feed_campaign.clone(),
            config.rpc_timeout,
        );

        info!("Market: {}", config.market_id);
        info!("Module: {}::{}", config.module_address, config.module_name);
        info!("Feed:   {} (campaign '{}')", config.feed_base_url, config.feed_campaign);

        Self {
            config,
            ledger,
            controller,
            feed,
        }
    }

    pub fn signer(&self) -> &Arc<Signer> {
        self.controller.signer()
    }
}
