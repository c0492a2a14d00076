// Info Meme Market - local client backend
// Serves the market view model and market actions to a UI over HTTP

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

mod app_state;
mod handlers;

use app_state::{AppState, SharedState};
use handlers::*;
use infomeme_market::ClientConfig;

fn init_tracing() {
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|v| v.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        // ===== MARKET ENDPOINTS =====
        .route("/market", get(get_market))
        .route("/market/refresh", post(refresh_market))
        .route("/market/positions", post(enter_position))
        .route("/market/claim", post(claim_winnings))
        .route("/market/settle", post(settle_market))
        .route("/markets", post(create_market))

        // ===== WALLET ENDPOINTS =====
        .route("/wallet/connect", post(connect_wallet))
        .route("/wallet/disconnect", post(disconnect_wallet))

        // ===== FEED ENDPOINTS =====
        .route("/feed/tweets", get(get_tweets))
        .route("/feed/participants", get(get_participants))

        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))

        // Apply CORS and state
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let config = ClientConfig::from_env();
    init_tracing();

    info!("===============================================");
    info!("     Info Meme Market - client backend");
    info!("===============================================");

    let bind_addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid BIND_ADDR '{}': {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };

    let state: SharedState = Arc::new(AppState::new(config));

    // Initial mount: first read cycle before serving
    let mounted = state.controller.mount().await;
    match mounted.view() {
        Some(view) => info!(
            "Market loaded: \"{}\" ({})",
            view.market.description,
            view.status.label()
        ),
        None => error!("Market not loaded yet: {:?}", mounted.phase),
    }

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    info!("Server running on http://{}", bind_addr);
    info!("Available endpoints:");
    info!("   GET  /market             - Current market snapshot");
    info!("   POST /market/refresh     - Re-read market, pools, position and feed");
    info!("   POST /market/positions   - Enter a position {{ side, amount }}");
    info!("   POST /market/claim       - Claim winnings");
    info!("   POST /market/settle      - Settle {{ winning_side }}");
    info!("   POST /markets            - Create a market");
    info!("   POST /wallet/connect     - Connect a dev identity {{ name }}");
    info!("   POST /wallet/disconnect  - Disconnect");
    info!("   GET  /feed/tweets        - Campaign posts");
    info!("   GET  /feed/participants  - Campaign participants");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, goodbye");
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("Server error: {}", e);
    }
}
