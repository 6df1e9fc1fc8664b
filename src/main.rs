//! auction-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints, the
//! expiry sweep loop, and the WebSocket heartbeat.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use sqlx::postgres::PgPoolOptions;
use tokio::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use auction_gateway::api;
use auction_gateway::app_state::AppState;
use auction_gateway::auth::SharedSecretVerifier;
use auction_gateway::config::GatewayConfig;
use auction_gateway::persistence::AuctionStore;
use auction_gateway::service::{
    BidPlacementService, BidRetractionService, ExpirySweeper, LogNotificationSender,
};
use auction_gateway::ws::RealtimeHub;
use auction_gateway::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting auction-gateway");

    // Connect to PostgreSQL and apply migrations
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Build the store, hub, and services
    let store = AuctionStore::new(pool);
    let hub = Arc::new(RealtimeHub::new(config.ws_queue_capacity));
    let notifier = Arc::new(LogNotificationSender);
    let placement = Arc::new(BidPlacementService::new(
        store.clone(),
        Arc::clone(&hub),
        notifier,
    ));
    let retraction = Arc::new(BidRetractionService::new(store.clone(), Arc::clone(&hub)));

    // Background loops
    let sweeper = ExpirySweeper::new(
        store.clone(),
        Arc::clone(&hub),
        Duration::from_secs(config.sweep_interval_secs),
    );
    let sweep_task = sweeper.spawn();
    let heartbeat_task = hub.spawn_heartbeat(Duration::from_secs(config.heartbeat_interval_secs));

    // Build application state
    let app_state = AppState {
        store,
        placement,
        retraction,
        hub,
        token_verifier: Arc::new(SharedSecretVerifier::new(
            config.auth_token_secret.clone(),
            config.admin_token_secret.clone(),
        )),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep_task.abort();
    heartbeat_task.abort();
    tracing::info!("auction-gateway stopped");
    Ok(())
}

/// Resolves when the process receives ctrl-c.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to install ctrl-c handler");
    }
}
