//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::SharedVerifier;
use crate::persistence::AuctionStore;
use crate::service::{BidPlacementService, BidRetractionService};
use crate::ws::RealtimeHub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Auction store for reads and aggregations.
    pub store: AuctionStore,
    /// Transactional bid placement.
    pub placement: Arc<BidPlacementService>,
    /// Transactional bid retraction.
    pub retraction: Arc<BidRetractionService>,
    /// Real-time hub for WebSocket sessions.
    pub hub: Arc<RealtimeHub>,
    /// Access-token verification seam.
    pub token_verifier: SharedVerifier,
}
