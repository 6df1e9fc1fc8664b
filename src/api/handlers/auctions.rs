//! Auction read handlers: snapshot and aggregations.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    LeaderboardParams, LeaderboardResponse, ParticipantsResponse, WinnersResponse,
};
use crate::app_state::AppState;
use crate::domain::{Auction, AuctionId};
use crate::error::{AuctionError, ErrorResponse};

/// `GET /auctions/:id` — Current auction snapshot.
///
/// The authoritative state after any real-time delivery hiccup: clients
/// re-sync by re-reading this.
///
/// # Errors
///
/// Returns [`AuctionError::AuctionNotFound`] if the auction does not
/// exist or is soft-deleted.
#[utoipa::path(
    get,
    path = "/api/v1/auctions/{id}",
    tag = "Auctions",
    summary = "Get auction snapshot",
    description = "Returns the current committed state of one auction, including price, \
                   deadline, status, and counters. Each read bumps the view counter.",
    params(
        ("id" = uuid::Uuid, Path, description = "Auction UUID"),
    ),
    responses(
        (status = 200, description = "Auction snapshot", body = Auction),
        (status = 404, description = "Auction not found", body = ErrorResponse),
    )
)]
pub async fn get_auction(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction_id = AuctionId::from_uuid(id);
    let auction = state
        .store
        .fetch_auction(auction_id)
        .await?
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;

    // View counting is bookkeeping; a failure must not fail the read.
    if let Err(err) = state.store.record_view(auction_id).await {
        tracing::warn!(%auction_id, %err, "view counter update failed");
    }

    Ok(Json(auction))
}

/// `GET /auctions/:id/leaderboard` — Ranked bidders.
///
/// # Errors
///
/// Returns [`AuctionError::AuctionNotFound`] if the auction does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/auctions/{id}/leaderboard",
    tag = "Auctions",
    summary = "Get auction leaderboard",
    description = "Returns bidders ranked by their best standing bid; on equal amounts \
                   the earlier bidder ranks higher.",
    params(
        ("id" = uuid::Uuid, Path, description = "Auction UUID"),
        LeaderboardParams,
    ),
    responses(
        (status = 200, description = "Ranked leaderboard", body = LeaderboardResponse),
        (status = 404, description = "Auction not found", body = ErrorResponse),
    )
)]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction_id = require_auction(&state, id).await?;
    let params = params.clamped();
    let data = state.store.leaderboard(auction_id, params.limit).await?;
    Ok(Json(LeaderboardResponse { data }))
}

/// `GET /auctions/:id/participants` — Everyone who bid on the auction.
///
/// # Errors
///
/// Returns [`AuctionError::AuctionNotFound`] if the auction does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/auctions/{id}/participants",
    tag = "Auctions",
    summary = "Get auction participants",
    description = "Returns every user who ever bid on the auction, including those whose \
                   bids were retracted or rejected.",
    params(
        ("id" = uuid::Uuid, Path, description = "Auction UUID"),
    ),
    responses(
        (status = 200, description = "Participant list", body = ParticipantsResponse),
        (status = 404, description = "Auction not found", body = ErrorResponse),
    )
)]
pub async fn get_participants(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction_id = require_auction(&state, id).await?;
    let data = state.store.participants(auction_id).await?;
    Ok(Json(ParticipantsResponse { data }))
}

/// `GET /auctions/:id/winners` — The standing winning bid.
///
/// # Errors
///
/// Returns [`AuctionError::AuctionNotFound`] if the auction does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/auctions/{id}/winners",
    tag = "Auctions",
    summary = "Get auction winners",
    description = "Returns the auction's winning bid as a (possibly empty) array; the \
                   shape is identical for running and ended auctions.",
    params(
        ("id" = uuid::Uuid, Path, description = "Auction UUID"),
    ),
    responses(
        (status = 200, description = "Winning bid rows", body = WinnersResponse),
        (status = 404, description = "Auction not found", body = ErrorResponse),
    )
)]
pub async fn get_winners(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction_id = require_auction(&state, id).await?;
    let data = state.store.winners(auction_id).await?;
    Ok(Json(WinnersResponse { data }))
}

/// Auction read routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auctions/{id}", get(get_auction))
        .route("/auctions/{id}/leaderboard", get(get_leaderboard))
        .route("/auctions/{id}/participants", get(get_participants))
        .route("/auctions/{id}/winners", get(get_winners))
}

/// Resolves the path UUID to an existing auction or 404s.
async fn require_auction(state: &AppState, id: uuid::Uuid) -> Result<AuctionId, AuctionError> {
    let auction_id = AuctionId::from_uuid(id);
    state
        .store
        .fetch_auction(auction_id)
        .await?
        .map(|_| auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))
}
