//! Bid endpoint handlers: place and retract.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, post};
use axum::{Json, Router};

use crate::api::dto::{BidResponse, PlaceBidRequest};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{AuctionId, BidId, RequestMeta};
use crate::error::{AuctionError, ErrorResponse};

/// `POST /auctions/:id/bids` — Place a bid.
///
/// # Errors
///
/// Returns [`AuctionError`] when the auction is missing, the caller is
/// the seller, the amount is below the computed minimum, or the auction
/// is no longer accepting bids.
#[utoipa::path(
    post,
    path = "/api/v1/auctions/{id}/bids",
    tag = "Bids",
    summary = "Place a bid",
    description = "Places a bid on an active auction. The bid must clear the auction's \
                   minimum amount and increment rules; on success it becomes the winning bid.",
    params(
        ("id" = uuid::Uuid, Path, description = "Auction UUID"),
    ),
    request_body = PlaceBidRequest,
    responses(
        (status = 201, description = "Bid accepted", body = BidResponse),
        (status = 400, description = "Amount below required minimum", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Seller bidding on own auction", body = ErrorResponse),
        (status = 404, description = "Auction not found", body = ErrorResponse),
        (status = 409, description = "Auction not active or already ended", body = ErrorResponse),
    )
)]
pub async fn place_bid(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AuthUser(claims): AuthUser,
    headers: HeaderMap,
    Json(req): Json<PlaceBidRequest>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction_id = AuctionId::from_uuid(id);
    let meta = request_meta(&headers);

    let bid = state
        .placement
        .place_bid(auction_id, claims.user_id, req.amount, meta)
        .await?;

    Ok((StatusCode::CREATED, Json(BidResponse::from(bid))))
}

/// `DELETE /bids/:id` — Retract (or, as the auction owner, reject) a bid.
///
/// # Errors
///
/// Returns [`AuctionError`] when the bid is missing, the caller is not
/// authorized, the bid is already retracted, or the auction has closed.
#[utoipa::path(
    delete,
    path = "/api/v1/bids/{id}",
    tag = "Bids",
    summary = "Retract a bid",
    description = "Withdraws a bid. The bid's own bidder retracts it; the auction owner \
                   rejects it; admins may do either. If the bid was winning, the highest \
                   remaining bid is promoted and the current price recomputed.",
    params(
        ("id" = uuid::Uuid, Path, description = "Bid UUID"),
    ),
    responses(
        (status = 204, description = "Bid retracted"),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Not authorized to retract", body = ErrorResponse),
        (status = 404, description = "Bid not found", body = ErrorResponse),
        (status = 409, description = "Already retracted or auction closed", body = ErrorResponse),
    )
)]
pub async fn retract_bid(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AuthUser(claims): AuthUser,
) -> Result<impl IntoResponse, AuctionError> {
    let bid_id = BidId::from_uuid(id);
    state.retraction.retract_bid(bid_id, claims).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bid routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auctions/{id}/bids", post(place_bid))
        .route("/bids/{id}", delete(retract_bid))
}

/// Captures client request metadata for the bid's audit fields.
fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let first_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    RequestMeta {
        ip_address: first_value("x-forwarded-for")
            .map(|v| v.split(',').next().unwrap_or_default().trim().to_owned()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    }
}
