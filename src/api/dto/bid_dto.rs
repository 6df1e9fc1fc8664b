//! DTOs for the bid endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{AuctionId, Bid, BidId, UserId};

/// Request body for placing a bid.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PlaceBidRequest {
    /// Bid amount; must clear the auction's computed minimum.
    pub amount: i64,
}

/// A committed bid as returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BidResponse {
    /// Bid identifier.
    pub id: BidId,
    /// Auction the bid was placed on.
    pub auction_id: AuctionId,
    /// User who placed the bid.
    pub bidder_id: UserId,
    /// Bid amount.
    pub amount: i64,
    /// Whether the bid currently wins the auction.
    pub is_winning: bool,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Bid> for BidResponse {
    fn from(bid: Bid) -> Self {
        Self {
            id: bid.id,
            auction_id: bid.auction_id,
            bidder_id: bid.bidder_id,
            amount: bid.amount,
            is_winning: bid.is_winning,
            created_at: bid.created_at,
        }
    }
}
