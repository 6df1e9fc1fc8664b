//! Read-model rows for the aggregation endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::UserId;

/// One ranked leaderboard row: a bidder's best standing bid on an auction.
///
/// Ranked by best amount descending; on equal amounts the bidder who
/// reached the amount first ranks higher.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaderboardEntry {
    /// The bidder.
    pub bidder_id: UserId,
    /// Their highest bid still in play.
    pub best_amount: i64,
    /// How many of their bids are still in play.
    pub bids_placed: i64,
    /// When their first bid on this auction was accepted.
    pub first_bid_at: DateTime<Utc>,
}

/// One participant row: anyone who ever bid on the auction, including
/// bidders whose bids were all retracted or rejected.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AuctionParticipant {
    /// The bidder.
    pub bidder_id: UserId,
    /// Total bids they submitted.
    pub bids_placed: i64,
    /// Their most recent submission.
    pub last_bid_at: DateTime<Utc>,
}
