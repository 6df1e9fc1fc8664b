//! Auction row model and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AuctionId, ItemId, UserId};

/// Lifecycle status of an auction.
///
/// Stored as a PostgreSQL enum (`auction_status`). Once `Ended` or
/// `Cancelled` the row is immutable except for soft-delete fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "auction_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AuctionStatus {
    /// Created but not yet accepting bids.
    Draft,
    /// Open for bidding until `end_time`.
    Active,
    /// Closed by the expiry sweeper or an admin action.
    Ended,
    /// Terminated by the seller or an admin before completion.
    Cancelled,
}

/// An auction row: the single source of truth for one timed auction.
///
/// Invariants maintained by the services:
/// - `current_price` equals the amount of the single winning bid, or
///   `start_price` when no active bid exists.
/// - `end_time` is non-decreasing while `status` is [`AuctionStatus::Active`].
/// - `version` increases whenever `end_time` changes or the lifecycle
///   advances, so concurrent readers can detect stale deadlines.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Auction {
    /// Auction identifier.
    pub id: AuctionId,
    /// Listed item this auction sells (catalog service reference).
    pub item_id: ItemId,
    /// Seller who created the auction.
    pub seller_id: UserId,
    /// Price the bidding opens at.
    pub start_price: i64,
    /// Amount of the current winning bid, or `start_price` if none.
    pub current_price: i64,
    /// Minimum step above `current_price` for the next bid.
    pub bid_increment: i64,
    /// Absolute floor for any bid on this auction.
    pub min_bid_amount: i64,
    /// When bidding opens.
    pub start_time: DateTime<Utc>,
    /// Deadline; non-decreasing while the auction is active.
    pub end_time: DateTime<Utc>,
    /// Lifecycle status.
    pub status: AuctionStatus,
    /// Final winner, set when the auction ends.
    pub winner_id: Option<UserId>,
    /// Whether a late bid pushes the deadline forward.
    pub auto_extend: bool,
    /// Size of the anti-sniping window and of each extension, in minutes.
    pub extend_minutes: i32,
    /// Number of snapshot reads served for this auction.
    pub views: i64,
    /// Number of bids ever placed (retracted ones included).
    pub total_bids: i64,
    /// Deadline/lifecycle version stamp for optimistic concurrency.
    pub version: i64,
    /// When the most recent bid was accepted.
    pub last_bid_at: Option<DateTime<Utc>>,
    /// Soft-delete marker; a deleted auction behaves as missing.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Auction {
    /// Returns the smallest admissible bid amount right now.
    ///
    /// With a winning bid in place the next bid must clear the increment
    /// rule; the opening bid only has to meet the start price and the
    /// auction's absolute floor.
    #[must_use]
    pub fn min_required_bid(&self, has_winning_bid: bool) -> i64 {
        if has_winning_bid {
            self.current_price.saturating_add(self.bid_increment)
        } else {
            self.start_price.max(self.min_bid_amount)
        }
    }

    /// Returns `true` if `now` falls inside the auto-extend window before
    /// the deadline.
    #[must_use]
    pub fn within_extend_window(&self, now: DateTime<Utc>) -> bool {
        self.auto_extend
            && self.end_time - now <= chrono::Duration::minutes(i64::from(self.extend_minutes))
    }

    /// Returns `true` if the soft-delete marker is set.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn active_auction(now: DateTime<Utc>) -> Auction {
        Auction {
            id: AuctionId::new(),
            item_id: ItemId::new(),
            seller_id: UserId::new(),
            start_price: 100_000,
            current_price: 100_000,
            bid_increment: 5_000,
            min_bid_amount: 100_000,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            status: AuctionStatus::Active,
            winner_id: None,
            auto_extend: true,
            extend_minutes: 5,
            views: 0,
            total_bids: 0,
            version: 1,
            last_bid_at: None,
            deleted_at: None,
            created_at: now - Duration::hours(2),
        }
    }

    #[test]
    fn opening_bid_only_meets_start_price() {
        let now = Utc::now();
        let auction = active_auction(now);
        assert_eq!(auction.min_required_bid(false), 100_000);
    }

    #[test]
    fn subsequent_bid_clears_increment() {
        let now = Utc::now();
        let mut auction = active_auction(now);
        auction.current_price = 100_000;
        assert_eq!(auction.min_required_bid(true), 105_000);
    }

    #[test]
    fn extend_window_respects_flag_and_distance() {
        let now = Utc::now();
        let mut auction = active_auction(now);

        auction.end_time = now + Duration::minutes(3);
        assert!(auction.within_extend_window(now));

        auction.end_time = now + Duration::minutes(30);
        assert!(!auction.within_extend_window(now));

        auction.auto_extend = false;
        auction.end_time = now + Duration::minutes(3);
        assert!(!auction.within_extend_window(now));
    }
}
