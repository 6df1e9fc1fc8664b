//! Domain events emitted after committed auction state changes.
//!
//! Every successful mutation publishes an [`AuctionEvent`] to the real-time
//! hub, which fans it out to the auction's room (or, for
//! [`AuctionEvent::Outbid`], to one specific user). Events carry the
//! committed row data so clients never need a follow-up read to render.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Auction, AuctionId, Bid, UserId};

/// Why an auction deadline moved.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendReason {
    /// A bid arrived inside the anti-sniping window.
    BidWithinWindow,
}

/// Domain event emitted after a committed state mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuctionEvent {
    /// A bid was accepted and promoted to winning.
    NewBid {
        /// Auction the bid targets.
        auction_id: AuctionId,
        /// The committed bid row.
        bid: Bid,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A previously winning bidder was displaced. Delivered only to the
    /// displaced user's sessions, not to the whole room.
    Outbid {
        /// Auction the displacement happened on.
        auction_id: AuctionId,
        /// The displaced bidder.
        user_id: UserId,
        /// The bid that displaced them.
        bid: Bid,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Auction fields changed outside the bid path (e.g. after a
    /// retraction recomputed the price).
    AuctionUpdated {
        /// Auction that changed.
        auction_id: AuctionId,
        /// The committed auction row.
        auction: Auction,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The auction was closed and its winner finalized.
    AuctionEnded {
        /// Auction that ended.
        auction_id: AuctionId,
        /// The committed auction row.
        auction: Auction,
        /// Final winner, if any bid was standing.
        winner_id: Option<UserId>,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The deadline moved forward under the auto-extend policy.
    AuctionExtended {
        /// Auction whose deadline moved.
        auction_id: AuctionId,
        /// The new deadline.
        new_end_time: DateTime<Utc>,
        /// Why the deadline moved.
        reason: ExtendReason,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl AuctionEvent {
    /// Returns the auction this event concerns, used for room routing.
    #[must_use]
    pub const fn auction_id(&self) -> AuctionId {
        match self {
            Self::NewBid { auction_id, .. }
            | Self::Outbid { auction_id, .. }
            | Self::AuctionUpdated { auction_id, .. }
            | Self::AuctionEnded { auction_id, .. }
            | Self::AuctionExtended { auction_id, .. } => *auction_id,
        }
    }

    /// Returns the target user for direct delivery, or `None` for events
    /// that go to the whole room.
    #[must_use]
    pub const fn target_user(&self) -> Option<UserId> {
        match self {
            Self::Outbid { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }
}
