//! WebSocket wire messages: client commands and server events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Auction, AuctionEvent, AuctionId, Bid, ExtendReason, UserId};
use crate::ws::hub::ConnectionId;

/// Commands a client can send over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to one auction's room.
    JoinAuction {
        /// Auction to follow.
        auction_id: AuctionId,
    },
    /// Unsubscribe from one auction's room.
    LeaveAuction {
        /// Auction to stop following.
        auction_id: AuctionId,
    },
    /// Heartbeat reply.
    Pong,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent once, immediately after the session is admitted.
    Connected {
        /// The authenticated user.
        user_id: UserId,
        /// Stable handle for this session, for diagnostics.
        socket_id: ConnectionId,
    },

    /// A bid was accepted on an auction the client follows.
    NewBid {
        /// Auction the bid targets.
        auction_id: AuctionId,
        /// The committed bid row.
        bid: Bid,
    },

    /// The recipient was displaced as the winning bidder. Targeted; only
    /// the displaced user's sessions receive it.
    Outbid {
        /// Auction the displacement happened on.
        auction_id: AuctionId,
        /// The bid that displaced the recipient.
        bid: Bid,
    },

    /// Auction fields changed outside the bid path.
    AuctionUpdated {
        /// Auction that changed.
        auction_id: AuctionId,
        /// The committed auction row.
        auction: Auction,
    },

    /// The auction closed and its winner was finalized.
    AuctionEnded {
        /// Auction that ended.
        auction_id: AuctionId,
        /// The committed auction row.
        auction: Auction,
        /// Final winner, if any.
        winner_id: Option<UserId>,
    },

    /// The deadline moved forward under the auto-extend policy.
    AuctionExtended {
        /// Auction whose deadline moved.
        auction_id: AuctionId,
        /// The new deadline.
        new_end_time: DateTime<Utc>,
        /// Why the deadline moved.
        reason: ExtendReason,
    },

    /// Heartbeat probe; clients answer with [`ClientMessage::Pong`].
    Ping,
}

impl From<AuctionEvent> for ServerMessage {
    fn from(event: AuctionEvent) -> Self {
        match event {
            AuctionEvent::NewBid {
                auction_id, bid, ..
            } => Self::NewBid { auction_id, bid },
            AuctionEvent::Outbid {
                auction_id, bid, ..
            } => Self::Outbid { auction_id, bid },
            AuctionEvent::AuctionUpdated {
                auction_id,
                auction,
                ..
            } => Self::AuctionUpdated {
                auction_id,
                auction,
            },
            AuctionEvent::AuctionEnded {
                auction_id,
                auction,
                winner_id,
                ..
            } => Self::AuctionEnded {
                auction_id,
                auction,
                winner_id,
            },
            AuctionEvent::AuctionExtended {
                auction_id,
                new_end_time,
                reason,
                ..
            } => Self::AuctionExtended {
                auction_id,
                new_end_time,
                reason,
            },
        }
    }
}
