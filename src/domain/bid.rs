//! Bid row model and request metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AuctionId, BidId, UserId};

/// A bid row. Bids are never physically deleted by the core; they are
/// demoted, retracted by their bidder, or rejected by the auction owner.
///
/// Invariant: for a given auction, at most one bid has `is_winning = true`
/// among bids where `is_retracted = false` and `rejected_at IS NULL`, and
/// that bid's amount equals the auction's `current_price`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Bid {
    /// Bid identifier.
    pub id: BidId,
    /// Auction the bid was placed on.
    pub auction_id: AuctionId,
    /// User who placed the bid.
    pub bidder_id: UserId,
    /// Bid amount.
    pub amount: i64,
    /// Whether this is the auction's current winning bid.
    pub is_winning: bool,
    /// Whether the bidder (or an admin) withdrew the bid.
    pub is_retracted: bool,
    /// When the auction owner rejected the bid, if they did.
    pub rejected_at: Option<DateTime<Utc>>,
    /// Who rejected the bid (the auction owner).
    pub rejected_by: Option<UserId>,
    /// When the auction owner first read the bid.
    pub read_by_owner_at: Option<DateTime<Utc>>,
    /// Client IP the bid was submitted from.
    pub ip_address: Option<String>,
    /// Client user agent the bid was submitted from.
    pub user_agent: Option<String>,
    /// Submission timestamp; the tie-break key for equal amounts.
    pub created_at: DateTime<Utc>,
}

impl Bid {
    /// Returns `true` if the bid still competes for the auction: neither
    /// retracted nor rejected.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.is_retracted && self.rejected_at.is_none()
    }
}

/// Request metadata captured with every bid submission, kept for
/// diagnostics and dispute handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Client IP address, when known.
    pub ip_address: Option<String>,
    /// Client user agent, when known.
    pub user_agent: Option<String>,
}
