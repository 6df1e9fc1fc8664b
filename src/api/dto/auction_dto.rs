//! DTOs for the auction read endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::Bid;
use crate::persistence::{AuctionParticipant, LeaderboardEntry};

/// Query parameters for the leaderboard endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LeaderboardParams {
    /// Maximum rows to return (1–100). Defaults to 20.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

impl LeaderboardParams {
    /// Clamps `limit` to the allowed 1–100 range.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            limit: self.limit.clamp(1, 100),
        }
    }
}

/// Ranked leaderboard for one auction.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Rows, best bidder first.
    pub data: Vec<LeaderboardEntry>,
}

/// Participants of one auction.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantsResponse {
    /// Everyone who ever bid, most recent first.
    pub data: Vec<AuctionParticipant>,
}

/// Winning bid rows of one auction.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WinnersResponse {
    /// The standing winning bid, or empty when none.
    pub data: Vec<Bid>,
}
