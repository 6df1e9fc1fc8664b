//! Bid retraction and owner-initiated rejection.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::{ActorRole, Claims};
use crate::domain::{AuctionStatus, BidId};
use crate::error::AuctionError;
use crate::persistence::AuctionStore;
use crate::ws::RealtimeHub;

/// Withdraws a bid and recomputes the winner and current price.
///
/// Authorized actors: the bid's own bidder, the auction's owner (recorded
/// as a rejection), or an admin. Runs in one transaction with the auction
/// row locked, like placement, so winner re-selection never races a
/// concurrent bid.
#[derive(Debug, Clone)]
pub struct BidRetractionService {
    store: AuctionStore,
    hub: Arc<RealtimeHub>,
}

impl BidRetractionService {
    /// Creates the service.
    #[must_use]
    pub fn new(store: AuctionStore, hub: Arc<RealtimeHub>) -> Self {
        Self { store, hub }
    }

    /// Retracts (or, for the auction owner, rejects) a bid.
    ///
    /// If the bid was winning, the highest remaining bid in play becomes
    /// the winner — equal amounts resolve to the earliest bid — and
    /// `current_price` follows it, falling back to `start_price` when no
    /// bid remains.
    ///
    /// # Errors
    ///
    /// - [`AuctionError::BidNotFound`] / [`AuctionError::AuctionNotFound`],
    /// - [`AuctionError::RetractionForbidden`] — actor is neither the
    ///   bidder, the auction owner, nor an admin,
    /// - [`AuctionError::BidAlreadyRetracted`],
    /// - [`AuctionError::AuctionEnded`] / [`AuctionError::AuctionNotActive`]
    ///   — retraction on a closed auction is rejected,
    /// - [`AuctionError::Persistence`] — database failure.
    pub async fn retract_bid(&self, bid_id: BidId, actor: Claims) -> Result<(), AuctionError> {
        let mut tx = self.store.begin().await?;

        // Locate the auction, then lock it and re-read the bid under the
        // lock; the pre-lock read only supplies the auction id.
        let bid_ref = self
            .store
            .bid_in_tx(&mut tx, bid_id)
            .await?
            .ok_or(AuctionError::BidNotFound(bid_id))?;
        let auction = self
            .store
            .auction_for_update(&mut tx, bid_ref.auction_id)
            .await?
            .filter(|a| !a.is_deleted())
            .ok_or(AuctionError::AuctionNotFound(bid_ref.auction_id))?;
        let bid = self
            .store
            .bid_in_tx(&mut tx, bid_id)
            .await?
            .ok_or(AuctionError::BidNotFound(bid_id))?;

        let owner_initiated = match actor.role {
            ActorRole::Admin => false,
            ActorRole::User if actor.user_id == bid.bidder_id => false,
            ActorRole::User if actor.user_id == auction.seller_id => true,
            ActorRole::User => return Err(AuctionError::RetractionForbidden),
        };

        if !bid.is_active() {
            return Err(AuctionError::BidAlreadyRetracted);
        }
        match auction.status {
            AuctionStatus::Active => {}
            AuctionStatus::Ended => return Err(AuctionError::AuctionEnded),
            AuctionStatus::Draft | AuctionStatus::Cancelled => {
                return Err(AuctionError::AuctionNotActive);
            }
        }

        if owner_initiated {
            self.store
                .mark_bid_rejected(&mut tx, bid_id, actor.user_id, Utc::now())
                .await?;
        } else {
            self.store.mark_bid_retracted(&mut tx, bid_id).await?;
        }

        if bid.is_winning {
            match self.store.highest_active_bid(&mut tx, auction.id).await? {
                Some(next) => {
                    self.store.promote_bid(&mut tx, next.id).await?;
                    self.store
                        .set_current_price(&mut tx, auction.id, next.amount)
                        .await?;
                }
                None => {
                    self.store
                        .set_current_price(&mut tx, auction.id, auction.start_price)
                        .await?;
                }
            }
        }

        tx.commit().await?;

        // Best-effort: let the room see the recomputed price/winner.
        match self.store.fetch_auction(auction.id).await {
            Ok(Some(updated)) => self.hub.notify_auction_updated(&updated).await,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(auction_id = %auction.id, %err, "post-retraction refresh failed");
            }
        }

        tracing::info!(
            %bid_id,
            auction_id = %auction.id,
            actor = %actor.user_id,
            rejected = owner_initiated,
            "bid retracted"
        );
        Ok(())
    }
}
