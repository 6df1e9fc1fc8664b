//! Auction expiry sweeper.
//!
//! A background interval task that closes auctions whose deadline has
//! passed and finalizes their winner. Each auction is closed in its own
//! transaction with the row locked and the deadline re-checked, so a bid
//! that extended the deadline between the candidate query and the close
//! wins the race and the auction stays open.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};

use crate::domain::AuctionId;
use crate::error::AuctionError;
use crate::persistence::AuctionStore;
use crate::ws::RealtimeHub;

/// Periodically transitions overdue ACTIVE auctions to ENDED.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    store: AuctionStore,
    hub: Arc<RealtimeHub>,
    period: Duration,
}

impl ExpirySweeper {
    /// Creates the sweeper with the given tick period.
    #[must_use]
    pub fn new(store: AuctionStore, hub: Arc<RealtimeHub>, period: Duration) -> Self {
        Self { store, hub, period }
    }

    /// Spawns the sweep loop. A failing tick is logged and retried on the
    /// next tick; the loop itself never exits.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            loop {
                ticker.tick().await;
                match self.sweep_once(Utc::now()).await {
                    Ok(closed) if closed > 0 => {
                        tracing::info!(closed, "expiry sweep closed auctions");
                    }
                    Ok(_) => {}
                    Err(err) => tracing::error!(%err, "expiry sweep tick failed"),
                }
            }
        })
    }

    /// One sweep pass: closes every overdue auction independently.
    /// Returns the number of auctions actually closed this pass.
    ///
    /// A failure on one auction is logged and does not abort the rest;
    /// the next tick retries it. Re-running on an already-ENDED auction
    /// is a no-op, so the whole pass is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] only when the candidate query
    /// itself fails.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize, AuctionError> {
        let candidates = self.store.expired_auction_ids(now).await?;
        let mut closed = 0;
        for auction_id in candidates {
            match self.close_one(auction_id, now).await {
                Ok(true) => closed += 1,
                Ok(false) => {} // extended meanwhile, or already closed
                Err(err) => {
                    tracing::error!(%auction_id, %err, "failed to close expired auction");
                }
            }
        }
        Ok(closed)
    }

    /// Closes one auction if it is still overdue once its row is locked.
    async fn close_one(&self, auction_id: AuctionId, now: DateTime<Utc>) -> Result<bool, AuctionError> {
        let mut tx = self.store.begin().await?;
        let Some(auction) = self.store.auction_for_update(&mut tx, auction_id).await? else {
            return Ok(false);
        };

        // Re-check under lock: a bid may have extended the deadline after
        // the candidate query, or a previous pass may have closed the row.
        if auction.status != crate::domain::AuctionStatus::Active || auction.end_time > now {
            return Ok(false);
        }

        let winner_id = self
            .store
            .winning_bid(&mut tx, auction_id)
            .await?
            .map(|bid| bid.bidder_id);
        let closed = self
            .store
            .close_auction(&mut tx, auction_id, winner_id, auction.version)
            .await?;
        tx.commit().await?;

        if closed {
            tracing::info!(%auction_id, winner = ?winner_id, "auction ended");
            match self.store.fetch_auction(auction_id).await {
                Ok(Some(ended)) => self.hub.notify_auction_ended(&ended).await,
                Ok(None) => {}
                Err(err) => tracing::warn!(%auction_id, %err, "post-close refresh failed"),
            }
        }
        Ok(closed)
    }
}
