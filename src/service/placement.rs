//! Bid placement: the transactional bid-acceptance protocol.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::notify::{self, Notification, NotificationSender};
use crate::domain::{
    AuctionId, Bid, BidId, ExtendReason, RequestMeta, UserId, validate_bid,
};
use crate::error::AuctionError;
use crate::persistence::AuctionStore;
use crate::ws::RealtimeHub;

/// Everything the post-commit fan-out needs, captured while the
/// transaction still held the row.
struct PlacementOutcome {
    bid: Bid,
    seller_id: UserId,
    displaced: Option<UserId>,
    new_end_time: Option<DateTime<Utc>>,
}

/// Orchestrates bid acceptance: validate → persist → promote winner →
/// maybe extend the deadline, all in one transaction, then fan out.
///
/// The transaction locks the auction row (`SELECT ... FOR UPDATE`), so two
/// concurrent bidders are serialized and the second one is validated
/// against the first one's committed price, never a stale snapshot.
#[derive(Debug, Clone)]
pub struct BidPlacementService {
    store: AuctionStore,
    hub: Arc<RealtimeHub>,
    notifier: Arc<dyn NotificationSender>,
}

impl BidPlacementService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        store: AuctionStore,
        hub: Arc<RealtimeHub>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            store,
            hub,
            notifier,
        }
    }

    /// Places a bid on an auction.
    ///
    /// Returns the committed, winning bid row. A serialization failure is
    /// retried once transparently before surfacing.
    ///
    /// # Errors
    ///
    /// - [`AuctionError::AuctionNotFound`] — auction missing or deleted,
    /// - [`AuctionError::SelfBid`] — bidder is the seller,
    /// - [`AuctionError::BidTooLow`] — amount below the computed minimum,
    /// - [`AuctionError::AuctionNotActive`] / [`AuctionError::AuctionEnded`],
    /// - [`AuctionError::SerializationFailure`] — concurrency conflict that
    ///   survived the one retry,
    /// - [`AuctionError::Persistence`] — database failure.
    pub async fn place_bid(
        &self,
        auction_id: AuctionId,
        bidder_id: UserId,
        amount: i64,
        meta: RequestMeta,
    ) -> Result<Bid, AuctionError> {
        // Cheap fail-fast against an unlocked snapshot. Deliberately
        // under-approximates the winning-bid state so it can only reject
        // bids the authoritative in-transaction check would also reject.
        let snapshot = self
            .store
            .fetch_auction(auction_id)
            .await?
            .ok_or(AuctionError::AuctionNotFound(auction_id))?;
        let has_winner_lower_bound = snapshot.current_price > snapshot.start_price;
        validate_bid(
            &snapshot,
            has_winner_lower_bound,
            bidder_id,
            amount,
            Utc::now(),
        )?;

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            match self.place_in_tx(auction_id, bidder_id, amount, &meta).await {
                Err(err) if err.is_retryable() && attempt == 1 => {
                    tracing::warn!(%auction_id, %bidder_id, "placement conflict, retrying once");
                }
                result => break result?,
            }
        };

        self.fan_out(auction_id, &outcome).await;

        tracing::info!(
            %auction_id,
            %bidder_id,
            bid_id = %outcome.bid.id,
            amount,
            extended = outcome.new_end_time.is_some(),
            "bid accepted"
        );
        Ok(outcome.bid)
    }

    /// One transaction attempt. Every read here is authoritative: the
    /// auction row is locked first, and the validator runs against that
    /// row, not the caller's snapshot.
    async fn place_in_tx(
        &self,
        auction_id: AuctionId,
        bidder_id: UserId,
        amount: i64,
        meta: &RequestMeta,
    ) -> Result<PlacementOutcome, AuctionError> {
        let mut tx = self.store.begin().await?;
        let now = Utc::now();

        let auction = self
            .store
            .auction_for_update(&mut tx, auction_id)
            .await?
            .ok_or(AuctionError::AuctionNotFound(auction_id))?;
        let previous_winner = self.store.winning_bid(&mut tx, auction_id).await?;

        validate_bid(&auction, previous_winner.is_some(), bidder_id, amount, now)?;

        let mut bid = Bid {
            id: BidId::new(),
            auction_id,
            bidder_id,
            amount,
            is_winning: false,
            is_retracted: false,
            rejected_at: None,
            rejected_by: None,
            read_by_owner_at: None,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            created_at: now,
        };
        self.store.insert_bid(&mut tx, &bid).await?;
        self.store.demote_winning_bid(&mut tx, auction_id).await?;
        self.store.promote_bid(&mut tx, bid.id).await?;
        self.store
            .apply_bid_to_auction(&mut tx, auction_id, amount, now, auction.version)
            .await?;

        // Anti-sniping: evaluated against the end_time read under lock, so
        // the decision cannot race the expiry sweeper.
        let new_end_time = if auction.within_extend_window(now) {
            let new_end = now + Duration::minutes(i64::from(auction.extend_minutes));
            self.store
                .extend_deadline(&mut tx, auction_id, new_end, auction.version)
                .await?;
            Some(new_end)
        } else {
            None
        };

        tx.commit().await?;

        bid.is_winning = true;
        Ok(PlacementOutcome {
            bid,
            seller_id: auction.seller_id,
            displaced: previous_winner
                .filter(|prev| prev.bidder_id != bidder_id)
                .map(|prev| prev.bidder_id),
            new_end_time,
        })
    }

    /// Post-commit fan-out: best-effort, failures logged, never rolled
    /// back.
    async fn fan_out(&self, auction_id: AuctionId, outcome: &PlacementOutcome) {
        self.hub.notify_new_bid(&outcome.bid).await;

        if let Some(displaced) = outcome.displaced {
            self.hub.notify_outbid(displaced, &outcome.bid).await;
            notify::dispatch(
                Arc::clone(&self.notifier),
                Notification::Outbid { user_id: displaced },
                auction_id,
                outcome.bid.amount,
            );
        }

        if let Some(new_end_time) = outcome.new_end_time {
            self.hub
                .notify_auction_extended(auction_id, new_end_time, ExtendReason::BidWithinWindow)
                .await;
        }

        notify::dispatch(
            Arc::clone(&self.notifier),
            Notification::NewBidForSeller {
                seller_id: outcome.seller_id,
            },
            auction_id,
            outcome.bid.amount,
        );
    }
}
