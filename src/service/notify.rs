//! Notification collaborator seam.
//!
//! Delivery channels (SMS, push, e-mail) are external collaborators; the
//! core only calls the two narrow operations below. Dispatch is
//! fire-and-forget with bounded retries: it never blocks the bid-placement
//! response and never holds a database transaction open.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{Duration, sleep};

use crate::domain::{AuctionId, UserId};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Outbound notifications the core emits after a committed bid.
///
/// Implementations talk to the delivery infrastructure. Errors are
/// surfaced so the dispatcher can retry, but they never propagate to the
/// request path.
#[async_trait]
pub trait NotificationSender: Send + Sync + fmt::Debug {
    /// Tells a seller a new bid landed on their auction.
    ///
    /// # Errors
    ///
    /// Returns the delivery failure; the dispatcher retries and then logs.
    async fn notify_new_bid_for_seller(
        &self,
        seller_id: UserId,
        auction_id: AuctionId,
        amount: i64,
    ) -> anyhow::Result<()>;

    /// Tells a displaced bidder a higher bid stands.
    ///
    /// # Errors
    ///
    /// Returns the delivery failure; the dispatcher retries and then logs.
    async fn notify_outbid(
        &self,
        user_id: UserId,
        auction_id: AuctionId,
        amount: i64,
    ) -> anyhow::Result<()>;
}

/// Development sender that records notifications in the log stream.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn notify_new_bid_for_seller(
        &self,
        seller_id: UserId,
        auction_id: AuctionId,
        amount: i64,
    ) -> anyhow::Result<()> {
        tracing::info!(%seller_id, %auction_id, amount, "notify seller: new bid");
        Ok(())
    }

    async fn notify_outbid(
        &self,
        user_id: UserId,
        auction_id: AuctionId,
        amount: i64,
    ) -> anyhow::Result<()> {
        tracing::info!(%user_id, %auction_id, amount, "notify bidder: outbid");
        Ok(())
    }
}

/// Kinds of notification the dispatcher can send.
#[derive(Debug, Clone, Copy)]
pub enum Notification {
    /// New bid on the seller's auction.
    NewBidForSeller {
        /// The auction's seller.
        seller_id: UserId,
    },
    /// The recipient was outbid.
    Outbid {
        /// The displaced bidder.
        user_id: UserId,
    },
}

/// Spawns a background task that attempts delivery up to three times with
/// a short delay between attempts, then gives up and logs.
pub fn dispatch(
    sender: Arc<dyn NotificationSender>,
    notification: Notification,
    auction_id: AuctionId,
    amount: i64,
) {
    tokio::spawn(async move {
        for attempt in 1..=MAX_ATTEMPTS {
            let result = match notification {
                Notification::NewBidForSeller { seller_id } => {
                    sender
                        .notify_new_bid_for_seller(seller_id, auction_id, amount)
                        .await
                }
                Notification::Outbid { user_id } => {
                    sender.notify_outbid(user_id, auction_id, amount).await
                }
            };
            match result {
                Ok(()) => return,
                Err(err) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(%auction_id, attempt, %err, "notification failed, retrying");
                    sleep(RETRY_DELAY).await;
                }
                Err(err) => {
                    tracing::error!(%auction_id, %err, "notification dropped after retries");
                }
            }
        }
    });
}
