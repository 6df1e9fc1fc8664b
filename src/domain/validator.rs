//! Pure bid admissibility check.
//!
//! [`validate_bid`] never touches storage and never mutates state. The
//! placement service runs it twice: once against a pre-transaction
//! snapshot as a cheap fail-fast, and once against the row re-read inside
//! the transaction, which is the authoritative decision.

use chrono::{DateTime, Utc};

use super::{Auction, AuctionStatus, UserId};
use crate::error::AuctionError;

/// Decides whether `amount` is an admissible bid by `bidder` on `auction`
/// at instant `now`.
///
/// Rules are checked in a fixed order so clients see stable error codes:
///
/// 1. auction not soft-deleted,
/// 2. bidder is not the seller,
/// 3. amount meets the auction's absolute floor,
/// 4. amount meets the computed minimum (increment above the current
///    winning bid, or the opening price when no bid stands),
/// 5. auction is `ACTIVE` and the deadline has not passed.
///
/// `has_winning_bid` must reflect the same snapshot `auction` was read
/// from; it decides whether the increment rule applies.
///
/// # Errors
///
/// Returns the typed rejection for the first rule that fails:
/// [`AuctionError::AuctionNotFound`], [`AuctionError::SelfBid`],
/// [`AuctionError::BidTooLow`] (with the computed minimum),
/// [`AuctionError::AuctionNotActive`], or [`AuctionError::AuctionEnded`].
pub fn validate_bid(
    auction: &Auction,
    has_winning_bid: bool,
    bidder: UserId,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<(), AuctionError> {
    if auction.is_deleted() {
        return Err(AuctionError::AuctionNotFound(auction.id));
    }

    if bidder == auction.seller_id {
        return Err(AuctionError::SelfBid);
    }

    if amount < auction.min_bid_amount {
        return Err(AuctionError::BidTooLow {
            minimum: auction.min_bid_amount,
        });
    }

    let minimum = auction.min_required_bid(has_winning_bid);
    if amount < minimum {
        return Err(AuctionError::BidTooLow { minimum });
    }

    if auction.status != AuctionStatus::Active {
        return Err(AuctionError::AuctionNotActive);
    }
    if auction.end_time <= now {
        return Err(AuctionError::AuctionEnded);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AuctionId, ItemId};
    use chrono::Duration;

    fn auction(now: DateTime<Utc>) -> Auction {
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
            auto_extend: false,
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
    fn opening_bid_at_start_price_is_accepted() {
        let now = Utc::now();
        let a = auction(now);
        assert!(validate_bid(&a, false, UserId::new(), 100_000, now).is_ok());
    }

    #[test]
    fn increment_rule_rejects_with_computed_minimum() {
        let now = Utc::now();
        let mut a = auction(now);
        a.current_price = 100_000;
        a.total_bids = 1;

        let err = validate_bid(&a, true, UserId::new(), 103_000, now);
        match err {
            Err(AuctionError::BidTooLow { minimum }) => assert_eq!(minimum, 105_000),
            other => panic!("expected BidTooLow, got {other:?}"),
        }

        assert!(validate_bid(&a, true, UserId::new(), 105_000, now).is_ok());
    }

    #[test]
    fn floor_rule_fires_before_increment_rule() {
        let now = Utc::now();
        let a = auction(now);
        let err = validate_bid(&a, false, UserId::new(), 50_000, now);
        match err {
            Err(AuctionError::BidTooLow { minimum }) => assert_eq!(minimum, 100_000),
            other => panic!("expected BidTooLow, got {other:?}"),
        }
    }

    #[test]
    fn seller_cannot_bid_on_own_auction() {
        let now = Utc::now();
        let a = auction(now);
        let err = validate_bid(&a, false, a.seller_id, 200_000, now);
        assert!(matches!(err, Err(AuctionError::SelfBid)));
    }

    #[test]
    fn soft_deleted_auction_is_not_found() {
        let now = Utc::now();
        let mut a = auction(now);
        a.deleted_at = Some(now);
        let err = validate_bid(&a, false, UserId::new(), 200_000, now);
        assert!(matches!(err, Err(AuctionError::AuctionNotFound(_))));
    }

    #[test]
    fn price_rules_precede_status_rules() {
        // A too-low bid on an ended auction reports the price problem,
        // matching the documented rule order.
        let now = Utc::now();
        let mut a = auction(now);
        a.end_time = now - Duration::minutes(1);
        let err = validate_bid(&a, false, UserId::new(), 50_000, now);
        assert!(matches!(err, Err(AuctionError::BidTooLow { .. })));
    }

    #[test]
    fn ended_auction_rejects_valid_amount() {
        let now = Utc::now();
        let mut a = auction(now);
        a.end_time = now - Duration::minutes(1);
        let err = validate_bid(&a, false, UserId::new(), 200_000, now);
        assert!(matches!(err, Err(AuctionError::AuctionEnded)));
    }

    #[test]
    fn draft_auction_is_not_active() {
        let now = Utc::now();
        let mut a = auction(now);
        a.status = AuctionStatus::Draft;
        let err = validate_bid(&a, false, UserId::new(), 200_000, now);
        assert!(matches!(err, Err(AuctionError::AuctionNotActive)));
    }

    #[test]
    fn deadline_exactly_now_counts_as_ended() {
        let now = Utc::now();
        let mut a = auction(now);
        a.end_time = now;
        let err = validate_bid(&a, false, UserId::new(), 200_000, now);
        assert!(matches!(err, Err(AuctionError::AuctionEnded)));
    }
}
