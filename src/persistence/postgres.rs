//! PostgreSQL implementation of the auction store.
//!
//! The store is the single source of truth for auctions and bids. Plain
//! reads run against the connection pool; every read-then-write sequence
//! runs inside a caller-owned transaction with the auction row locked via
//! `SELECT ... FOR UPDATE`, which is what keeps concurrent bids and the
//! expiry sweep from acting on stale `current_price`/`end_time` values.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{AuctionParticipant, LeaderboardEntry};
use crate::domain::{Auction, AuctionId, Bid, BidId, UserId};
use crate::error::AuctionError;

/// PostgreSQL-backed auction store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct AuctionStore {
    pool: PgPool,
}

impl AuctionStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begins a transaction for a read-then-write protocol step.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] if a connection cannot be
    /// acquired.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, AuctionError> {
        Ok(self.pool.begin().await?)
    }

    // ── Pool-level reads ────────────────────────────────────────────────

    /// Fetches an auction snapshot, treating soft-deleted rows as absent.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn fetch_auction(&self, id: AuctionId) -> Result<Option<Auction>, AuctionError> {
        let auction = sqlx::query_as::<_, Auction>(
            "SELECT * FROM auctions WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(auction)
    }

    /// Fetches a bid by ID.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn fetch_bid(&self, id: BidId) -> Result<Option<Bid>, AuctionError> {
        let bid = sqlx::query_as::<_, Bid>("SELECT * FROM bids WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(bid)
    }

    /// Bumps the view counter. Fire-and-forget bookkeeping; does not touch
    /// `version`.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn record_view(&self, id: AuctionId) -> Result<(), AuctionError> {
        sqlx::query("UPDATE auctions SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns IDs of active auctions whose deadline has passed, the
    /// sweep's candidate set. The deadline is re-checked under lock per
    /// auction before closing.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn expired_auction_ids(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuctionId>, AuctionError> {
        let ids = sqlx::query_scalar::<_, AuctionId>(
            "SELECT id FROM auctions \
             WHERE status = 'ACTIVE' AND end_time <= $1 AND deleted_at IS NULL \
             ORDER BY end_time ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    // ── Aggregation reads ───────────────────────────────────────────────

    /// Ranked leaderboard over bids still in play.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn leaderboard(
        &self,
        auction_id: AuctionId,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, AuctionError> {
        let rows = sqlx::query_as::<_, LeaderboardEntry>(
            "SELECT bidder_id, \
                    MAX(amount)     AS best_amount, \
                    COUNT(*)        AS bids_placed, \
                    MIN(created_at) AS first_bid_at \
             FROM bids \
             WHERE auction_id = $1 AND NOT is_retracted AND rejected_at IS NULL \
             GROUP BY bidder_id \
             ORDER BY best_amount DESC, first_bid_at ASC \
             LIMIT $2",
        )
        .bind(auction_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Everyone who ever bid on the auction, most recent bidders first.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn participants(
        &self,
        auction_id: AuctionId,
    ) -> Result<Vec<AuctionParticipant>, AuctionError> {
        let rows = sqlx::query_as::<_, AuctionParticipant>(
            "SELECT bidder_id, \
                    COUNT(*)        AS bids_placed, \
                    MAX(created_at) AS last_bid_at \
             FROM bids \
             WHERE auction_id = $1 \
             GROUP BY bidder_id \
             ORDER BY last_bid_at DESC",
        )
        .bind(auction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The auction's winning bid row(s): one while a winner stands, empty
    /// otherwise. Stable shape across ACTIVE and ENDED auctions.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn winners(&self, auction_id: AuctionId) -> Result<Vec<Bid>, AuctionError> {
        let rows = sqlx::query_as::<_, Bid>(
            "SELECT * FROM bids \
             WHERE auction_id = $1 AND is_winning \
               AND NOT is_retracted AND rejected_at IS NULL",
        )
        .bind(auction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ── Transactional row operations ────────────────────────────────────
    //
    // Each takes the caller's open transaction. The auction row lock
    // acquired by `auction_for_update` serializes every writer touching
    // one auction; writers on different auctions never contend.

    /// Re-reads the auction row under `FOR UPDATE`, blocking concurrent
    /// writers on the same auction until commit. Soft-deleted rows are
    /// returned so callers surface `NotFound` with full context.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] or
    /// [`AuctionError::SerializationFailure`] on database failure.
    pub async fn auction_for_update(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: AuctionId,
    ) -> Result<Option<Auction>, AuctionError> {
        let auction =
            sqlx::query_as::<_, Auction>("SELECT * FROM auctions WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(auction)
    }

    /// Fetches a bid under the current transaction.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn bid_in_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: BidId,
    ) -> Result<Option<Bid>, AuctionError> {
        let bid = sqlx::query_as::<_, Bid>("SELECT * FROM bids WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(bid)
    }

    /// Returns the auction's current winning bid, if one stands.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn winning_bid(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        auction_id: AuctionId,
    ) -> Result<Option<Bid>, AuctionError> {
        let bid = sqlx::query_as::<_, Bid>(
            "SELECT * FROM bids \
             WHERE auction_id = $1 AND is_winning \
               AND NOT is_retracted AND rejected_at IS NULL",
        )
        .bind(auction_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(bid)
    }

    /// Returns the highest bid still in play. Equal amounts resolve to the
    /// earliest bid: the first bidder at a price level retains priority.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn highest_active_bid(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        auction_id: AuctionId,
    ) -> Result<Option<Bid>, AuctionError> {
        let bid = sqlx::query_as::<_, Bid>(
            "SELECT * FROM bids \
             WHERE auction_id = $1 AND NOT is_retracted AND rejected_at IS NULL \
             ORDER BY amount DESC, created_at ASC \
             LIMIT 1",
        )
        .bind(auction_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(bid)
    }

    /// Inserts a bid row.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn insert_bid(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        bid: &Bid,
    ) -> Result<(), AuctionError> {
        sqlx::query(
            "INSERT INTO bids (id, auction_id, bidder_id, amount, is_winning, is_retracted, \
                               ip_address, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(bid.id)
        .bind(bid.auction_id)
        .bind(bid.bidder_id)
        .bind(bid.amount)
        .bind(bid.is_winning)
        .bind(bid.is_retracted)
        .bind(bid.ip_address.as_deref())
        .bind(bid.user_agent.as_deref())
        .bind(bid.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Clears the winning flag on whichever bid currently holds it.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn demote_winning_bid(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        auction_id: AuctionId,
    ) -> Result<(), AuctionError> {
        sqlx::query("UPDATE bids SET is_winning = FALSE WHERE auction_id = $1 AND is_winning")
            .bind(auction_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Marks a bid as the auction's winning bid.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn promote_bid(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        bid_id: BidId,
    ) -> Result<(), AuctionError> {
        sqlx::query("UPDATE bids SET is_winning = TRUE WHERE id = $1")
            .bind(bid_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Applies an accepted bid to the auction row: new price, bid counter,
    /// last-bid timestamp. Does not bump `version`; ordinary price updates
    /// are not a deadline/lifecycle change.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::VersionConflict`] if the row's version no
    /// longer matches `expected_version`, or [`AuctionError::Persistence`]
    /// on database failure.
    pub async fn apply_bid_to_auction(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        auction_id: AuctionId,
        amount: i64,
        now: DateTime<Utc>,
        expected_version: i64,
    ) -> Result<(), AuctionError> {
        let result = sqlx::query(
            "UPDATE auctions \
             SET current_price = $2, last_bid_at = $3, total_bids = total_bids + 1 \
             WHERE id = $1 AND version = $4",
        )
        .bind(auction_id)
        .bind(amount)
        .bind(now)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuctionError::VersionConflict);
        }
        Ok(())
    }

    /// Pushes the deadline forward and bumps `version`, the fence the
    /// expiry sweeper re-checks before closing.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::VersionConflict`] on a stale version, or
    /// [`AuctionError::Persistence`] on database failure.
    pub async fn extend_deadline(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        auction_id: AuctionId,
        new_end_time: DateTime<Utc>,
        expected_version: i64,
    ) -> Result<(), AuctionError> {
        let result = sqlx::query(
            "UPDATE auctions SET end_time = $2, version = version + 1 \
             WHERE id = $1 AND version = $3",
        )
        .bind(auction_id)
        .bind(new_end_time)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuctionError::VersionConflict);
        }
        Ok(())
    }

    /// Transitions an ACTIVE auction to ENDED and records the winner.
    /// Returns `false` when the row was not ACTIVE anymore, which makes
    /// closure idempotent for the sweeper.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn close_auction(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        auction_id: AuctionId,
        winner_id: Option<UserId>,
        expected_version: i64,
    ) -> Result<bool, AuctionError> {
        let result = sqlx::query(
            "UPDATE auctions \
             SET status = 'ENDED', winner_id = $2, version = version + 1 \
             WHERE id = $1 AND status = 'ACTIVE' AND version = $3",
        )
        .bind(auction_id)
        .bind(winner_id)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Marks a bid retracted (bidder- or admin-initiated).
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn mark_bid_retracted(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        bid_id: BidId,
    ) -> Result<(), AuctionError> {
        sqlx::query("UPDATE bids SET is_retracted = TRUE, is_winning = FALSE WHERE id = $1")
            .bind(bid_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Marks a bid rejected by the auction owner, recording who and when.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn mark_bid_rejected(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        bid_id: BidId,
        rejected_by: UserId,
        rejected_at: DateTime<Utc>,
    ) -> Result<(), AuctionError> {
        sqlx::query(
            "UPDATE bids \
             SET is_retracted = TRUE, is_winning = FALSE, rejected_at = $2, rejected_by = $3 \
             WHERE id = $1",
        )
        .bind(bid_id)
        .bind(rejected_at)
        .bind(rejected_by)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Writes a recomputed current price after a retraction changed the
    /// standing winner. No `version` bump; price is not the sweeper's fence.
    ///
    /// # Errors
    ///
    /// Returns [`AuctionError::Persistence`] on database failure.
    pub async fn set_current_price(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        auction_id: AuctionId,
        price: i64,
    ) -> Result<(), AuctionError> {
        sqlx::query("UPDATE auctions SET current_price = $2 WHERE id = $1")
            .bind(auction_id)
            .bind(price)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
