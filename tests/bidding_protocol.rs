//! Database-backed tests for the transactional bidding protocols.
//!
//! These run against a real PostgreSQL instance provisioned from
//! `DATABASE_URL` (migrations are applied per test database by
//! `sqlx::test`). They are ignored by default so the unit suite passes
//! without infrastructure; run them with `cargo test -- --ignored`.

#![allow(clippy::panic)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use auction_gateway::auth::{ActorRole, Claims};
use auction_gateway::domain::{
    Auction, AuctionId, AuctionStatus, ItemId, RequestMeta, UserId,
};
use auction_gateway::error::AuctionError;
use auction_gateway::persistence::AuctionStore;
use auction_gateway::service::{
    BidPlacementService, BidRetractionService, ExpirySweeper, LogNotificationSender,
};
use auction_gateway::ws::RealtimeHub;

struct Fixture {
    store: AuctionStore,
    placement: BidPlacementService,
    retraction: BidRetractionService,
    sweeper: ExpirySweeper,
    seller: UserId,
}

fn fixture(pool: PgPool) -> Fixture {
    let store = AuctionStore::new(pool);
    let hub = Arc::new(RealtimeHub::new(64));
    let placement = BidPlacementService::new(
        store.clone(),
        Arc::clone(&hub),
        Arc::new(LogNotificationSender),
    );
    let retraction = BidRetractionService::new(store.clone(), Arc::clone(&hub));
    let sweeper = ExpirySweeper::new(store.clone(), hub, tokio::time::Duration::from_secs(300));
    Fixture {
        store,
        placement,
        retraction,
        sweeper,
        seller: UserId::new(),
    }
}

async fn seed_auction(
    pool_store: &AuctionStore,
    seller: UserId,
    end_time: DateTime<Utc>,
    auto_extend: bool,
) -> anyhow::Result<AuctionId> {
    let auction = Auction {
        id: AuctionId::new(),
        item_id: ItemId::new(),
        seller_id: seller,
        start_price: 100_000,
        current_price: 100_000,
        bid_increment: 5_000,
        min_bid_amount: 100_000,
        start_time: Utc::now() - Duration::hours(1),
        end_time,
        status: AuctionStatus::Active,
        winner_id: None,
        auto_extend,
        extend_minutes: 5,
        views: 0,
        total_bids: 0,
        version: 1,
        last_bid_at: None,
        deleted_at: None,
        created_at: Utc::now(),
    };
    insert_auction(pool_store, &auction).await?;
    Ok(auction.id)
}

async fn insert_auction(store: &AuctionStore, a: &Auction) -> anyhow::Result<()> {
    let mut tx = store.begin().await?;
    sqlx::query(
        "INSERT INTO auctions (id, item_id, seller_id, start_price, current_price, \
                               bid_increment, min_bid_amount, start_time, end_time, status, \
                               auto_extend, extend_minutes, version, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(a.id)
    .bind(a.item_id)
    .bind(a.seller_id)
    .bind(a.start_price)
    .bind(a.current_price)
    .bind(a.bid_increment)
    .bind(a.min_bid_amount)
    .bind(a.start_time)
    .bind(a.end_time)
    .bind(a.status)
    .bind(a.auto_extend)
    .bind(a.extend_minutes)
    .bind(a.version)
    .bind(a.created_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn increment_rules_across_successive_bids(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), false).await?;
    let bidder = UserId::new();

    // Opening bid at the start price is accepted.
    let bid = f
        .placement
        .place_bid(auction_id, bidder, 100_000, RequestMeta::default())
        .await?;
    assert!(bid.is_winning);

    let auction = f.store.fetch_auction(auction_id).await?;
    let Some(auction) = auction else {
        panic!("auction must exist");
    };
    assert_eq!(auction.current_price, 100_000);
    assert_eq!(auction.total_bids, 1);

    // Below the increment: rejected with the exact computed minimum.
    let second = UserId::new();
    let err = f
        .placement
        .place_bid(auction_id, second, 103_000, RequestMeta::default())
        .await;
    match err {
        Err(AuctionError::BidTooLow { minimum }) => assert_eq!(minimum, 105_000),
        other => panic!("expected BidTooLow, got {other:?}"),
    }

    // At the increment: accepted, price follows.
    f.placement
        .place_bid(auction_id, second, 105_000, RequestMeta::default())
        .await?;
    let Some(auction) = f.store.fetch_auction(auction_id).await? else {
        panic!("auction must exist");
    };
    assert_eq!(auction.current_price, 105_000);
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn single_winner_invariant_and_outbid(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), false).await?;
    let alice = UserId::new();
    let bob = UserId::new();

    f.placement
        .place_bid(auction_id, alice, 100_000, RequestMeta::default())
        .await?;
    f.placement
        .place_bid(auction_id, bob, 110_000, RequestMeta::default())
        .await?;

    let winners = f.store.winners(auction_id).await?;
    assert_eq!(winners.len(), 1);
    let Some(winner) = winners.first() else {
        panic!("winner row expected");
    };
    assert_eq!(winner.bidder_id, bob);
    assert_eq!(winner.amount, 110_000);
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn retracting_winner_reverts_to_previous_bidder(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), false).await?;
    let alice = UserId::new();
    let bob = UserId::new();

    f.placement
        .place_bid(auction_id, alice, 100_000, RequestMeta::default())
        .await?;
    let bob_bid = f
        .placement
        .place_bid(auction_id, bob, 110_000, RequestMeta::default())
        .await?;

    f.retraction
        .retract_bid(
            bob_bid.id,
            Claims {
                user_id: bob,
                role: ActorRole::User,
            },
        )
        .await?;

    let winners = f.store.winners(auction_id).await?;
    let Some(winner) = winners.first() else {
        panic!("previous bidder should win again");
    };
    assert_eq!(winner.bidder_id, alice);

    let Some(auction) = f.store.fetch_auction(auction_id).await? else {
        panic!("auction must exist");
    };
    assert_eq!(auction.current_price, 100_000);
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn retracting_last_bid_resets_to_start_price(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), false).await?;
    let alice = UserId::new();

    let bid = f
        .placement
        .place_bid(auction_id, alice, 120_000, RequestMeta::default())
        .await?;
    f.retraction
        .retract_bid(
            bid.id,
            Claims {
                user_id: alice,
                role: ActorRole::User,
            },
        )
        .await?;

    let Some(auction) = f.store.fetch_auction(auction_id).await? else {
        panic!("auction must exist");
    };
    assert_eq!(auction.current_price, 100_000);
    assert!(f.store.winners(auction_id).await?.is_empty());

    // A second retraction of the same bid is rejected.
    let err = f
        .retraction
        .retract_bid(
            bid.id,
            Claims {
                user_id: alice,
                role: ActorRole::User,
            },
        )
        .await;
    assert!(matches!(err, Err(AuctionError::BidAlreadyRetracted)));
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn equal_amounts_resolve_to_earliest_bid(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), false).await?;
    let alice = UserId::new();
    let bob = UserId::new();
    let carol = UserId::new();

    // Alice and Bob both end up at 100_000 (Bob's bid is later and loses
    // the tie); Carol outbids both, then retracts.
    f.placement
        .place_bid(auction_id, alice, 100_000, RequestMeta::default())
        .await?;
    // Bob cannot bid 100_000 while Alice wins at that amount, so seed his
    // equal-amount bid directly as a demoted row.
    let mut tx = f.store.begin().await?;
    sqlx::query(
        "INSERT INTO bids (id, auction_id, bidder_id, amount, is_winning, is_retracted, created_at) \
         VALUES ($1, $2, $3, $4, FALSE, FALSE, now())",
    )
    .bind(auction_gateway::domain::BidId::new())
    .bind(auction_id)
    .bind(bob)
    .bind(100_000_i64)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    let carol_bid = f
        .placement
        .place_bid(auction_id, carol, 110_000, RequestMeta::default())
        .await?;
    f.retraction
        .retract_bid(
            carol_bid.id,
            Claims {
                user_id: carol,
                role: ActorRole::User,
            },
        )
        .await?;

    let winners = f.store.winners(auction_id).await?;
    let Some(winner) = winners.first() else {
        panic!("a winner should be re-selected");
    };
    assert_eq!(winner.bidder_id, alice, "earliest equal bid wins the tie");
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn owner_rejection_records_audit_fields(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), false).await?;
    let alice = UserId::new();

    let bid = f
        .placement
        .place_bid(auction_id, alice, 100_000, RequestMeta::default())
        .await?;
    f.retraction
        .retract_bid(
            bid.id,
            Claims {
                user_id: f.seller,
                role: ActorRole::User,
            },
        )
        .await?;

    let Some(stored) = f.store.fetch_bid(bid.id).await? else {
        panic!("bid must exist");
    };
    assert!(stored.is_retracted);
    assert!(stored.rejected_at.is_some());
    assert_eq!(stored.rejected_by, Some(f.seller));

    // A stranger is not allowed to retract at all.
    let other_bid = f
        .placement
        .place_bid(auction_id, UserId::new(), 110_000, RequestMeta::default())
        .await?;
    let err = f
        .retraction
        .retract_bid(
            other_bid.id,
            Claims {
                user_id: UserId::new(),
                role: ActorRole::User,
            },
        )
        .await;
    assert!(matches!(err, Err(AuctionError::RetractionForbidden)));
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn late_bid_extends_deadline_and_bumps_version_once(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    // Deadline 3 minutes out, inside the 5-minute extend window.
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::minutes(3), true).await?;
    let Some(before) = f.store.fetch_auction(auction_id).await? else {
        panic!("auction must exist");
    };

    f.placement
        .place_bid(auction_id, UserId::new(), 100_000, RequestMeta::default())
        .await?;

    let Some(after) = f.store.fetch_auction(auction_id).await? else {
        panic!("auction must exist");
    };
    assert!(after.end_time > before.end_time, "deadline must move forward");
    assert!(after.end_time >= Utc::now() + Duration::minutes(4));
    assert_eq!(after.version, before.version + 1);
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn far_deadline_is_not_extended(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), true).await?;
    let Some(before) = f.store.fetch_auction(auction_id).await? else {
        panic!("auction must exist");
    };

    f.placement
        .place_bid(auction_id, UserId::new(), 100_000, RequestMeta::default())
        .await?;

    let Some(after) = f.store.fetch_auction(auction_id).await? else {
        panic!("auction must exist");
    };
    assert_eq!(after.end_time, before.end_time);
    assert_eq!(after.version, before.version);
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn sweep_closes_expired_auction_and_blocks_bids(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), false).await?;
    let alice = UserId::new();
    f.placement
        .place_bid(auction_id, alice, 100_000, RequestMeta::default())
        .await?;

    // Force the deadline into the past, then sweep.
    let mut tx = f.store.begin().await?;
    sqlx::query("UPDATE auctions SET end_time = now() - interval '1 minute' WHERE id = $1")
        .bind(auction_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let closed = f.sweeper.sweep_once(Utc::now()).await?;
    assert_eq!(closed, 1);

    let Some(auction) = f.store.fetch_auction(auction_id).await? else {
        panic!("auction must exist");
    };
    assert_eq!(auction.status, AuctionStatus::Ended);
    assert_eq!(auction.winner_id, Some(alice));

    // Closure is idempotent: a second sweep is a no-op.
    let closed_again = f.sweeper.sweep_once(Utc::now()).await?;
    assert_eq!(closed_again, 0);

    // And the closed auction no longer accepts bids.
    let err = f
        .placement
        .place_bid(auction_id, UserId::new(), 200_000, RequestMeta::default())
        .await;
    assert!(matches!(
        err,
        Err(AuctionError::AuctionNotActive | AuctionError::AuctionEnded)
    ));
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn concurrent_bids_admit_exactly_one(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), false).await?;

    // Both amounts satisfy the rules against the seeded state; after one
    // commits, the other no longer clears the increment.
    let placement = f.placement.clone();
    let first = tokio::spawn({
        let placement = placement.clone();
        async move {
            placement
                .place_bid(auction_id, UserId::new(), 100_000, RequestMeta::default())
                .await
        }
    });
    let second = tokio::spawn(async move {
        placement
            .place_bid(auction_id, UserId::new(), 102_000, RequestMeta::default())
            .await
    });

    let results = [first.await?, second.await?];
    let ok_count = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok_count, 1, "exactly one concurrent bid may win the race");
    let Some(loser) = results.iter().find(|r| r.is_err()) else {
        panic!("one bid must lose");
    };
    assert!(matches!(loser, Err(AuctionError::BidTooLow { .. })));

    let Some(auction) = f.store.fetch_auction(auction_id).await? else {
        panic!("auction must exist");
    };
    assert_eq!(auction.total_bids, 1);
    Ok(())
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL"]
async fn seller_cannot_bid_and_missing_auction_404s(pool: PgPool) -> anyhow::Result<()> {
    let f = fixture(pool);
    let auction_id = seed_auction(&f.store, f.seller, Utc::now() + Duration::hours(1), false).await?;

    let err = f
        .placement
        .place_bid(auction_id, f.seller, 100_000, RequestMeta::default())
        .await;
    assert!(matches!(err, Err(AuctionError::SelfBid)));

    let err = f
        .placement
        .place_bid(AuctionId::new(), UserId::new(), 100_000, RequestMeta::default())
        .await;
    assert!(matches!(err, Err(AuctionError::AuctionNotFound(_))));
    Ok(())
}
