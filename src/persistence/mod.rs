//! Persistence layer: the PostgreSQL auction store.
//!
//! The store is the transactional source of truth for auctions and bids.
//! All read-then-write protocols (bid placement, retraction, expiry
//! closure) lock the auction row inside a transaction; plain reads and
//! the aggregation queries run against the pool directly.

pub mod models;
pub mod postgres;

pub use models::{AuctionParticipant, LeaderboardEntry};
pub use postgres::AuctionStore;
