//! Domain layer: core types, events, and the pure bid validator.
//!
//! This module contains the server-side domain model: typed identifiers,
//! the auction and bid row types, the domain events broadcast after every
//! committed mutation, and the side-effect-free bid admissibility check.

pub mod auction;
pub mod bid;
pub mod events;
pub mod ids;
pub mod validator;

pub use auction::{Auction, AuctionStatus};
pub use bid::{Bid, RequestMeta};
pub use events::{AuctionEvent, ExtendReason};
pub use ids::{AuctionId, BidId, ItemId, UserId};
pub use validator::validate_bid;
