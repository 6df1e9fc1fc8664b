//! # auction-gateway
//!
//! REST API and WebSocket gateway for a marketplace auction bidding
//! engine.
//!
//! This crate implements the part of the marketplace with genuine
//! correctness-under-concurrency requirements: accepting concurrent bids
//! against shared, time-bounded auctions, resolving the current winner,
//! extending deadlines against sniping, closing expired auctions, and
//! pushing every committed change to subscribed clients in real time.
//! Profiles, catalog, payments, and delivery channels are external
//! collaborators reached through narrow interfaces.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler + RealtimeHub (ws/)
//!     │
//!     ├── BidPlacementService / BidRetractionService (service/)
//!     ├── ExpirySweeper (service/)
//!     │
//!     ├── Bid Validator + models + events (domain/)
//!     │
//!     └── AuctionStore → PostgreSQL (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
