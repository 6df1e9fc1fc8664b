//! Type-safe identifiers for auctions, bids, users, and listed items.
//!
//! Each ID is a newtype wrapper around [`uuid::Uuid`] (v4) providing type
//! safety so that, for example, a bid identifier can never be passed where
//! an auction identifier is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for an auction.
///
/// Wraps a UUID v4. Generated once at auction creation time and immutable
/// thereafter. Used as the room key in the real-time hub, the event
/// discriminator, and the primary key of the `auctions` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AuctionId(uuid::Uuid);

/// Unique identifier for a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct BidId(uuid::Uuid);

/// Unique identifier for a user (seller or bidder).
///
/// User records themselves live in the profile service; the core only
/// carries their IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(uuid::Uuid);

/// Unique identifier for the listed item an auction sells.
///
/// Item records live in the catalog service; the core only references them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ItemId(uuid::Uuid);

macro_rules! id_impls {
    ($name:ident) => {
        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_impls!(AuctionId);
id_impls!(BidId);
id_impls!(UserId);
id_impls!(ItemId);
