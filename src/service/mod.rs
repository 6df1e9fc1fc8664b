//! Service layer: business logic orchestration.
//!
//! [`BidPlacementService`] and [`BidRetractionService`] run the
//! transactional protocols against the auction store and fan committed
//! changes out through the real-time hub; [`ExpirySweeper`] closes
//! overdue auctions on a timer; [`notify`] holds the outbound
//! notification seam.

pub mod notify;
pub mod placement;
pub mod retraction;
pub mod sweeper;

pub use notify::{LogNotificationSender, NotificationSender};
pub use placement::BidPlacementService;
pub use retraction::BidRetractionService;
pub use sweeper::ExpirySweeper;
