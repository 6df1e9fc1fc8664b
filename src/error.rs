//! Gateway error types with HTTP status code mapping.
//!
//! [`AuctionError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::{AuctionId, BidId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "bid too low: minimum required bid is 105000",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`AuctionError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category                       | HTTP Status               |
/// |-----------|--------------------------------|---------------------------|
/// | 1000–1999 | Validation / Auth              | 400 / 401 / 403           |
/// | 2000–2999 | Not Found                      | 404 Not Found             |
/// | 3000–3999 | Server                         | 500 Internal Server Error |
/// | 4000–4999 | Failed Precondition / Conflict | 409 Conflict              |
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    /// Auction with the given ID was not found (or is soft-deleted).
    #[error("auction not found: {0}")]
    AuctionNotFound(AuctionId),

    /// Bid with the given ID was not found.
    #[error("bid not found: {0}")]
    BidNotFound(BidId),

    /// A seller attempted to bid on their own auction.
    #[error("cannot bid on own auction")]
    SelfBid,

    /// The actor is not allowed to retract this bid.
    #[error("not allowed to retract this bid")]
    RetractionForbidden,

    /// Bid amount is below the required minimum. The message carries the
    /// exact computed minimum so clients can correct and resubmit.
    #[error("bid too low: minimum required bid is {minimum}")]
    BidTooLow {
        /// Smallest admissible bid amount for the auction right now.
        minimum: i64,
    },

    /// Auction exists but is not accepting bids (draft or cancelled).
    #[error("auction is not active")]
    AuctionNotActive,

    /// Auction deadline has passed or the auction already ended.
    #[error("auction has ended")]
    AuctionEnded,

    /// The bid was already retracted or rejected.
    #[error("bid already retracted")]
    BidAlreadyRetracted,

    /// Optimistic version check failed inside a transaction.
    #[error("auction was modified concurrently; retry")]
    VersionConflict,

    /// The database reported a serialization failure. Placement retries
    /// once before surfacing this to the caller.
    #[error("transaction serialization failure; retry")]
    SerializationFailure,

    /// Missing or invalid access token.
    #[error("invalid or missing access token")]
    Unauthorized,

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuctionError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::BidTooLow { .. } => 1002,
            Self::SelfBid => 1003,
            Self::RetractionForbidden => 1004,
            Self::Unauthorized => 1005,
            Self::AuctionNotFound(_) => 2001,
            Self::BidNotFound(_) => 2002,
            Self::AuctionNotActive => 4001,
            Self::AuctionEnded => 4002,
            Self::BidAlreadyRetracted => 4003,
            Self::VersionConflict => 4101,
            Self::SerializationFailure => 4102,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BidTooLow { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::SelfBid | Self::RetractionForbidden => StatusCode::FORBIDDEN,
            Self::AuctionNotFound(_) | Self::BidNotFound(_) => StatusCode::NOT_FOUND,
            Self::AuctionNotActive
            | Self::AuctionEnded
            | Self::BidAlreadyRetracted
            | Self::VersionConflict
            | Self::SerializationFailure => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict | Self::SerializationFailure)
    }
}

impl From<sqlx::Error> for AuctionError {
    /// PostgreSQL SQLSTATE 40001 (`serialization_failure`) and 40P01
    /// (`deadlock_detected`) become [`AuctionError::SerializationFailure`]
    /// so callers can retry; everything else is a persistence error.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err
            && matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        {
            return Self::SerializationFailure;
        }
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for AuctionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn bid_too_low_message_carries_minimum() {
        let err = AuctionError::BidTooLow { minimum: 105_000 };
        assert_eq!(
            err.to_string(),
            "bid too low: minimum required bid is 105000"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = AuctionError::AuctionNotFound(AuctionId::new());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), 2001);
    }

    #[test]
    fn precondition_failures_map_to_conflict() {
        assert_eq!(
            AuctionError::AuctionEnded.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuctionError::BidAlreadyRetracted.status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn only_concurrency_errors_are_retryable() {
        assert!(AuctionError::SerializationFailure.is_retryable());
        assert!(AuctionError::VersionConflict.is_retryable());
        assert!(!AuctionError::AuctionEnded.is_retryable());
        assert!(!AuctionError::SelfBid.is_retryable());
    }
}
