//! Access-token verification seam.
//!
//! Identity and authentication mechanics live in an external identity
//! service; the gateway only needs to turn a presented token into a user
//! and role before admitting a session or accepting a mutation. That
//! narrow contract is [`TokenVerifier`]; deployments plug their identity
//! provider in behind it.
//!
//! [`SharedSecretVerifier`] is the shipped development implementation:
//! it accepts `"<user-uuid>:<secret>"` tokens checked against configured
//! secrets.

use std::fmt;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::AuctionError;

/// Role attached to an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    /// Ordinary marketplace user (buyer or seller).
    User,
    /// Platform administrator.
    Admin,
}

/// Verified identity extracted from an access token.
#[derive(Debug, Clone, Copy)]
pub struct Claims {
    /// The authenticated user.
    pub user_id: UserId,
    /// The authenticated role.
    pub role: ActorRole,
}

/// Turns a presented access token into verified claims.
///
/// Implementations must be cheap and local: this runs on every WebSocket
/// handshake and every REST mutation.
pub trait TokenVerifier: Send + Sync + fmt::Debug {
    /// Verifies `token`, returning its claims or `None` when the token is
    /// invalid.
    fn verify(&self, token: &str) -> Option<Claims>;
}

/// Development verifier for `"<user-uuid>:<secret>"` tokens.
///
/// A token carrying the admin secret authenticates as [`ActorRole::Admin`];
/// the user secret authenticates as [`ActorRole::User`].
#[derive(Clone)]
pub struct SharedSecretVerifier {
    user_secret: String,
    admin_secret: Option<String>,
}

impl fmt::Debug for SharedSecretVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets stay out of logs.
        f.debug_struct("SharedSecretVerifier").finish_non_exhaustive()
    }
}

impl SharedSecretVerifier {
    /// Creates a verifier with the given secrets.
    #[must_use]
    pub fn new(user_secret: String, admin_secret: Option<String>) -> Self {
        Self {
            user_secret,
            admin_secret,
        }
    }
}

impl TokenVerifier for SharedSecretVerifier {
    fn verify(&self, token: &str) -> Option<Claims> {
        let (user, secret) = token.split_once(':')?;
        let role = if self.admin_secret.as_deref() == Some(secret) {
            ActorRole::Admin
        } else if secret == self.user_secret {
            ActorRole::User
        } else {
            return None;
        };
        let user_id = user.parse::<uuid::Uuid>().ok().map(UserId::from)?;
        Some(Claims { user_id, role })
    }
}

/// Axum extractor for the authenticated caller of a REST endpoint.
///
/// Reads `Authorization: Bearer <token>` and verifies it through the
/// state's [`TokenVerifier`]. Rejections surface as
/// [`AuctionError::Unauthorized`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuctionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuctionError::Unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuctionError::Unauthorized)?;
        let claims = state
            .token_verifier
            .verify(token)
            .ok_or(AuctionError::Unauthorized)?;
        Ok(Self(claims))
    }
}

/// Convenience alias for the shared verifier handle held in state.
pub type SharedVerifier = Arc<dyn TokenVerifier>;

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn valid_user_token_verifies() {
        let verifier = SharedSecretVerifier::new("s3cret".to_string(), None);
        let user = UserId::new();
        let Some(claims) = verifier.verify(&format!("{user}:s3cret")) else {
            panic!("expected valid claims");
        };
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.role, ActorRole::User);
    }

    #[test]
    fn admin_secret_grants_admin_role() {
        let verifier =
            SharedSecretVerifier::new("s3cret".to_string(), Some("admin-s3cret".to_string()));
        let user = UserId::new();
        let Some(claims) = verifier.verify(&format!("{user}:admin-s3cret")) else {
            panic!("expected valid claims");
        };
        assert_eq!(claims.role, ActorRole::Admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = SharedSecretVerifier::new("s3cret".to_string(), None);
        let user = UserId::new();
        assert!(verifier.verify(&format!("{user}:nope")).is_none());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let verifier = SharedSecretVerifier::new("s3cret".to_string(), None);
        assert!(verifier.verify("no-separator").is_none());
        assert!(verifier.verify("not-a-uuid:s3cret").is_none());
        assert!(verifier.verify("").is_none());
    }
}
