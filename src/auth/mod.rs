//! Caller authentication
//!
//! Bearer-token sessions, the live-token guard, and the client for the
//! hosted auth server that resolves a token to a user.

pub mod client;
pub mod session;

pub use client::{AuthApiClient, AuthConfig};
pub use session::{Session, SessionGuard, SessionProvider};

use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Uuid,
}

/// Resolves an access token to the user it was issued to
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, access_token: &str) -> AuthResult<CallerIdentity>;
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> AuthResult<&str> {
    static BEARER: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = BEARER
        .get_or_init(|| Regex::new(r"(?i)^Bearer\s+(.+)$").ok())
        .as_ref()
        .ok_or(AuthError::MissingCredentials)?;

    pattern
        .captures(header.trim())
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str().trim())
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer a.b.c").unwrap(), "a.b.c");
        assert_eq!(bearer_token("bearer   a.b.c ").unwrap(), "a.b.c");
        assert_eq!(bearer_token("Basic abc"), Err(AuthError::MissingCredentials));
        assert_eq!(bearer_token("Bearer "), Err(AuthError::MissingCredentials));
        assert_eq!(bearer_token(""), Err(AuthError::MissingCredentials));
    }
}
