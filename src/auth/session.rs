//! Caller sessions and the live-token guard

use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Margin under which a token is treated as already expired
pub const EXPIRY_SKEW_SECS: i64 = 5;

/// Credentials presented by a caller
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at,
        }
    }

    /// Session from a bearer token alone; expiry comes from the `exp` claim
    /// when the token carries a readable one.
    pub fn from_bearer(token: &str) -> Self {
        let token = token.trim();
        Self::new(token, token_expiry(token))
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|expires_at| expires_at <= now + margin)
            .unwrap_or(false)
    }
}

/// `exp` claim of a JWT, without verifying the signature
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claim.exp?, 0)
}

/// Three non-empty dot-separated segments
pub fn is_jwt_like(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3 && segments.iter().all(|segment| !segment.is_empty())
}

/// Source of fresh sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Exchange the current session for a fresh one
    async fn refresh_session(&self, current: &Session) -> AuthResult<Session>;
}

/// Makes sure a money-moving call never goes out with a stale credential.
///
/// Runs once per processing request; the gateway calls that follow share the
/// resulting token.
#[derive(Clone)]
pub struct SessionGuard {
    provider: Arc<dyn SessionProvider>,
    skew: Duration,
}

impl SessionGuard {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            provider,
            skew: Duration::seconds(EXPIRY_SKEW_SECS),
        }
    }

    /// Live, well-formed access token for `session`, refreshing it first when
    /// it expires within the skew margin.
    pub async fn ensure_live_token(&self, session: &Session) -> AuthResult<String> {
        let mut token = session.access_token.clone();

        if session.expires_within(self.skew, Utc::now()) {
            debug!("Session close to expiry, refreshing");
            let refreshed = self.provider.refresh_session(session).await.map_err(|e| {
                warn!("Session refresh failed: {}", e);
                AuthError::SessionExpired
            })?;
            token = refreshed.access_token;
        }

        if !is_jwt_like(&token) {
            return Err(AuthError::InvalidToken);
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(json!({ "sub": "user", "exp": exp }).to_string());
        format!("{}.{}.signature", header, claims)
    }

    struct CountingProvider {
        calls: AtomicUsize,
        result: AuthResult<Session>,
    }

    #[async_trait]
    impl SessionProvider for CountingProvider {
        async fn refresh_session(&self, _current: &Session) -> AuthResult<Session> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn guard(result: AuthResult<Session>) -> (SessionGuard, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            result,
        });
        (SessionGuard::new(provider.clone()), provider)
    }

    #[test]
    fn test_token_expiry_from_claims() {
        let token = jwt_with_exp(1_900_000_000);
        assert_eq!(
            token_expiry(&token),
            DateTime::from_timestamp(1_900_000_000, 0)
        );
        assert_eq!(token_expiry("not-a-token"), None);
        assert_eq!(token_expiry("a.%%%.c"), None);
    }

    #[test]
    fn test_is_jwt_like() {
        assert!(is_jwt_like("a.b.c"));
        assert!(!is_jwt_like("a.b"));
        assert!(!is_jwt_like("a..c"));
        assert!(!is_jwt_like("a.b.c.d"));
    }

    #[tokio::test]
    async fn test_live_token_is_used_as_is() {
        let (guard, provider) = guard(Err(AuthError::InvalidSession));
        let token = jwt_with_exp((Utc::now() + Duration::hours(1)).timestamp());
        let session = Session::from_bearer(&token);

        assert_eq!(guard.ensure_live_token(&session).await.unwrap(), token);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_token_near_expiry_is_refreshed() {
        let fresh = jwt_with_exp((Utc::now() + Duration::hours(1)).timestamp());
        let (guard, provider) = guard(Ok(Session::new(fresh.clone(), None)));
        let stale = jwt_with_exp((Utc::now() + Duration::seconds(2)).timestamp());

        let token = guard
            .ensure_live_token(&Session::from_bearer(&stale))
            .await
            .unwrap();
        assert_eq!(token, fresh);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_session_expired() {
        let (guard, _) = guard(Err(AuthError::InvalidSession));
        let expired = jwt_with_exp((Utc::now() - Duration::minutes(5)).timestamp());

        let err = guard
            .ensure_live_token(&Session::from_bearer(&expired))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::SessionExpired);
    }

    #[tokio::test]
    async fn test_malformed_token_is_rejected() {
        let (guard, _) = guard(Err(AuthError::InvalidSession));
        let err = guard
            .ensure_live_token(&Session::new("opaque-token", None))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::new("secret.token.value", None);
        assert!(!format!("{:?}", session).contains("secret"));
    }
}
