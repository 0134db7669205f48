use crate::auth::session::{Session, SessionProvider};
use crate::auth::{Authenticator, CallerIdentity};
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Hosted auth server settings
#[derive(Clone)]
pub struct AuthConfig {
    /// Base URL of the auth API, e.g. `https://<project>.supabase.co/auth/v1`
    pub url: String,
    /// Project key sent as the `apikey` header
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Client for the hosted auth API: token verification and session refresh
pub struct AuthApiClient {
    http_client: Client,
    config: AuthConfig,
}

impl AuthApiClient {
    pub fn new(config: AuthConfig) -> AuthResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Unavailable {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }
}

#[derive(Deserialize)]
struct UserResponse {
    id: Uuid,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

fn unavailable(err: reqwest::Error) -> AuthError {
    AuthError::Unavailable {
        message: err.to_string(),
    }
}

#[async_trait]
impl Authenticator for AuthApiClient {
    async fn authenticate(&self, access_token: &str) -> AuthResult<CallerIdentity> {
        let response = self
            .http_client
            .get(self.endpoint("/user"))
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await
            .map_err(unavailable)?;

        match response.status() {
            status if status.is_success() => {
                let user: UserResponse = response.json().await.map_err(unavailable)?;
                debug!("Authenticated caller {}", user.id);
                Ok(CallerIdentity { user_id: user.id })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(AuthError::InvalidSession)
            }
            status => {
                warn!("Auth server returned {}", status);
                Err(AuthError::Unavailable {
                    message: format!("auth server returned HTTP {}", status),
                })
            }
        }
    }
}

#[async_trait]
impl SessionProvider for AuthApiClient {
    async fn refresh_session(&self, current: &Session) -> AuthResult<Session> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or(AuthError::SessionExpired)?;

        let response = self
            .http_client
            .post(self.endpoint("/token?grant_type=refresh_token"))
            .header("apikey", &self.config.api_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(AuthError::SessionExpired);
        }

        let token: TokenResponse = response.json().await.map_err(unavailable)?;
        Ok(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or_else(|| current.refresh_token.clone()),
            expires_at: token.expires_at.and_then(|exp| DateTime::from_timestamp(exp, 0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AuthApiClient {
        AuthApiClient::new(AuthConfig {
            url: "http://127.0.0.1:9/auth/v1/".to_string(),
            api_key: "anon".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_config_debug_redacts_api_key() {
        let printed = format!(
            "{:?}",
            AuthConfig {
                url: "http://localhost:9999/auth/v1".to_string(),
                api_key: "project-secret-key".to_string(),
                timeout: Duration::from_secs(5),
            }
        );
        assert!(!printed.contains("project-secret-key"));
        assert!(printed.contains("localhost:9999"));
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(client().endpoint("/user"), "http://127.0.0.1:9/auth/v1/user");
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_expires() {
        let err = client()
            .refresh_session(&Session::new("a.b.c", None))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::SessionExpired);
    }
}
