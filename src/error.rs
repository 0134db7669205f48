//! Domain error taxonomy and its HTTP mapping

use crate::database::error::DatabaseError;
use crate::payments::error::PayoutError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

pub type WithdrawalResult<T> = Result<T, WithdrawalError>;
pub type AuthResult<T> = Result<T, AuthError>;

/// Caller credential failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization required")]
    MissingCredentials,

    #[error("Invalid session. Sign in again")]
    InvalidSession,

    #[error("Session expired. Sign in again and retry the withdrawal")]
    SessionExpired,

    #[error("Invalid session token. Sign out and sign in again")]
    InvalidToken,

    #[error("Auth service unavailable: {message}")]
    Unavailable { message: String },
}

/// Errors surfaced by the withdrawal pipeline
#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No eligible row: missing, not owned, or not in a processable state
    #[error("Withdrawal request not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Prepare(String),

    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Gateway(PayoutError),

    #[error("{0}")]
    Persistence(String),

    #[error("{0}")]
    Internal(String),
}

impl WithdrawalError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::Unavailable { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Prepare(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) | Self::Persistence(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<PayoutError> for WithdrawalError {
    fn from(err: PayoutError) -> Self {
        match err {
            PayoutError::Configuration { message } => WithdrawalError::Configuration(message),
            other => WithdrawalError::Gateway(other),
        }
    }
}

impl From<DatabaseError> for WithdrawalError {
    fn from(err: DatabaseError) -> Self {
        if err.is_not_found() {
            WithdrawalError::NotFound
        } else if err.is_validation() {
            WithdrawalError::Validation(err.to_string())
        } else {
            WithdrawalError::Persistence(err.to_string())
        }
    }
}

impl IntoResponse for WithdrawalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::error::DatabaseErrorKind;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            WithdrawalError::from(AuthError::MissingCredentials).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(WithdrawalError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            WithdrawalError::Prepare("boom".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WithdrawalError::from(PayoutError::IdMissing).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            WithdrawalError::from(PayoutError::configuration("no mode")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_gateway_message_is_verbatim() {
        let err = WithdrawalError::from(PayoutError::rejected(422, "insufficient funds"));
        assert_eq!(err.to_string(), "insufficient funds");
    }

    #[test]
    fn test_database_error_mapping() {
        let err = WithdrawalError::from(DatabaseError::new(DatabaseErrorKind::InvalidAmount {
            amount: -5,
        }));
        assert!(matches!(err, WithdrawalError::Validation(_)));

        let err = WithdrawalError::from(DatabaseError::not_found("Withdrawal", "x"));
        assert!(err.is_not_found());

        let err = WithdrawalError::from(DatabaseError::new(DatabaseErrorKind::PoolExhausted));
        assert!(matches!(err, WithdrawalError::Persistence(_)));
    }
}
