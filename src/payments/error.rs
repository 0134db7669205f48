use thiserror::Error;

pub type PayoutResult<T> = Result<T, PayoutError>;

/// Failures raised while talking to the payout gateway.
///
/// `Display` of `Rejected` is the gateway's own message, untouched, because it
/// is what ends up in `failure_reason`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayoutError {
    #[error("{message}")]
    Configuration { message: String },

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Payout id missing from gateway response")]
    IdMissing,

    #[error("Gateway request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Gateway unreachable: {message}")]
    Network { message: String },

    #[error("Gateway rate limit exceeded. Please try again later")]
    RateLimited,
}

impl PayoutError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<reqwest::Error> for PayoutError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PayoutError::Timeout { seconds: 0 }
        } else {
            PayoutError::network(err.to_string())
        }
    }
}
