use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

use crate::phase::RoundPhase;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Identity or credential failure reported by the auth endpoints.
    #[error("{0}")]
    Auth(ApiError),
    /// Any other remote failure.
    #[error("{0}")]
    Api(ApiError),
    /// An authenticated operation was invoked without a held token.
    #[error("not authorized")]
    NotAuthorized,
    #[error("round is {0}; taps are only accepted while it is active")]
    TapRejected(RoundPhase),
    #[error("a tap for this round is already in flight")]
    TapInFlight,
    #[error("round details are not loaded")]
    RoundUnavailable,
}

impl ClientError {
    pub fn auth(code: ErrorCode, message: impl Into<String>) -> Self {
        ClientError::Auth(ApiError::new(code, message))
    }

    pub fn api(code: ErrorCode, message: impl Into<String>) -> Self {
        ClientError::Api(ApiError::new(code, message))
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Auth(err) | ClientError::Api(err) => Some(err.code),
            ClientError::NotAuthorized => Some(ErrorCode::Unauthorized),
            ClientError::TapRejected(_)
            | ClientError::TapInFlight
            | ClientError::RoundUnavailable => None,
        }
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, ClientError::Auth(_) | ClientError::Api(_))
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
