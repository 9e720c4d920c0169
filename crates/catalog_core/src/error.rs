use shared::{domain::ItemId, error::ApiError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("request to catalog backend failed: {0}")]
    Transport(String),
    #[error("catalog backend did not answer in time")]
    Timeout,
    #[error("catalog backend rejected the request with status {status}: {error}")]
    Rejected { status: u16, error: ApiError },
    #[error("unexpected response from catalog backend: {0}")]
    Decode(String),
    #[error("catalog backend is unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Short text suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { error, .. } => error.message.clone(),
            Self::Timeout => "The request timed out".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("sign in required")]
    AuthRequired,
    #[error(transparent)]
    Remote(#[from] GatewayError),
    #[error("item {0} is not in the current snapshot")]
    NotFound(ItemId),
}
