//! Error types for provision-api

use thiserror::Error;

/// Result type for infrastructure API calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure reported by the infrastructure provider for a single call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The provider answered with a non-success status
    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body could not be interpreted
    #[error("unreadable provider response: {0}")]
    Decode(String),

    /// A long-running provider operation never reached `DONE`
    #[error("operation {0} did not finish in time")]
    Timeout(String),

    /// A create call needed the remote id of a resource that was not resolved
    #[error("no remote id resolved for dependency {0}")]
    MissingReference(String),

    /// Failure configured on a fake backend
    #[error("injected failure: {0}")]
    Injected(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
