use inkpot_common::validation::ValidationErrors;
use thiserror::Error;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Everything a call to the API can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    /// 401. The stored token has already been cleared.
    #[error("Unauthenticated: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("The given data was invalid: {0}")]
    Validation(ValidationErrors),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Token storage error: {0}")]
    Io(#[from] std::io::Error),
}
