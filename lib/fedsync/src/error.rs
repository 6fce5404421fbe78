//! Fedsync error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FedsyncError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Upstream rejected request (HTTP {0}): {1}")]
    UpstreamRejected(u16, String),

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Secret backend unavailable: {0}")]
    SecretBackendUnavailable(String),

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Unknown auth method: {0}")]
    UnknownAuthMethod(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

impl From<reqwest::Error> for FedsyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FedsyncError::Timeout(e.to_string())
        } else if e.is_decode() {
            FedsyncError::Decode(e.to_string())
        } else {
            FedsyncError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FedsyncError {
    fn from(e: serde_json::Error) -> Self {
        FedsyncError::Decode(e.to_string())
    }
}
