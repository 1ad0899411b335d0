use thiserror::Error;

use crate::error::DeskError;

/// Errors raised by the OAuth flow and credential storage.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not connected")]
    NotConnected,
    #[error("Unknown or expired OAuth state")]
    InvalidState,
    #[error("Expired or invalid grant: {0}")]
    InvalidGrant(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Missing configuration: {0}")]
    MissingConfiguration(&'static str),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

impl From<AuthError> for DeskError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotConnected => DeskError::NotAuthenticated,
            AuthError::InvalidState => DeskError::Validation(error.to_string()),
            AuthError::MissingConfiguration(name) => {
                DeskError::Configuration(format!("{name} is not set"))
            }
            other => DeskError::TokenRefreshFailed(other.to_string()),
        }
    }
}
