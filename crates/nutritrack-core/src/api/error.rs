use thiserror::Error;

use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("No authentication token found")]
    NotAuthenticated,

    #[error("Session expired, please login again")]
    SessionExpired,

    #[error("Request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Maximum length for server messages carried in error values
const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

impl AuthError {
    /// Truncate a server message to avoid carrying excessive data around
    pub(crate) fn truncate_message(message: &str) -> String {
        if message.len() <= MAX_ERROR_MESSAGE_LENGTH {
            message.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &message[..MAX_ERROR_MESSAGE_LENGTH],
                message.len()
            )
        }
    }
}
