use thiserror::Error;

use crate::session::SessionStoreError;

/// Admin client errors
///
/// Only `Unauthorized` and `Authentication` are raised by the request pipeline
/// itself. Transport and parse failures come back as failure envelopes.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("API Error: {status_code} - {message}")]
    Api { status_code: u16, message: String },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Request Error: {0}")]
    Request(String),

    #[error("Session Error: {0}")]
    Session(#[from] SessionStoreError),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AdminError {
    /// Whether the error means there is no usable session
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AdminError::Unauthorized(_))
    }
}

/// Result type for admin client operations
pub type AdminResult<T> = Result<T, AdminError>;
