use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error: {code} - {message}")]
    ApiError {
        code: i32,
        message: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response payload: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

/// Coarse classification of an [`ExchangeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any network I/O.
    Validation,
    /// DNS, TLS, connect, timeout or body read failure.
    Transport,
    /// The server answered with status >= 400.
    Api,
    /// Success status, but the payload did not match the expected shape.
    Decode,
    /// An internal consistency check failed. Not recoverable.
    InvariantViolation,
    Auth,
    Config,
}

impl ExchangeError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::HttpError(_) | Self::NetworkError(_) => ErrorKind::Transport,
            Self::ApiError { .. } => ErrorKind::Api,
            Self::DecodeError(_) => ErrorKind::Decode,
            Self::InvalidParameters(_) => ErrorKind::Validation,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::AuthError(_) => ErrorKind::Auth,
            Self::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// Exchange error code for [`ExchangeError::ApiError`], `None` otherwise.
    pub const fn api_code(&self) -> Option<i32> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }
}
