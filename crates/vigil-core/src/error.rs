//! Unified error handling for vigil-core

use thiserror::Error;

/// Core error type for vigil-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backend explicitly refused the request. Permanent until the input changes.
    #[error("{0}")]
    Rejected(String),

    /// Network or I/O failure talking to the backend.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid offline credentials")]
    InvalidOfflineCredentials,

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for vigil-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a rejection carrying the backend's message verbatim
    pub fn rejected(msg: impl Into<String>) -> Self {
        Error::Rejected(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Create a crypto error
    pub fn crypto(msg: impl Into<String>) -> Self {
        Error::Crypto(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// True for failures worth retrying later (network, timeouts, 5xx).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Http(_))
    }
}
