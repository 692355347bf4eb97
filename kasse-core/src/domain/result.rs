//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// User-facing swipe outcomes (unknown card, insufficient funds) are not
/// errors; they are reported through [`crate::domain::SwipeResult`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("User already exists")]
    UserExists,

    #[error("Card is already registered")]
    CardExists,

    #[error("Wrong username or password")]
    WrongAuth,

    #[error("Another card registration is in progress")]
    RegistrationBusy,

    #[error("Reader is closed")]
    ReaderClosed,

    #[error("Reader error: {0}")]
    Reader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a reader (hardware) error
    pub fn reader(msg: impl Into<String>) -> Self {
        Self::Reader(msg.into())
    }

    /// True for failures of the storage layer, after which the caller must
    /// not assume that anything was written.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
