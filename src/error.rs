//! TagIt error types

use thiserror::Error;

/// TagIt error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel error
    #[error("Channel error: {0}")]
    Channel(String),

    /// Bot runtime error
    #[error("Bot error: {0}")]
    Bot(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Input rejected by a conversation guard (bad URL, empty tag, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A referenced row does not exist for this owner
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for TagIt operations
pub type Result<T> = std::result::Result<T, Error>;
