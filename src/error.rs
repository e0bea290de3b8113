//! Error types for Spotter.

use thiserror::Error;

/// Library-level error type for Spotter operations.
#[derive(Error, Debug)]
pub enum SpotterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse source {path}: {reason}")]
    SourceParse { path: String, reason: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No index has been built or loaded yet. Run 'spotter build' first.")]
    IndexNotBuilt,

    #[error("Invalid index artifact: {0}")]
    IndexFormat(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Spotter operations.
pub type Result<T> = std::result::Result<T, SpotterError>;
