//! Error types for the design workspace

use thiserror::Error;

/// Result type alias for workspace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating, storing or exporting projects
#[derive(Error, Debug)]
pub enum Error {
    /// Persistent storage could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport, auth or HTTP status failure talking to the LLM provider
    #[error("Generation request failed: {0}")]
    Gateway(String),

    /// The provider answered, but not with a document matching the schema
    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),

    /// A history bundle could not be imported
    #[error("Failed to import history: {0}")]
    Import(String),

    /// An export could not be produced
    #[error("Failed to export: {0}")]
    Export(String),

    /// Missing or invalid settings (API key, provider, model)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Rejected user input, e.g. an empty prompt
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A project or screen id did not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Gateway(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Export(err.to_string())
    }
}
