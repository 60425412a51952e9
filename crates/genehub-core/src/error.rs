//! Error types for the genehub workspace.

use thiserror::Error;

/// Result type alias using genehub's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for genehub operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input (bad pagination values, unsupported parameter, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Query string exceeds the configured maximum length
    #[error("Query string too long ({len} > {max} characters)")]
    QueryTooLong { len: usize, max: usize },

    /// Query text failed tokenization (dangling quote, stray backslash)
    #[error("Malformed input query: {0}")]
    MalformedQuery(String),

    /// Index query failed
    #[error("Search error: {0}")]
    Search(String),

    /// A single id matched more than one indexed document
    #[error("Ambiguous id: {0}")]
    AmbiguousId(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Remote service returned a non-success status
    #[error("Remote service error ({status}): {body}")]
    RemoteService { status: u16, body: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl Error {
    /// True when the underlying failure is a timed-out backend call.
    ///
    /// Used by the gene resolver to rewrite raw timeout errors into a
    /// user-actionable message.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Request(msg) => msg.contains("timed out") || msg.contains("timeout"),
            _ => false,
        }
    }
}
