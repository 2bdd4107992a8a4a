//! Error types for the chain client.

use thiserror::Error;


/// Feed client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure or timeout talking to the feed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed answered with a body that does not match the wire types.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot query could not be encoded.
    #[error("Query encoding error: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    /// The configured base URL does not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The feed answered with a non-success status other than 404.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// No chain, price or expiry list for the requested key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected before sending: empty path segment or non-positive price.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
