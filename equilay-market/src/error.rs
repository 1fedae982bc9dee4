//! Error types for the search client.

use thiserror::Error;

/// Result type for search requests.
pub type Result<T> = std::result::Result<T, MarketError>;

#[derive(Error, Debug)]
pub enum MarketError {
    /// The request could not be sent or the connection failed.
    #[error("failed to send request")]
    Request(#[source] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("bad response from server; code {status}; body: {body}")]
    BadResponse { status: u16, body: String },

    /// The response body was not a generation response.
    #[error("failed to decode response")]
    Decode(#[source] reqwest::Error),

    /// The API key contains characters that cannot go in a header.
    #[error("invalid API key")]
    InvalidApiKey(#[source] reqwest::header::InvalidHeaderValue),

    /// The base URL could not be parsed or joined.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl MarketError {
    /// Whether retrying the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::BadResponse { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
