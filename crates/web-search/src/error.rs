//! Error types for web search and page fetching.

use thiserror::Error;

/// Errors that can occur while fetching or extracting web content.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A required input was missing.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The URL could not be parsed or is not http(s).
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The target resolves to a loopback, private or link-local address.
    #[error("Access to private address denied: {0}")]
    PrivateAddress(String),

    /// The request took longer than the configured timeout.
    #[error("Request timeout - the website took too long to respond")]
    Timeout,

    /// The site answered with a non-success status.
    #[error("Website error: HTTP {status}")]
    Status { status: u16 },

    /// The request could not be sent or the body could not be read.
    #[error("Could not reach website: {0}")]
    Network(String),

    /// A response arrived but carried no usable body.
    #[error("No content returned")]
    EmptyBody,

    /// Every fetch strategy failed.
    #[error("All fetch strategies failed: {}", .0.join("; "))]
    AllStrategiesFailed(Vec<String>),

    /// The page had too little text to be useful.
    #[error("No meaningful content extracted from webpage")]
    NoMeaningfulContent,

    /// Client construction failed.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SearchError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else {
            SearchError::Network(e.to_string())
        }
    }
}

/// Result type for web search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
