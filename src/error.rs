//! Error types crossing the pipeline boundary.

use thiserror::Error;

/// Transport-level failure from a fetch attempt.
///
/// Every variant is a connection-layer problem with no HTTP response to
/// inspect; the backoff layer treats them all as retryable.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request exceeded the configured timeout.
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// Connection could not be established (refused, reset, DNS failure).
    #[error("connection failed for {url}: {detail}")]
    Connect { url: String, detail: String },

    /// Any other transport failure (mid-body error, protocol error).
    #[error("transport error for {url}: {detail}")]
    Transport { url: String, detail: String },
}

impl FetchError {
    /// Map a reqwest error onto the transport taxonomy.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            FetchError::Connect {
                url: url.to_string(),
                detail: err.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                detail: err.to_string(),
            }
        }
    }

    /// URL of the failed request.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url }
            | FetchError::Connect { url, .. }
            | FetchError::Transport { url, .. } => url,
        }
    }
}
