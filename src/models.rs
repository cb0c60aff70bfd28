//! Request and response types moving through the pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::backoff::RetryAttempt;
use crate::error::FetchError;

/// One logical request, tracked across retries.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub url: Url,
    /// Retry bookkeeping; survives resubmission of the same logical request.
    pub attempt: RetryAttempt,
}

impl CrawlRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            attempt: RetryAttempt::new(),
        }
    }

    /// Rate-limit domain for this request. `None` for hostless URLs, which
    /// are dispatched unpaced and never touch penalty state.
    pub fn domain(&self) -> Option<&str> {
        self.url.host_str()
    }
}

/// Response surfaced by a fetcher. Header names are lower-cased.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl PageResponse {
    /// Header value by lower-cased name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Terminal result for one logical request.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Response handed back unchanged: a success, or an error status
    /// outside the retryable set that the caller wants to observe.
    Delivered(PageResponse),

    /// Retry budget spent. Carries the last signal seen so the caller can
    /// report the failure; the crawl itself continues.
    Exhausted {
        url: String,
        attempts: u32,
        last_response: Option<PageResponse>,
        last_error: Option<FetchError>,
    },
}

impl FetchOutcome {
    pub fn url(&self) -> &str {
        match self {
            FetchOutcome::Delivered(response) => &response.url,
            FetchOutcome::Exhausted { url, .. } => url,
        }
    }
}

/// Per-domain backoff state for end-of-run reporting.
#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    /// Current penalty (zero once the domain has recovered).
    pub penalty: u32,
    /// Current slot delay in seconds.
    pub slot_delay: f64,
}
