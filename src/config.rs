//! Crawl pipeline configuration.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Backoff tuning, the `[backoff]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay in seconds at penalty 1, and the floor reported at penalty 0.
    pub base_delay: f64,
    /// Hard cap in seconds on the computed per-domain delay.
    pub max_delay: f64,
    /// Penalty units removed per healthy signal.
    pub decay_step: u32,
    /// Lower clamp applied before writing a delay into a domain slot.
    pub min_slot_delay: f64,
    /// Upper clamp applied before writing a delay into a domain slot.
    pub max_slot_delay: f64,
    /// HTTP status codes that take the retry path.
    pub retryable_status_codes: HashSet<u16>,
    /// Retries allowed per logical request, beyond the first attempt.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: 1.0,
            max_delay: 300.0,
            decay_step: 1,
            min_slot_delay: 0.25,
            max_slot_delay: 60.0,
            retryable_status_codes: [429, 500, 502, 503, 504, 522, 524, 408].into_iter().collect(),
            max_attempts: 5,
        }
    }
}

impl BackoffConfig {
    /// Whether a status code takes the retry path.
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}

/// Global configuration for the crawl pipeline.
///
/// Loaded from a TOML file when one is given; every field falls back to a
/// built-in default otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Total in-flight requests across all domains.
    pub max_concurrent_requests: usize,
    /// In-flight requests per domain.
    pub max_concurrent_per_domain: usize,
    /// Per-request timeout in seconds. Kept tight to avoid long hangs.
    pub request_timeout: f64,
    /// User agent: unset for the default, `"impersonate"` for a rotating
    /// browser user agent, anything else used verbatim.
    pub user_agent: Option<String>,
    /// Optional proxy URL applied to every request.
    pub proxy: Option<String>,
    /// Backoff tuning.
    pub backoff: BackoffConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 16,
            max_concurrent_per_domain: 8,
            request_timeout: 25.0,
            user_agent: None,
            proxy: None,
            backoff: BackoffConfig::default(),
        }
    }
}

impl CrawlConfig {
    /// Load configuration from a TOML file, or defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let data = fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&data)
                    .with_context(|| format!("parsing config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Per-request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout)
    }
}
