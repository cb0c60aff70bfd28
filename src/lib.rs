//! Adaptive per-domain pacing and retry control for polite crawling.
//!
//! When a host starts answering with rate-limit or server-error signals,
//! every request to that host slows down, not just the one that failed;
//! once the host recovers, pacing drifts back toward normal. No per-site
//! tuning involved.

pub mod backoff;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;

pub use backoff::BackoffController;
pub use config::{BackoffConfig, CrawlConfig};
pub use error::FetchError;
pub use models::{CrawlRequest, FetchOutcome, PageResponse};
pub use pipeline::{CrawlPipeline, Fetcher, HttpFetcher};
