//! Fetch seam between the dispatcher and the HTTP client.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

use super::user_agent::resolve_user_agent;
use crate::config::CrawlConfig;
use crate::error::FetchError;
use crate::models::PageResponse;

/// One HTTP round trip. Implemented by the reqwest client in production
/// and by scripted fakes in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageResponse, FetchError>;
}

/// reqwest-backed fetcher used by the CLI.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        default_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let mut builder = reqwest::Client::builder()
            .user_agent(resolve_user_agent(config.user_agent.as_deref()))
            .timeout(config.timeout())
            .default_headers(default_headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true);

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PageResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?
            .to_vec();

        Ok(PageResponse {
            url: url.to_string(),
            status,
            headers,
            body,
            fetched_at: Utc::now(),
        })
    }
}
