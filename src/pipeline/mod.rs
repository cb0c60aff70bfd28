//! Generic paced crawl pipeline.
//!
//! Pulls queued requests, paces each one through its domain's slot,
//! fetches, and routes the response or transport failure through the
//! backoff controller. Retries re-enter the same queue; terminal outcomes
//! go to the caller's channel.

mod fetcher;
mod slot;
mod user_agent;

pub use fetcher::{Fetcher, HttpFetcher};
pub use slot::{DomainSlot, SlotMap};
pub use user_agent::{resolve_user_agent, rotate_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::debug;
use url::Url;

use crate::backoff::BackoffController;
use crate::config::CrawlConfig;
use crate::models::{CrawlRequest, FetchOutcome};

/// Queue depth for pending dispatches, including resubmissions.
const DISPATCH_QUEUE_DEPTH: usize = 1024;

/// Request pipeline with adaptive per-domain pacing.
///
/// The pipeline owns the dispatch queue and the slot registry; the
/// controller holds a sender into the same queue so delayed retries flow
/// through the normal dispatch path.
pub struct CrawlPipeline {
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    slots: Arc<SlotMap>,
    controller: Arc<BackoffController>,
    queue_tx: mpsc::Sender<CrawlRequest>,
    queue_rx: mpsc::Receiver<CrawlRequest>,
}

impl CrawlPipeline {
    pub fn new(config: CrawlConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(DISPATCH_QUEUE_DEPTH);
        let slots = Arc::new(SlotMap::new(
            Duration::from_secs_f64(config.backoff.min_slot_delay),
            config.max_concurrent_per_domain,
        ));
        let controller = Arc::new(BackoffController::new(
            &config.backoff,
            slots.clone(),
            queue_tx.clone(),
        ));
        Self {
            config,
            fetcher,
            slots,
            controller,
            queue_tx,
            queue_rx,
        }
    }

    /// Backoff controller shared with this pipeline.
    pub fn controller(&self) -> Arc<BackoffController> {
        self.controller.clone()
    }

    /// Per-domain slot registry, for reporting.
    pub fn slots(&self) -> Arc<SlotMap> {
        self.slots.clone()
    }

    /// Crawl the seed URLs to completion, sending one terminal outcome per
    /// seed into `outcome_tx`. Returns once every seed has resolved and
    /// all retry timers are cancelled.
    pub async fn run(
        mut self,
        seeds: Vec<Url>,
        outcome_tx: mpsc::Sender<FetchOutcome>,
    ) -> anyhow::Result<()> {
        if seeds.is_empty() {
            return Ok(());
        }

        let pending = Arc::new(AtomicUsize::new(seeds.len()));
        let idle = Arc::new(Notify::new());
        let in_flight = Arc::new(Semaphore::new(self.config.max_concurrent_requests));

        // Feed seeds from a task of their own so a seed list larger than
        // the queue can't block the dispatch loop before it starts.
        let seed_tx = self.queue_tx.clone();
        tokio::spawn(async move {
            for url in seeds {
                if seed_tx.send(CrawlRequest::new(url)).await.is_err() {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                maybe_request = self.queue_rx.recv() => {
                    let Some(request) = maybe_request else { break };
                    // Backpressure: stop pulling from the queue while the
                    // global in-flight cap is spent.
                    let permit = in_flight.clone().acquire_owned().await?;
                    let fetcher = self.fetcher.clone();
                    let slots = self.slots.clone();
                    let controller = self.controller.clone();
                    let outcome_tx = outcome_tx.clone();
                    let pending = pending.clone();
                    let idle = idle.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Some(outcome) =
                            dispatch_one(&*fetcher, &slots, &controller, request).await
                        {
                            if outcome_tx.send(outcome).await.is_err() {
                                debug!("Outcome receiver dropped");
                            }
                            if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                                idle.notify_one();
                            }
                        }
                    });
                }
                _ = idle.notified() => break,
            }
        }

        self.controller.shutdown().await;
        Ok(())
    }
}

/// Pace, fetch, and classify one dispatch. `None` means the request was
/// rescheduled by the controller and will come back through the queue.
async fn dispatch_one(
    fetcher: &dyn Fetcher,
    slots: &SlotMap,
    controller: &BackoffController,
    request: CrawlRequest,
) -> Option<FetchOutcome> {
    let result = {
        // Hold the domain permit for the duration of the fetch only.
        let _permit = match request.domain() {
            Some(domain) => Some(slots.ensure(domain).await.pace().await),
            None => None,
        };
        fetcher.fetch(request.url.as_str()).await
    };

    match result {
        Ok(response) => controller.on_response(request, response).await,
        Err(error) => controller.on_transport_error(request, error).await,
    }
}
