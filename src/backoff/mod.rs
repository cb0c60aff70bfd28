//! Adaptive domain-level backoff.
//!
//! Turns per-request retry signals into per-domain politeness: repeated
//! 429/5xx responses from a host raise that host's penalty and slow every
//! dispatch to it, while healthy responses decay the penalty back down.

mod gate;
mod penalty;
mod policy;
mod retry_after;
mod sync;

pub use gate::{Classification, RetryAttempt, RetryGate};
pub use penalty::PenaltyStore;
pub use policy::DelayPolicy;
pub use retry_after::parse_retry_after;
pub use sync::SlotSynchronizer;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::BackoffConfig;
use crate::error::FetchError;
use crate::models::{CrawlRequest, FetchOutcome, PageResponse};
use crate::pipeline::SlotMap;

/// Orchestrates penalty bookkeeping, delay selection, slot updates, and
/// the retry/give-up decision around every response or transport failure.
///
/// The dispatcher hands each completed request to [`on_response`] or
/// [`on_transport_error`]; `None` means a resubmission has been scheduled
/// and the request is not finished yet, `Some` carries its terminal
/// outcome. The controller exclusively owns the penalty map and is the
/// only writer of slot delays (through its [`SlotSynchronizer`]).
///
/// [`on_response`]: BackoffController::on_response
/// [`on_transport_error`]: BackoffController::on_transport_error
pub struct BackoffController {
    policy: DelayPolicy,
    penalties: PenaltyStore,
    gate: RetryGate,
    synchronizer: SlotSynchronizer,
    retryable_codes: HashSet<u16>,
    resubmit_tx: mpsc::Sender<CrawlRequest>,
    timers: Mutex<JoinSet<()>>,
}

impl BackoffController {
    /// Build a controller wired to the dispatcher's slot map and its
    /// dispatch queue (for delayed resubmissions).
    pub fn new(
        config: &BackoffConfig,
        slots: Arc<SlotMap>,
        resubmit_tx: mpsc::Sender<CrawlRequest>,
    ) -> Self {
        Self {
            policy: DelayPolicy::new(config.base_delay, config.max_delay),
            penalties: PenaltyStore::new(config.decay_step),
            gate: RetryGate::new(config.max_attempts),
            synchronizer: SlotSynchronizer::new(
                slots,
                config.min_slot_delay,
                config.max_slot_delay,
            ),
            retryable_codes: config.retryable_status_codes.clone(),
            resubmit_tx,
            timers: Mutex::new(JoinSet::new()),
        }
    }

    /// Sort a status code into the retry taxonomy.
    pub fn classify(&self, status: u16) -> Classification {
        if self.retryable_codes.contains(&status) {
            Classification::RetryableStatus(status)
        } else {
            Classification::NonRetryableStatus(status)
        }
    }

    /// Handle a completed response. Returns the terminal outcome, or
    /// `None` when the request has been rescheduled.
    pub async fn on_response(
        &self,
        mut request: CrawlRequest,
        response: PageResponse,
    ) -> Option<FetchOutcome> {
        let Some(domain) = request.domain().map(str::to_string) else {
            // Hostless URLs are never paced or penalized.
            return Some(FetchOutcome::Delivered(response));
        };

        match self.classify(response.status) {
            Classification::RetryableStatus(status) => {
                if self
                    .gate
                    .should_retry(&mut request.attempt, Classification::RetryableStatus(status))
                {
                    let penalty = self.penalties.bump(&domain).await;
                    let computed = self.policy.delay_for(penalty);
                    // An explicit numeric Retry-After wins over the
                    // exponential value, even when it is shorter.
                    let delay =
                        parse_retry_after(response.header("retry-after")).unwrap_or(computed);
                    self.synchronizer.apply_domain_delay(&domain, delay).await;
                    info!(
                        "Retryable HTTP {} on {}; domain={}, penalty={}, retry={}, delay={:.2}s",
                        status,
                        request.url,
                        domain,
                        penalty,
                        request.attempt.count(),
                        delay.as_secs_f64()
                    );
                    self.schedule_resubmit(request, delay).await;
                    None
                } else {
                    let penalty = self.cool_down(&domain).await;
                    warn!(
                        "Retries exhausted for {} after {} retries; domain={}, penalty decayed to {}",
                        request.url,
                        request.attempt.count(),
                        domain,
                        penalty
                    );
                    Some(FetchOutcome::Exhausted {
                        url: request.url.to_string(),
                        attempts: request.attempt.count(),
                        last_response: Some(response),
                        last_error: None,
                    })
                }
            }
            _ => {
                // Anything outside the retryable set is a healthy signal,
                // error status or not: the domain cools down and the
                // response passes through unchanged.
                let penalty = self.cool_down(&domain).await;
                debug!(
                    "HTTP {} on {}; domain={}, penalty decayed to {}",
                    response.status, request.url, domain, penalty
                );
                Some(FetchOutcome::Delivered(response))
            }
        }
    }

    /// Handle a transport failure. Same shape as the response path, but
    /// with no header to honor the delay is always the computed one.
    pub async fn on_transport_error(
        &self,
        mut request: CrawlRequest,
        error: FetchError,
    ) -> Option<FetchOutcome> {
        let Some(domain) = request.domain().map(str::to_string) else {
            return Some(FetchOutcome::Exhausted {
                url: request.url.to_string(),
                attempts: request.attempt.count(),
                last_response: None,
                last_error: Some(error),
            });
        };

        if self
            .gate
            .should_retry(&mut request.attempt, Classification::Transport)
        {
            let penalty = self.penalties.bump(&domain).await;
            let delay = self.policy.delay_for(penalty);
            self.synchronizer.apply_domain_delay(&domain, delay).await;
            info!(
                "{}; domain={}, penalty={}, retry={}, delay={:.2}s",
                error,
                domain,
                penalty,
                request.attempt.count(),
                delay.as_secs_f64()
            );
            self.schedule_resubmit(request, delay).await;
            None
        } else {
            let penalty = self.cool_down(&domain).await;
            warn!(
                "Retries exhausted for {} after {} retries ({}); domain={}, penalty decayed to {}",
                request.url,
                request.attempt.count(),
                error,
                domain,
                penalty
            );
            Some(FetchOutcome::Exhausted {
                url: request.url.to_string(),
                attempts: request.attempt.count(),
                last_response: None,
                last_error: Some(error),
            })
        }
    }

    /// Decay the domain and push the resulting (smaller) delay into its
    /// slot.
    async fn cool_down(&self, domain: &str) -> u32 {
        let penalty = self.penalties.decay(domain).await;
        self.synchronizer
            .apply_domain_delay(domain, self.policy.delay_for(penalty))
            .await;
        penalty
    }

    /// Park the request on a timer and feed it back through the dispatch
    /// queue once the delay elapses. No worker is held while waiting.
    async fn schedule_resubmit(&self, request: CrawlRequest, delay: Duration) {
        let tx = self.resubmit_tx.clone();
        let mut timers = self.timers.lock().await;
        // Reap finished timers so the set doesn't grow with every retry.
        while timers.try_join_next().is_some() {}
        timers.spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(request).await.is_err() {
                debug!("Dropping resubmission; dispatch queue is closed");
            }
        });
    }

    /// Abort every pending resubmission timer. Nothing fires after this
    /// returns.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        timers.abort_all();
        while timers.join_next().await.is_some() {}
    }

    /// Resubmission timers not yet fired.
    pub async fn pending_resubmissions(&self) -> usize {
        let mut timers = self.timers.lock().await;
        while timers.try_join_next().is_some() {}
        timers.len()
    }

    /// Penalties for all currently tracked domains.
    pub async fn penalties(&self) -> HashMap<String, u32> {
        self.penalties.snapshot().await
    }
}
