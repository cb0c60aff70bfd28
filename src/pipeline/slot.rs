//! Per-domain dispatch throttling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::time::Instant;

/// Shared throttle for one domain.
///
/// `delay` is the minimum spacing between dispatches to the domain; the
/// semaphore bounds how many requests to it are in flight at once. The
/// delay is written by the backoff layer and read here on every dispatch.
#[derive(Debug)]
pub struct DomainSlot {
    delay_micros: AtomicU64,
    permits: Arc<Semaphore>,
    next_dispatch: Mutex<Instant>,
}

impl DomainSlot {
    pub fn new(initial_delay: Duration, max_concurrent: usize) -> Self {
        Self {
            delay_micros: AtomicU64::new(initial_delay.as_micros() as u64),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            next_dispatch: Mutex::new(Instant::now()),
        }
    }

    /// Current spacing between dispatches.
    pub fn delay(&self) -> Duration {
        Duration::from_micros(self.delay_micros.load(Ordering::Relaxed))
    }

    /// Overwrite the spacing applied to every subsequent dispatch.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_micros
            .store(delay.as_micros() as u64, Ordering::Relaxed);
    }

    /// Wait until this domain is ready for another dispatch, then take a
    /// concurrency permit. Each caller reserves its own dispatch time
    /// under the lock, so concurrent dispatches queue up behind each
    /// other at the current spacing.
    pub async fn pace(&self) -> OwnedSemaphorePermit {
        let wake = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();
            let at = if *next > now { *next } else { now };
            *next = at + self.delay();
            at
        };
        tokio::time::sleep_until(wake).await;
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("domain slot semaphore closed")
    }
}

/// Dispatcher-owned registry of per-domain slots.
///
/// Slots are created lazily on the dispatch path; lookups from the backoff
/// layer never create one.
#[derive(Debug)]
pub struct SlotMap {
    slots: RwLock<HashMap<String, Arc<DomainSlot>>>,
    initial_delay: Duration,
    max_concurrent_per_domain: usize,
}

impl SlotMap {
    pub fn new(initial_delay: Duration, max_concurrent_per_domain: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            initial_delay,
            max_concurrent_per_domain,
        }
    }

    /// Get or create the slot for a domain. Dispatch path only.
    pub async fn ensure(&self, domain: &str) -> Arc<DomainSlot> {
        if let Some(slot) = self.slots.read().await.get(domain) {
            return slot.clone();
        }
        let mut slots = self.slots.write().await;
        slots
            .entry(domain.to_string())
            .or_insert_with(|| {
                Arc::new(DomainSlot::new(
                    self.initial_delay,
                    self.max_concurrent_per_domain,
                ))
            })
            .clone()
    }

    /// Look up an existing slot without creating one.
    pub async fn get(&self, domain: &str) -> Option<Arc<DomainSlot>> {
        self.slots.read().await.get(domain).cloned()
    }

    /// Snapshot of current per-domain delays.
    pub async fn delays(&self) -> HashMap<String, Duration> {
        self.slots
            .read()
            .await
            .iter()
            .map(|(domain, slot)| (domain.clone(), slot.delay()))
            .collect()
    }
}
