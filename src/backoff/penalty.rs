//! Per-domain penalty counters.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

/// Integer health counter per domain.
///
/// Only unhealthy domains are tracked: an entry is removed as soon as its
/// penalty decays to zero, so the map stays bounded by the number of
/// domains currently misbehaving. All mutation goes through [`bump`] and
/// [`decay`] under the write lock, so concurrent signals for the same
/// domain cannot lose updates.
///
/// [`bump`]: PenaltyStore::bump
/// [`decay`]: PenaltyStore::decay
#[derive(Debug)]
pub struct PenaltyStore {
    decay_step: u32,
    domains: RwLock<HashMap<String, u32>>,
}

impl PenaltyStore {
    pub fn new(decay_step: u32) -> Self {
        Self {
            decay_step,
            domains: RwLock::new(HashMap::new()),
        }
    }

    /// Increment the domain's penalty, creating it at 1. Returns the new
    /// penalty.
    pub async fn bump(&self, domain: &str) -> u32 {
        let mut domains = self.domains.write().await;
        let penalty = domains.entry(domain.to_string()).or_insert(0);
        let old = *penalty;
        *penalty += 1;
        debug!("Penalty for {} raised {} -> {}", domain, old, *penalty);
        *penalty
    }

    /// Reduce the domain's penalty by the decay step, dropping the entry at
    /// zero. Unknown domains stay untracked and report zero.
    pub async fn decay(&self, domain: &str) -> u32 {
        let mut domains = self.domains.write().await;
        let Some(penalty) = domains.get_mut(domain) else {
            return 0;
        };
        let old = *penalty;
        *penalty = penalty.saturating_sub(self.decay_step);
        debug!("Penalty for {} decayed {} -> {}", domain, old, *penalty);
        if *penalty == 0 {
            domains.remove(domain);
            0
        } else {
            *penalty
        }
    }

    /// Current penalty for a domain, zero when untracked.
    pub async fn get(&self, domain: &str) -> u32 {
        self.domains.read().await.get(domain).copied().unwrap_or(0)
    }

    /// Number of domains currently tracked.
    pub async fn tracked(&self) -> usize {
        self.domains.read().await.len()
    }

    /// Snapshot of all tracked domains.
    pub async fn snapshot(&self) -> HashMap<String, u32> {
        self.domains.read().await.clone()
    }
}
