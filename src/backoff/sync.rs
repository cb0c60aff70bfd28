//! Pushes controller-chosen delays into the dispatcher's domain slots.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::pipeline::SlotMap;

/// Largest delay change still ignored as churn.
const SLOT_DELAY_EPSILON: f64 = 1e-3;

/// Applies a computed domain delay to the shared per-domain throttle.
///
/// Writing a slot's delay paces every subsequent dispatch to that domain,
/// including requests unrelated to the one that triggered the change. This
/// is what turns a per-request retry signal into per-domain politeness.
#[derive(Debug, Clone)]
pub struct SlotSynchronizer {
    slots: Arc<SlotMap>,
    min_slot_delay: f64,
    max_slot_delay: f64,
}

impl SlotSynchronizer {
    pub fn new(slots: Arc<SlotMap>, min_slot_delay: f64, max_slot_delay: f64) -> Self {
        Self {
            slots,
            min_slot_delay,
            max_slot_delay,
        }
    }

    /// Clamp `delay` into the slot bounds and write it to the domain's
    /// slot. A domain with no active slot has nothing to tune; that case
    /// is a no-op rather than a slot creation.
    pub async fn apply_domain_delay(&self, domain: &str, delay: Duration) {
        let Some(slot) = self.slots.get(domain).await else {
            return;
        };

        let clamped = delay
            .as_secs_f64()
            .clamp(self.min_slot_delay, self.max_slot_delay);
        let current = slot.delay().as_secs_f64();

        if (current - clamped).abs() > SLOT_DELAY_EPSILON {
            info!(
                "Updating slot delay for {}: {:.2}s -> {:.2}s",
                domain, current, clamped
            );
            slot.set_delay(Duration::from_secs_f64(clamped));
        }
    }
}
