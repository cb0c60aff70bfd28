//! Penalty to delay mapping.

use std::time::Duration;

/// Pure mapping from a domain's penalty level to a pacing delay.
///
/// The delay is exponential in the penalty, not in any request's attempt
/// count, so how slow a domain currently is stays decoupled from how many
/// times any one request has been retried.
#[derive(Debug, Clone, Copy)]
pub struct DelayPolicy {
    base_delay: f64,
    max_delay: f64,
}

impl DelayPolicy {
    pub fn new(base_delay: f64, max_delay: f64) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay for a penalty level: `base_delay` at penalty 0, doubling per
    /// level from 1 upward until `max_delay` caps it.
    pub fn delay_for(&self, penalty: u32) -> Duration {
        if penalty == 0 {
            return Duration::from_secs_f64(self.base_delay);
        }
        // Doubling overflows to +inf for very large penalties; the cap
        // brings it back to max_delay.
        let exponent = penalty.saturating_sub(1).min(1024) as i32;
        let raw = self.base_delay * 2f64.powi(exponent);
        Duration::from_secs_f64(raw.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalty_zero_is_base_delay() {
        let policy = DelayPolicy::new(1.0, 300.0);
        assert_eq!(policy.delay_for(0), Duration::from_secs_f64(1.0));
    }

    #[test]
    fn test_doubles_per_penalty_level() {
        let policy = DelayPolicy::new(1.0, 300.0);
        for penalty in 1..=20u32 {
            let expected = (1.0f64 * 2f64.powi(penalty as i32 - 1)).min(300.0);
            assert_eq!(
                policy.delay_for(penalty),
                Duration::from_secs_f64(expected),
                "penalty {penalty}"
            );
        }
    }

    #[test]
    fn test_caps_at_max_delay() {
        // Raw exponential at penalty 10 would be 512s.
        let policy = DelayPolicy::new(1.0, 300.0);
        assert_eq!(policy.delay_for(10), Duration::from_secs_f64(300.0));
    }

    #[test]
    fn test_huge_penalty_stays_finite() {
        let policy = DelayPolicy::new(1.0, 300.0);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs_f64(300.0));
    }

    #[test]
    fn test_respects_custom_base() {
        let policy = DelayPolicy::new(0.5, 8.0);
        assert_eq!(policy.delay_for(1), Duration::from_secs_f64(0.5));
        assert_eq!(policy.delay_for(3), Duration::from_secs_f64(2.0));
        assert_eq!(policy.delay_for(6), Duration::from_secs_f64(8.0));
    }
}
