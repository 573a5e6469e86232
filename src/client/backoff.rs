//! Reconnection backoff policy.

use std::time::{Duration, SystemTime};

/// Exponential backoff for transport-level reconnection.
///
/// The delay doubles per attempt from `base_delay` up to `max_delay`,
/// with 0-25% jitter so simultaneous clients do not reconnect in
/// lockstep. After `max_attempts` consecutive failures the client stays
/// in the error state awaiting explicit caller action.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum consecutive reconnect attempts
    pub max_attempts: u32,
    /// Delay before the first retry (doubles each attempt)
    pub base_delay: Duration,
    /// Cap on the computed delay
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);

        // Jitter from subsecond clock nanos, 0-25% of the base delay
        let jitter_nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let jitter_fraction = (jitter_nanos % 250) as f64 / 1000.0;
        let jitter = base.mul_f64(jitter_fraction);

        (base + jitter).min(self.max_delay)
    }

    /// Whether `attempt` retries have exhausted the policy.
    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}
