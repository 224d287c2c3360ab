use std::time::Duration;

/// Bounded retry with exponential backoff.
///
/// Shared by the chunk loop and the registration step. `max_attempts`
/// bounds *consecutive* faults: any confirmed progress resets the count.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Faulty attempts tolerated in a row before giving up (at least 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
    /// Jitter as a fraction of the delay (0.25 = ±25%). 0 disables it.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// A policy that fails on the first fault.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `faults` consecutive faults.
    pub fn allows(&self, faults: u32) -> bool {
        faults < self.max_attempts.max(1)
    }

    /// Delay before retrying after the `attempt`-th fault (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if self.jitter <= 0.0 {
            return Duration::from_secs_f64(capped);
        }
        let spread = capped * self.jitter.min(1.0);
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        Duration::from_secs_f64((capped + spread * offset).max(0.0))
    }
}
