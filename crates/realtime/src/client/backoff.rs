use std::time::Duration;

/// Bounded linear backoff: attempt `n` waits `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before the 1-based `attempt`, or `None` once attempts are spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some(self.base_delay.saturating_mul(attempt))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_linearly_until_exhausted() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<_> = (1..=6).map(|n| policy.delay_for(n)).collect();
        assert_eq!(
            delays,
            vec![
                Some(Duration::from_secs(1)),
                Some(Duration::from_secs(2)),
                Some(Duration::from_secs(3)),
                Some(Duration::from_secs(4)),
                Some(Duration::from_secs(5)),
                None,
            ]
        );
    }

    #[test]
    fn attempt_zero_has_no_delay() {
        assert_eq!(ReconnectPolicy::default().delay_for(0), None);
    }

    #[test]
    fn zero_attempts_never_retries() {
        let policy = ReconnectPolicy::new(Duration::from_millis(10), 0);
        assert_eq!(policy.delay_for(1), None);
    }
}
