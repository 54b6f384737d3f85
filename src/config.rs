use core::time::Duration;

/// Timing policy for repeated reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Spacing between attempts while the sensor is healthy.
    ///
    /// The sensor needs about two seconds between transactions to refresh its values.
    pub min_interval: Duration,
    /// Extra spacing added for each consecutive failure.
    pub backoff_step: Duration,
    /// Upper bound for the spacing, however many failures have accumulated.
    pub max_interval: Duration,
    /// Pause after a failed attempt in background sampling, on top of the spacing.
    pub retry_pause: Duration,
    /// Granularity at which background waits check for cancellation.
    pub cancel_poll: Duration,
}

impl SamplerConfig {
    pub const fn new() -> Self {
        SamplerConfig {
            min_interval: Duration::from_secs(2),
            backoff_step: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
            retry_pause: Duration::from_millis(100),
            cancel_poll: Duration::from_millis(20),
        }
    }

    /// Minimum spacing before the next attempt after `failures` consecutive failures.
    pub fn minimum_interval(&self, failures: u32) -> Duration {
        self.backoff_step
            .checked_mul(failures)
            .and_then(|backoff| self.min_interval.checked_add(backoff))
            .map_or(self.max_interval, |interval| interval.min(self.max_interval))
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_by_half_seconds() {
        let config = SamplerConfig::default();
        assert_eq!(config.minimum_interval(0), Duration::from_millis(2000));
        assert_eq!(config.minimum_interval(1), Duration::from_millis(2500));
        assert_eq!(config.minimum_interval(2), Duration::from_millis(3000));
    }

    #[test]
    fn test_backoff_saturates() {
        let config = SamplerConfig::default();
        assert_eq!(config.minimum_interval(55), Duration::from_millis(29_500));
        assert_eq!(config.minimum_interval(56), Duration::from_secs(30));

        let mut previous = Duration::ZERO;
        for failures in (0..200).chain([u32::MAX / 2, u32::MAX]) {
            let interval = config.minimum_interval(failures);
            assert!(interval >= previous);
            assert!(interval <= Duration::from_secs(30));
            previous = interval;
        }
    }
}
