//! Retry and timeout settings.

use std::time::Duration;

/// Exponential backoff between "not yet connected" attempts.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first failed attempt. Zero disables sleeping.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
        }
    }
}

impl BackoffConfig {
    /// No delay at all between attempts.
    pub fn none() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Calculates the delay after a given attempt number (1-based),
    /// with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let with_jitter = (capped + jitter * jitter_offset(nanos)).max(0.0);
        Duration::from_secs_f64(with_jitter)
    }
}

/// Maps sub-second nanos onto [-1.0, 1.0).
fn jitter_offset(subsec_nanos: u32) -> f64 {
    (subsec_nanos as f64 / 1_000_000_000.0) * 2.0 - 1.0
}

/// Settings shared by every client operation.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Connection attempts per transfer.
    pub retry_limit: u32,
    /// Overload answers tolerated per transfer before giving up. Counted
    /// separately from `retry_limit`.
    pub overload_retry_limit: u32,
    /// Sleep after an overload answer.
    pub overload_backoff: Duration,
    pub reconnect: BackoffConfig,
    /// Upper bound on the wait for transfer completion. `None` waits until
    /// the transport reports.
    pub completion_timeout: Option<Duration>,
    /// Upper bound on one-shot control and information exchanges.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            overload_retry_limit: 3,
            overload_backoff: Duration::from_secs(10),
            reconnect: BackoffConfig::default(),
            completion_timeout: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Same bounds, no sleeping between attempts.
    pub fn immediate(retry_limit: u32) -> Self {
        Self {
            retry_limit,
            overload_backoff: Duration::ZERO,
            reconnect: BackoffConfig::none(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.overload_retry_limit, 3);
        assert_eq!(config.overload_backoff, Duration::from_secs(10));
        assert!(config.completion_timeout.is_none());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = BackoffConfig::default();
        let expected_base = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 15.0, 15.0];
        for (i, &base) in expected_base.iter().enumerate() {
            let secs = config.delay_for_attempt((i + 1) as u32).as_secs_f64();
            let lo = base * 0.74;
            let hi = base * 1.26;
            assert!(
                secs >= lo && secs <= hi,
                "attempt {}: {secs:.3}s not in [{lo:.3}, {hi:.3}]",
                i + 1
            );
        }
    }

    #[test]
    fn jitter_spans_both_sides_of_the_base() {
        assert_eq!(jitter_offset(0), -1.0);
        assert_eq!(jitter_offset(500_000_000), 0.0);
        let top = jitter_offset(999_999_999);
        assert!(top > 0.99 && top < 1.0, "{top}");
    }

    #[test]
    fn zero_initial_delay_never_sleeps() {
        let config = ClientConfig::immediate(5);
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.reconnect.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(config.reconnect.delay_for_attempt(30), Duration::ZERO);
        assert_eq!(config.overload_backoff, Duration::ZERO);
    }
}
