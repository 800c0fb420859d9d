//! Retry policy for the transport layer.
//!
//! [`BackoffConfig`] bounds how often a generation request is re-issued and
//! how long to wait in between. Delays grow linearly with the attempt number
//! (`base_delay * n`), which is enough spacing when attempts are capped at
//! three. Use [`BackoffConfig::relay()`] for a relay that may be cold-starting
//! and [`BackoffConfig::direct()`] when calling the provider directly.

use std::time::Duration;

/// Localized apology returned by the direct variant when every attempt failed.
pub const DIRECT_APOLOGY: &str = "Không thể kết nối với AI. Vui lòng thử lại sau.";

/// What [`request_with_retry`](crate::backend::request_with_retry) hands back
/// once every attempt has failed.
///
/// Both values fail to parse as structured output; the apology is
/// distinguishable in logs and readable if shown verbatim in a chat bubble.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Return an empty string.
    #[default]
    Empty,
    /// Return a fixed apology message.
    Apology(String),
}

impl ExhaustionPolicy {
    pub fn exhaustion_text(&self) -> String {
        match self {
            ExhaustionPolicy::Empty => String::new(),
            ExhaustionPolicy::Apology(msg) => msg.clone(),
        }
    }

    /// Whether `text` is what this policy produces on exhaustion.
    pub fn is_exhaustion(&self, text: &str) -> bool {
        match self {
            ExhaustionPolicy::Empty => text.is_empty(),
            ExhaustionPolicy::Apology(msg) => text.is_empty() || text == msg,
        }
    }
}

/// Jitter applied on top of the linear delay.
///
/// # Example
///
/// ```
/// use grammarflow::backend::backoff::JitterStrategy;
///
/// let jitter = JitterStrategy::None;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// Delay is exactly the calculated value.
    None,

    /// Equal jitter: `delay/2 + random in [0, delay/2]`.
    Equal,
}

/// Configuration for transport-level retry.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use grammarflow::backend::BackoffConfig;
///
/// let relay = BackoffConfig::relay();
/// assert_eq!(relay.max_retries, 2);
/// assert_eq!(relay.delay_for_attempt(1), Duration::from_secs(2));
/// assert_eq!(relay.delay_for_attempt(2), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Retries after the first attempt. Default: 2 (3 attempts total).
    pub max_retries: u32,

    /// Delay unit; the wait before retry `n` is `base_delay * n`.
    pub base_delay: Duration,

    /// Upper bound on any single delay. Default: 30 seconds.
    pub max_delay: Duration,

    /// Jitter strategy. Default: None.
    pub jitter: JitterStrategy,

    /// Value returned once every attempt failed.
    pub exhaustion: ExhaustionPolicy,
}

impl BackoffConfig {
    /// No retry: one attempt, empty string on failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::relay()
        }
    }

    /// Relay deployment: 2 retries, 2s base delay (2s, 4s), empty string on
    /// exhaustion. The longer base gives a sleeping relay time to wake up.
    pub fn relay() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_secs(30),
            jitter: JitterStrategy::None,
            exhaustion: ExhaustionPolicy::Empty,
        }
    }

    /// Direct provider calls: 2 retries, 1s base delay (1s, 2s), apology text
    /// on exhaustion.
    pub fn direct() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            exhaustion: ExhaustionPolicy::Apology(DIRECT_APOLOGY.to_string()),
            ..Self::relay()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_exhaustion(mut self, exhaustion: ExhaustionPolicy) -> Self {
        self.exhaustion = exhaustion;
        self
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry `attempt` (1-indexed; attempt 0 has no delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let linear = self.base_delay.saturating_mul(attempt).min(self.max_delay);

        match self.jitter {
            JitterStrategy::None => linear,
            JitterStrategy::Equal => {
                let half = linear / 2;
                half + half.mul_f64(fastrand::f64())
            }
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::relay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_linear() {
        let config = BackoffConfig::direct().with_max_retries(5);
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(3));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = BackoffConfig::relay();
        assert_eq!(config.delay_for_attempt(100), Duration::from_secs(30));
    }

    #[test]
    fn test_equal_jitter_in_range() {
        let config = BackoffConfig::relay().with_jitter(JitterStrategy::Equal);
        for _ in 0..100 {
            let d = config.delay_for_attempt(1);
            assert!(d >= Duration::from_secs(1), "delay {:?} < 1s", d);
            assert!(d <= Duration::from_secs(2), "delay {:?} > 2s", d);
        }
    }

    #[test]
    fn test_presets() {
        let relay = BackoffConfig::relay();
        assert_eq!(relay.max_attempts(), 3);
        assert_eq!(relay.exhaustion, ExhaustionPolicy::Empty);

        let direct = BackoffConfig::direct();
        assert_eq!(direct.base_delay, Duration::from_secs(1));
        assert_eq!(direct.exhaustion.exhaustion_text(), DIRECT_APOLOGY);

        assert_eq!(BackoffConfig::none().max_attempts(), 1);
    }

    #[test]
    fn test_exhaustion_detection() {
        let apology = ExhaustionPolicy::Apology("sorry".into());
        assert!(apology.is_exhaustion("sorry"));
        assert!(apology.is_exhaustion(""));
        assert!(!apology.is_exhaustion("{}"));
        assert!(ExhaustionPolicy::Empty.is_exhaustion(""));
        assert!(!ExhaustionPolicy::Empty.is_exhaustion("sorry"));
    }
}
