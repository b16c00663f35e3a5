//! Reconnect policy

use std::time::Duration;

/// Decides whether and when to retry after the connection drops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Retry forever at a fixed interval
    Fixed { delay: Duration },
    /// Retry at a fixed interval, then give up after `max_attempts` tries
    Capped { delay: Duration, max_attempts: u32 },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed {
            delay: Self::DEFAULT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);

    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay }
    }

    pub fn capped(delay: Duration, max_attempts: u32) -> Self {
        Self::Capped {
            delay,
            max_attempts,
        }
    }

    /// Build from config values; no cap means retry forever
    pub fn from_settings(delay_ms: u64, max_attempts: Option<u32>) -> Self {
        let delay = Duration::from_millis(delay_ms);
        match max_attempts {
            Some(max_attempts) => Self::capped(delay, max_attempts),
            None => Self::fixed(delay),
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-based)
    ///
    /// Returns `None` once the policy has given up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Fixed { delay } => Some(delay),
            Self::Capped {
                delay,
                max_attempts,
            } => (attempt <= max_attempts).then_some(delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fixed_three_seconds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy, ReconnectPolicy::fixed(Duration::from_millis(3000)));
    }

    #[test]
    fn test_fixed_never_gives_up() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(10));
        for attempt in [1, 2, 100, u32::MAX] {
            assert_eq!(policy.delay_for(attempt), Some(Duration::from_millis(10)));
        }
    }

    #[test]
    fn test_capped_gives_up_after_max_attempts() {
        let policy = ReconnectPolicy::capped(Duration::from_millis(50), 3);
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_for(4), None);
    }

    #[test]
    fn test_from_settings() {
        assert_eq!(
            ReconnectPolicy::from_settings(3000, None),
            ReconnectPolicy::default()
        );
        assert_eq!(
            ReconnectPolicy::from_settings(100, Some(2)),
            ReconnectPolicy::capped(Duration::from_millis(100), 2)
        );
    }
}
