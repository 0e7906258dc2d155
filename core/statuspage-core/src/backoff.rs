use std::cmp;
use std::time::Duration;

const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// What a view does when its live connection drops.
///
/// The default is to stay closed: the view keeps its data and can still be
/// refreshed by hand. `Backoff` opens a fresh connection after an exponential
/// delay and refetches once it is open, to repair events missed while down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    #[default]
    Never,
    Backoff {
        initial: Duration,
        max: Duration,
        max_attempts: u32,
    },
}

impl ReconnectPolicy {
    pub fn backoff() -> Self {
        ReconnectPolicy::Backoff {
            initial: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-based), or `None`
    /// when the policy gives up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Backoff {
                initial,
                max,
                max_attempts,
            } => {
                if attempt == 0 || attempt > max_attempts {
                    return None;
                }
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                let delay = initial.saturating_mul(factor);
                Some(cmp::min(delay, max))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_policy_never_retries() {
        assert_eq!(ReconnectPolicy::Never.delay_for(1), None);
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = ReconnectPolicy::Backoff {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(350),
            max_attempts: 5,
        };

        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(350)));
        assert_eq!(policy.delay_for(5), Some(Duration::from_millis(350)));
    }

    #[test]
    fn backoff_gives_up_after_max_attempts() {
        let policy = ReconnectPolicy::Backoff {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            max_attempts: 2,
        };
        assert_eq!(policy.delay_for(3), None);
        assert_eq!(policy.delay_for(0), None);
    }

    #[test]
    fn large_attempt_numbers_saturate() {
        let policy = ReconnectPolicy::Backoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            max_attempts: u32::MAX,
        };
        assert_eq!(policy.delay_for(64), Some(Duration::from_secs(60)));
    }
}
