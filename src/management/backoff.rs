//! Reconnect delay policy for instance channels.
//!
//! The delay is a staircase keyed on the number of consecutive failed
//! attempts: short delays while an instance is probably still booting,
//! longer ones once it has been unreachable for a while.

use std::time::Duration;

/// One step of a [`BackoffPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffStep {
    /// Highest consecutive-failure count this step applies to.
    pub up_to_failures: u32,
    /// Delay applied while within this step.
    pub delay: Duration,
}

/// Invalid backoff configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BackoffError {
    /// Steps must cover strictly increasing failure counts.
    #[error("backoff steps must have strictly increasing failure thresholds")]
    UnorderedThresholds,
    /// Delays must never decrease from one step to the next.
    #[error("backoff delays must be non-decreasing")]
    DecreasingDelay,
    /// A step could not be parsed from its `failures=seconds` form.
    #[error("invalid backoff step: {0}")]
    InvalidStep(String),
}

/// Monotonic staircase of reconnect delays.
///
/// Failures past the last step use `ceiling`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    steps: Vec<BackoffStep>,
    ceiling: Duration,
}

impl Default for BackoffPolicy {
    /// ≤15 failures: 3 s, ≤20: 10 s, ≤30: 30 s, then 60 s.
    fn default() -> Self {
        Self {
            steps: vec![
                BackoffStep {
                    up_to_failures: 15,
                    delay: Duration::from_secs(3),
                },
                BackoffStep {
                    up_to_failures: 20,
                    delay: Duration::from_secs(10),
                },
                BackoffStep {
                    up_to_failures: 30,
                    delay: Duration::from_secs(30),
                },
            ],
            ceiling: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Steps of the default policy in [`BackoffPolicy::parse`] form.
    pub const DEFAULT_STEPS: &'static str = "15=3,20=10,30=30";

    /// Builds a policy from explicit steps.
    ///
    /// # Errors
    ///
    /// Returns [`BackoffError`] if thresholds are not strictly increasing or
    /// if any delay (including `ceiling`) is shorter than the one before it.
    pub fn new(steps: Vec<BackoffStep>, ceiling: Duration) -> Result<Self, BackoffError> {
        for pair in steps.windows(2) {
            if let [prev, next] = pair {
                if next.up_to_failures <= prev.up_to_failures {
                    return Err(BackoffError::UnorderedThresholds);
                }
                if next.delay < prev.delay {
                    return Err(BackoffError::DecreasingDelay);
                }
            }
        }
        if steps.last().is_some_and(|last| ceiling < last.delay) {
            return Err(BackoffError::DecreasingDelay);
        }
        Ok(Self { steps, ceiling })
    }

    /// A policy that always waits `delay`.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            steps: Vec::new(),
            ceiling: delay,
        }
    }

    /// Parses steps written as `failures=seconds` pairs separated by commas,
    /// e.g. `15=3,20=10,30=30`.
    ///
    /// # Errors
    ///
    /// Returns [`BackoffError::InvalidStep`] for malformed pairs, or the
    /// errors of [`BackoffPolicy::new`].
    pub fn parse(steps: &str, ceiling: Duration) -> Result<Self, BackoffError> {
        let parsed = steps
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|pair| {
                let (failures, secs) = pair
                    .split_once('=')
                    .ok_or_else(|| BackoffError::InvalidStep(pair.to_string()))?;
                let up_to_failures = failures
                    .trim()
                    .parse()
                    .map_err(|_| BackoffError::InvalidStep(pair.to_string()))?;
                let secs: u64 = secs
                    .trim()
                    .parse()
                    .map_err(|_| BackoffError::InvalidStep(pair.to_string()))?;
                Ok(BackoffStep {
                    up_to_failures,
                    delay: Duration::from_secs(secs),
                })
            })
            .collect::<Result<Vec<_>, BackoffError>>()?;
        Self::new(parsed, ceiling)
    }

    /// Delay used right after a successful connection.
    #[must_use]
    pub fn floor(&self) -> Duration {
        self.steps.first().map_or(self.ceiling, |step| step.delay)
    }

    /// Delay to wait after the `failures`-th consecutive failure.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        self.steps
            .iter()
            .find(|step| failures <= step.up_to_failures)
            .map_or(self.ceiling, |step| step.delay)
    }
}

/// Consecutive-failure bookkeeping for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectState {
    failures: u32,
    backoff: Duration,
}

impl ReconnectState {
    /// Fresh state: no failures, backoff at the policy floor.
    #[must_use]
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self {
            failures: 0,
            backoff: policy.floor(),
        }
    }

    /// Resets after a successful handshake.
    pub fn on_connected(&mut self, policy: &BackoffPolicy) {
        self.failures = 0;
        self.backoff = policy.floor();
    }

    /// Records a failure and returns the delay before the next attempt.
    pub fn on_failure(&mut self, policy: &BackoffPolicy) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.backoff = policy.delay_for(self.failures);
        self.backoff
    }

    /// Consecutive failures since the last successful handshake.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Current backoff delay.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn default_staircase_thresholds() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.floor(), secs(3));
        assert_eq!(policy.delay_for(1), secs(3));
        assert_eq!(policy.delay_for(15), secs(3));
        assert_eq!(policy.delay_for(16), secs(10));
        assert_eq!(policy.delay_for(20), secs(10));
        assert_eq!(policy.delay_for(21), secs(30));
        assert_eq!(policy.delay_for(30), secs(30));
        assert_eq!(policy.delay_for(31), secs(60));
        assert_eq!(policy.delay_for(u32::MAX), secs(60));
    }

    #[test]
    fn default_steps_text_matches_default_policy() {
        assert_eq!(
            BackoffPolicy::parse(BackoffPolicy::DEFAULT_STEPS, secs(60)),
            Ok(BackoffPolicy::default())
        );
    }

    #[test]
    fn backoff_never_decreases_across_failures() {
        let policy = BackoffPolicy::default();
        let mut state = ReconnectState::new(&policy);
        let mut previous = Duration::ZERO;
        for _ in 0..50 {
            let delay = state.on_failure(&policy);
            assert!(delay >= previous);
            previous = delay;
        }
        assert_eq!(state.failures(), 50);
    }

    #[test]
    fn success_resets_to_floor() {
        let policy = BackoffPolicy::default();
        let mut state = ReconnectState::new(&policy);
        for _ in 0..40 {
            state.on_failure(&policy);
        }
        assert_eq!(state.backoff(), secs(60));

        state.on_connected(&policy);
        assert_eq!(state.failures(), 0);
        assert_eq!(state.backoff(), secs(3));
        assert_eq!(state.on_failure(&policy), secs(3));
    }

    #[test]
    fn rejects_non_monotonic_policies() {
        let steps = vec![
            BackoffStep {
                up_to_failures: 5,
                delay: secs(10),
            },
            BackoffStep {
                up_to_failures: 10,
                delay: secs(2),
            },
        ];
        assert_eq!(
            BackoffPolicy::new(steps, secs(60)),
            Err(BackoffError::DecreasingDelay)
        );

        let steps = vec![
            BackoffStep {
                up_to_failures: 5,
                delay: secs(1),
            },
            BackoffStep {
                up_to_failures: 5,
                delay: secs(2),
            },
        ];
        assert_eq!(
            BackoffPolicy::new(steps, secs(60)),
            Err(BackoffError::UnorderedThresholds)
        );
    }

    #[test]
    fn parses_step_list() {
        let Ok(policy) = BackoffPolicy::parse("15=3, 20=10,30=30", secs(60)) else {
            panic!("policy should parse");
        };
        assert_eq!(policy, BackoffPolicy::default());
        assert!(BackoffPolicy::parse("15:3", secs(60)).is_err());
    }

    #[test]
    fn fixed_policy_is_flat() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(20));
        assert_eq!(policy.floor(), Duration::from_millis(20));
        assert_eq!(policy.delay_for(100), Duration::from_millis(20));
    }
}
