//! Failed-login lockout
//!
//! The lock state is never stored as such. It is derived on each attempt
//! from the account's `failedLoginAttempts` and `lockUntil` and the current
//! time, so an expired lock needs no cleanup job.

use chrono::{DateTime, Duration, Utc};
use newsdesk_core::config::{AuthConfig, MAX_DURATION_SECS};
use newsdesk_core::User;

/// The persisted lockout fields of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockoutCounters {
    pub failed_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
}

impl From<&User> for LockoutCounters {
    fn from(user: &User) -> Self {
        Self {
            failed_attempts: user.failed_login_attempts,
            lock_until: user.lock_until,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked { failed_attempts: u32 },
    Locked { until: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for LockoutPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            max_failed_attempts: config.max_failed_attempts.max(1),
            lock_duration: Duration::seconds(
                config.lockout_duration_secs.min(MAX_DURATION_SECS) as i64,
            ),
        }
    }
}

impl LockoutPolicy {
    pub fn state(&self, counters: LockoutCounters, now: DateTime<Utc>) -> LockState {
        match counters.lock_until {
            Some(until) if until > now => LockState::Locked { until },
            // A lock that has run out starts a fresh count
            Some(_) => LockState::Unlocked { failed_attempts: 0 },
            None => LockState::Unlocked {
                failed_attempts: counters.failed_attempts,
            },
        }
    }

    /// Counters after a wrong password
    ///
    /// Reaching the threshold sets `lock_until` and leaves the counter at the
    /// threshold. While locked nothing changes.
    pub fn on_failure(&self, counters: LockoutCounters, now: DateTime<Utc>) -> LockoutCounters {
        match self.state(counters, now) {
            LockState::Locked { .. } => counters,
            LockState::Unlocked { failed_attempts } => {
                let failed_attempts = failed_attempts.saturating_add(1);
                let lock_until = (failed_attempts >= self.max_failed_attempts)
                    .then(|| now + self.lock_duration);
                LockoutCounters {
                    failed_attempts,
                    lock_until,
                }
            }
        }
    }

    /// Counters after a correct password
    pub fn on_success(&self) -> LockoutCounters {
        LockoutCounters::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::default()
    }

    #[test]
    fn test_defaults() {
        let policy = policy();
        assert_eq!(policy.max_failed_attempts, 5);
        assert_eq!(policy.lock_duration, Duration::hours(2));
    }

    #[test]
    fn test_oversized_duration_is_clamped() {
        let policy = LockoutPolicy::from(&AuthConfig {
            lockout_duration_secs: u64::MAX,
            ..Default::default()
        });
        assert_eq!(
            policy.lock_duration,
            Duration::seconds(MAX_DURATION_SECS as i64)
        );

        let mut counters = LockoutCounters::default();
        for _ in 0..5 {
            counters = policy.on_failure(counters, Utc::now());
        }
        assert!(counters.lock_until.is_some());
    }

    #[test]
    fn test_fifth_failure_locks() {
        let policy = policy();
        let now = Utc::now();
        let mut counters = LockoutCounters::default();

        for attempt in 1..=4 {
            counters = policy.on_failure(counters, now);
            assert_eq!(counters.failed_attempts, attempt);
            assert_eq!(counters.lock_until, None);
        }

        counters = policy.on_failure(counters, now);
        assert_eq!(counters.failed_attempts, 5);
        assert_eq!(counters.lock_until, Some(now + Duration::hours(2)));
        assert_eq!(
            policy.state(counters, now),
            LockState::Locked {
                until: now + Duration::hours(2)
            }
        );
    }

    #[test]
    fn test_failure_while_locked_changes_nothing() {
        let policy = policy();
        let now = Utc::now();
        let locked = LockoutCounters {
            failed_attempts: 5,
            lock_until: Some(now + Duration::minutes(30)),
        };

        assert_eq!(policy.on_failure(locked, now), locked);
    }

    #[test]
    fn test_counting_restarts_after_lock_elapses() {
        let policy = policy();
        let now = Utc::now();
        let expired = LockoutCounters {
            failed_attempts: 5,
            lock_until: Some(now - Duration::seconds(1)),
        };

        assert_eq!(
            policy.state(expired, now),
            LockState::Unlocked { failed_attempts: 0 }
        );
        assert_eq!(
            policy.on_failure(expired, now),
            LockoutCounters {
                failed_attempts: 1,
                lock_until: None
            }
        );
    }

    #[test]
    fn test_success_resets() {
        assert_eq!(policy().on_success(), LockoutCounters::default());
    }

    #[test]
    fn test_custom_threshold() {
        let policy = LockoutPolicy {
            max_failed_attempts: 2,
            lock_duration: Duration::minutes(1),
        };
        let now = Utc::now();
        let counters = policy.on_failure(policy.on_failure(LockoutCounters::default(), now), now);
        assert!(matches!(policy.state(counters, now), LockState::Locked { .. }));
    }
}
