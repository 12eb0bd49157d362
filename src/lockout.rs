//! Progressive lockout policy for failed login attempts.
//!
//! Pure decisions only; persisting the outcome and emitting audit events
//! is the auth service's job.

use chrono::{DateTime, Duration, Utc};

use crate::config::AuthConfig;

/// Thresholds driving the lockout decision, resolved once from config.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    max_attempts: u32,
    lock_minutes: i64,
}

/// Outcome of one failed password check: the count to persist and,
/// when the threshold was just crossed, the lock timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutDecision {
    pub failed_count: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutDecision {
    /// True when this attempt is the one that locked the account.
    #[must_use]
    pub const fn triggers_lock(&self) -> bool {
        self.locked_until.is_some()
    }
}

impl LockoutPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, lock_minutes: i64) -> Self {
        Self {
            max_attempts,
            lock_minutes,
        }
    }

    #[must_use]
    pub const fn from_config(auth: &AuthConfig) -> Self {
        Self::new(auth.max_login_attempts, auth.lockout_minutes)
    }

    /// Decide what a failed attempt does to the account, given the count
    /// persisted before this attempt. An attempt below the threshold
    /// leaves any existing lock untouched; only a success clears it.
    #[must_use]
    pub fn after_failure(&self, failed_before: i32, now: DateTime<Utc>) -> LockoutDecision {
        let failed_count = failed_before.saturating_add(1);

        let locked_until = if i64::from(failed_count) >= i64::from(self.max_attempts) {
            Some(now + Duration::minutes(self.lock_minutes))
        } else {
            None
        };

        LockoutDecision {
            failed_count,
            locked_until,
        }
    }
}

/// Whether a stored lock timestamp currently refuses logins.
#[must_use]
pub fn is_locked(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    locked_until.is_some_and(|until| until > now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, 15)
    }

    #[test]
    fn counts_increment_without_locking_below_threshold() {
        let now = Utc::now();

        for failed_before in 0..3 {
            let decision = policy().after_failure(failed_before, now);
            assert_eq!(decision.failed_count, failed_before + 1);
            assert_eq!(decision.locked_until, None);
            assert!(!decision.triggers_lock());
        }
    }

    #[test]
    fn fifth_failure_locks_for_the_configured_window() {
        let now = Utc::now();
        let decision = policy().after_failure(4, now);

        assert_eq!(decision.failed_count, 5);
        assert_eq!(decision.locked_until, Some(now + Duration::minutes(15)));
        assert!(decision.triggers_lock());
    }

    #[test]
    fn failures_past_the_threshold_extend_the_lock() {
        let now = Utc::now();
        let decision = policy().after_failure(7, now);

        assert_eq!(decision.failed_count, 8);
        assert!(decision.triggers_lock());
    }

    #[test]
    fn lock_check_is_strict_on_the_boundary() {
        let now = Utc::now();

        assert!(!is_locked(None, now));
        assert!(!is_locked(Some(now), now));
        assert!(!is_locked(Some(now - Duration::seconds(1)), now));
        assert!(is_locked(Some(now + Duration::seconds(1)), now));
    }
}
