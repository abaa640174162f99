use log::{info, warn};

use crate::config::RecoveryConfig;

/// Decides when a silent or fix-less GPS module gets a hot start.
///
/// Every read without a valid fix counts as a failure. Once more than
/// `failure_threshold` failures have accumulated in a row, a recovery is due,
/// but at most once per `interval_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    config: RecoveryConfig,
    consecutive_failures: u32,
    last_recovery_ms: Option<u64>,
}

impl RecoveryPolicy {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            last_recovery_ms: None,
        }
    }

    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            info!(
                "GPS fix regained after {} failed reads",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// True when a recovery should be attempted at `now_ms`
    pub fn should_recover(&self, now_ms: u64) -> bool {
        if self.consecutive_failures <= self.config.failure_threshold {
            return false;
        }
        match self.last_recovery_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.config.interval_ms,
        }
    }

    /// Record that a recovery was attempted at `now_ms`.
    ///
    /// The failure streak is kept so a module that stays silent is retried
    /// every interval.
    pub fn mark_recovery(&mut self, now_ms: u64) {
        warn!(
            "GPS recovery attempted after {} consecutive failures",
            self.consecutive_failures
        );
        self.last_recovery_ms = Some(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RecoveryPolicy {
        RecoveryPolicy::new(RecoveryConfig {
            failure_threshold: 10,
            interval_ms: 60_000,
        })
    }

    #[test]
    fn test_threshold_must_be_exceeded() {
        let mut policy = policy();
        for _ in 0..10 {
            policy.record_failure();
        }
        assert!(!policy.should_recover(0));

        policy.record_failure();
        assert!(policy.should_recover(0));
    }

    #[test]
    fn test_recovery_is_rate_limited() {
        let mut policy = policy();
        for _ in 0..11 {
            policy.record_failure();
        }
        policy.mark_recovery(5_000);

        policy.record_failure();
        assert!(!policy.should_recover(64_999));
        assert!(policy.should_recover(65_000));
    }

    #[test]
    fn test_success_resets_streak() {
        let mut policy = policy();
        for _ in 0..20 {
            policy.record_failure();
        }
        policy.record_success();
        assert_eq!(policy.consecutive_failures(), 0);
        assert!(!policy.should_recover(1_000_000));
    }
}
