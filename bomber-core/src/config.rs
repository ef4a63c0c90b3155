use crate::{
    ConfigError, LoadProfile, DEFAULT_INVOCATION_TIMEOUT, DEFAULT_MAX_VIRTUAL_USERS,
    DEFAULT_RECONCILIATION_INTERVAL, MAX_RECONCILIATION_INTERVAL,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
#[cfg(feature = "serde")]
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

/// Per-run engine settings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", cfg_eval::cfg_eval, serde_as)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunOptions {
    /// Hard limit for a single step invocation; slower invocations are abandoned as timeouts.
    #[cfg_attr(feature = "serde", serde_as(as = "DurationMilliSeconds<u64>"))]
    pub invocation_timeout: Duration,
    /// How often the virtual user pool is reconciled against the load profile.
    #[cfg_attr(feature = "serde", serde_as(as = "DurationMilliSeconds<u64>"))]
    pub reconciliation_interval: Duration,
    /// Explicit ceiling on live virtual users for the run.
    pub max_virtual_users: usize,
    /// Pause after this run before the next run of a sequence starts.
    #[cfg_attr(feature = "serde", serde_as(as = "DurationMilliSeconds<u64>"))]
    pub cool_down: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            invocation_timeout: DEFAULT_INVOCATION_TIMEOUT,
            reconciliation_interval: DEFAULT_RECONCILIATION_INTERVAL,
            max_virtual_users: DEFAULT_MAX_VIRTUAL_USERS,
            cool_down: Duration::ZERO,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    pub fn with_reconciliation_interval(mut self, interval: Duration) -> Self {
        self.reconciliation_interval = interval;
        self
    }

    pub fn with_max_virtual_users(mut self, max_virtual_users: usize) -> Self {
        self.max_virtual_users = max_virtual_users;
        self
    }

    pub fn with_cool_down(mut self, cool_down: Duration) -> Self {
        self.cool_down = cool_down;
        self
    }

    /// Check the options against the profile they will drive.
    pub fn validate(&self, profile: &LoadProfile) -> Result<(), ConfigError> {
        if self.invocation_timeout.is_zero() {
            return Err(ConfigError::ZeroInvocationTimeout);
        }

        if self.reconciliation_interval.is_zero() {
            return Err(ConfigError::ZeroReconciliationInterval);
        }

        if self.reconciliation_interval > MAX_RECONCILIATION_INTERVAL {
            return Err(ConfigError::ReconciliationIntervalTooLong(
                humantime::format_duration(self.reconciliation_interval).to_string(),
            ));
        }

        if self.max_virtual_users == 0 {
            return Err(ConfigError::ZeroMaxVirtualUsers);
        }

        let peak = profile.peak();
        if peak > self.max_virtual_users {
            return Err(ConfigError::CeilingExceeded {
                peak,
                ceiling: self.max_virtual_users,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let profile = LoadProfile::keep_constant(200, Duration::from_secs(120));
        assert_eq!(RunOptions::default().validate(&profile), Ok(()));
    }

    #[test]
    fn rejects_zero_values() {
        let profile = LoadProfile::keep_constant(1, Duration::from_secs(1));

        let options = RunOptions::new().with_invocation_timeout(Duration::ZERO);
        assert_eq!(
            options.validate(&profile),
            Err(ConfigError::ZeroInvocationTimeout)
        );

        let options = RunOptions::new().with_reconciliation_interval(Duration::ZERO);
        assert_eq!(
            options.validate(&profile),
            Err(ConfigError::ZeroReconciliationInterval)
        );

        let options = RunOptions::new().with_max_virtual_users(0);
        assert_eq!(
            options.validate(&profile),
            Err(ConfigError::ZeroMaxVirtualUsers)
        );
    }

    #[test]
    fn rejects_long_interval() {
        let profile = LoadProfile::keep_constant(1, Duration::from_secs(1));
        let options = RunOptions::new().with_reconciliation_interval(Duration::from_secs(30));
        assert_eq!(
            options.validate(&profile),
            Err(ConfigError::ReconciliationIntervalTooLong("30s".to_string()))
        );
    }

    #[test]
    fn rejects_profiles_above_ceiling() {
        let profile = LoadProfile::keep_constant(300, Duration::from_secs(1));
        let options = RunOptions::new().with_max_virtual_users(200);
        assert_eq!(
            options.validate(&profile),
            Err(ConfigError::CeilingExceeded {
                peak: 300,
                ceiling: 200
            })
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_with_defaults() {
        let options: RunOptions = serde_json::from_str(r#"{"invocation_timeout": 2000}"#).unwrap();
        assert_eq!(options.invocation_timeout, Duration::from_secs(2));
        assert_eq!(
            options.reconciliation_interval,
            DEFAULT_RECONCILIATION_INTERVAL
        );
    }
}
