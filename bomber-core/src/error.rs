use thiserror::Error;

/// A load profile that cannot be driven.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Load profile has no phases.")]
    Empty,

    #[error("Load profile duration overflows.")]
    DurationOverflow,
}

/// Configuration problems that fail a run before any virtual user is spawned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid load profile: {0}")]
    Profile(#[from] ProfileError),

    #[error("Invocation timeout must be greater than zero.")]
    ZeroInvocationTimeout,

    #[error("Reconciliation interval must be greater than zero.")]
    ZeroReconciliationInterval,

    #[error("Reconciliation interval of {0} exceeds the 10s maximum.")]
    ReconciliationIntervalTooLong(String),

    #[error("Virtual user ceiling must be greater than zero.")]
    ZeroMaxVirtualUsers,

    #[error("Load profile peaks at {peak} virtual users, above the ceiling of {ceiling}.")]
    CeilingExceeded { peak: usize, ceiling: usize },
}
