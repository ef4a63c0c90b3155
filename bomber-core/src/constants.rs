use std::time::Duration;

/// Default hard limit on a single step invocation before it is abandoned.
pub const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval at which the virtual user pool is reconciled against the profile.
pub const DEFAULT_RECONCILIATION_INTERVAL: Duration = Duration::from_millis(100);

/// Default ceiling on concurrently live virtual users for a single run.
pub const DEFAULT_MAX_VIRTUAL_USERS: usize = 10_000;

/// Reconciliation intervals above this are almost certainly a misconfiguration.
pub const MAX_RECONCILIATION_INTERVAL: Duration = Duration::from_secs(10);
