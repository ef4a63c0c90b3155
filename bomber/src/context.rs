use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Externally held handle which aborts the current run and every pending run.
///
/// Cancellation is terminal: once fired, the [`Coordinator`](crate::coordinator::Coordinator)
/// it came from never starts another virtual user.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Clock and cancellation scope of a single run.
///
/// The run token is a child of the engine-wide token, and every virtual user's stop token is a
/// child of the run token, so engine cancellation reaches all of them at once.
pub(crate) struct RunContext {
    start: Instant,
    token: CancellationToken,
}

impl RunContext {
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            start: Instant::now(),
            token: parent.child_token(),
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handed to the workload step on every invocation.
#[derive(Clone, Debug)]
pub struct StepContext {
    scenario: Arc<str>,
    virtual_user: u64,
    invocation: u64,
    token: CancellationToken,
}

impl StepContext {
    pub(crate) fn new(
        scenario: Arc<str>,
        virtual_user: u64,
        invocation: u64,
        token: CancellationToken,
    ) -> Self {
        Self {
            scenario,
            virtual_user,
            invocation,
            token,
        }
    }

    pub fn scenario_name(&self) -> &str {
        &self.scenario
    }

    /// Identifier of the virtual user, unique within a run.
    pub fn virtual_user(&self) -> u64 {
        self.virtual_user
    }

    /// Zero-based count of invocations this virtual user has made before this one.
    pub fn invocation(&self) -> u64 {
        self.invocation
    }

    /// Whether this virtual user has been asked to stop. Long-running steps may use this to
    /// finish early; the executor itself never interrupts a running invocation for it.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
