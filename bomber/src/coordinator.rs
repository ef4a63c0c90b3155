//! Runs one scenario or a sequence of them, one at a time, under shared cancellation.
use crate::aggregator::StatsAggregator;
use crate::context::{CancelHandle, RunContext};
use crate::scenario::RunSpec;
use crate::scheduler::VirtualUserScheduler;
use bomber_core::{AggregateStats, ConfigError, RunStatus};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Lifecycle of the coordinator's current run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    /// Virtual users have been told to stop and are finishing in-flight invocations.
    Draining,
    Completed,
    Cancelled,
}

/// Entry point of the engine.
///
/// Runs never overlap: a second call to [`Coordinator::run`] waits for the first to finish.
/// Each run gets a fresh [`StatsAggregator`], so no outcome is ever attributed to the wrong run.
pub struct Coordinator {
    token: CancellationToken,
    state: watch::Sender<RunState>,
    run_lock: Mutex<()>,
}

impl Coordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            token: CancellationToken::new(),
            state,
            run_lock: Mutex::new(()),
        }
    }

    /// Handle which cancels the current run and every run after it.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.token.clone())
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Execute a single run to completion or cancellation.
    ///
    /// Configuration problems are reported before any virtual user starts.
    pub async fn run(&self, spec: RunSpec) -> Result<AggregateStats, ConfigError> {
        spec.validate()?;
        let _guard = self.run_lock.lock().await;
        Ok(self.execute(&spec).await)
    }

    /// Execute runs in order, returning one result per run.
    ///
    /// Every spec is validated before the first starts. Once cancelled, the remaining runs are
    /// reported as empty and cancelled without starting.
    pub async fn run_sequence(
        &self,
        specs: Vec<RunSpec>,
    ) -> Result<Vec<AggregateStats>, ConfigError> {
        for spec in &specs {
            spec.validate()?;
        }

        let _guard = self.run_lock.lock().await;
        let count = specs.len();
        let mut results = Vec::with_capacity(count);
        for (idx, spec) in specs.iter().enumerate() {
            let stats = self.execute(spec).await;
            if stats.fail > 0 {
                debug!(
                    "Run {} of {count} recorded {} failures; continuing.",
                    idx + 1,
                    stats.fail
                );
            }
            results.push(stats);

            let cool_down = spec.options.cool_down;
            if idx + 1 < count && !cool_down.is_zero() {
                trace!("Cooling down for {}.", humantime::format_duration(cool_down));
                tokio::select! {
                    _ = tokio::time::sleep(cool_down) => {}
                    _ = self.token.cancelled() => {}
                }
            }
        }

        Ok(results)
    }

    #[instrument(name = "scenario", skip_all, fields(name = spec.scenario_name()))]
    async fn execute(&self, spec: &RunSpec) -> AggregateStats {
        if self.token.is_cancelled() {
            debug!("Engine cancelled; not starting.");
            self.state.send_replace(RunState::Cancelled);
            return AggregateStats::empty(spec.scenario_name(), RunStatus::Cancelled);
        }

        info!(
            "Starting run: {} (max {} virtual users).",
            spec.profile(),
            spec.options.max_virtual_users
        );

        let ctx = RunContext::new(&self.token);
        let mut aggregator = StatsAggregator::new(spec.scenario_name());
        let mut scheduler = VirtualUserScheduler::new(spec, &ctx, aggregator.recorder());

        self.state.send_replace(RunState::Running);
        let status = scheduler.run(&ctx, &mut aggregator).await;

        self.state.send_replace(RunState::Draining);
        scheduler.shutdown().await;

        let stats = aggregator.finalize(status);
        self.state.send_replace(match status {
            RunStatus::Completed => RunState::Completed,
            RunStatus::Cancelled => RunState::Cancelled,
        });

        info!(
            "Run {status:?} after {}: {} invocations, {:.2}% failed, p99 {}.",
            humantime::format_duration(stats.duration),
            stats.total,
            stats.failure_rate() * 100.,
            humantime::format_duration(stats.latency.p99)
        );
        stats
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
