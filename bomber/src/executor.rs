use crate::aggregator::Recorder;
use crate::context::StepContext;
use crate::scenario::Scenario;
use bomber_core::{FailKind, Outcome};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

/// Handle to one spawned virtual user.
pub(crate) struct VirtualUser {
    pub id: u64,
    pub stop: CancellationToken,
    pub handle: JoinHandle<()>,
}

impl VirtualUser {
    /// Spawn a virtual user which loops over the scenario's step until `stop` is cancelled.
    ///
    /// `stop` must be a child of `run`: cancelling `run` abandons the in-flight invocation,
    /// while cancelling only `stop` lets it finish and be recorded.
    pub fn spawn(
        id: u64,
        scenario: Scenario,
        run: CancellationToken,
        stop: CancellationToken,
        timeout: Duration,
        recorder: Recorder,
    ) -> Self {
        let span = tracing::trace_span!("virtual_user", id);
        let handle = tokio::spawn(
            virtual_user_loop(id, scenario, run, stop.clone(), timeout, recorder).instrument(span),
        );
        Self { id, stop, handle }
    }
}

async fn virtual_user_loop(
    id: u64,
    scenario: Scenario,
    run: CancellationToken,
    stop: CancellationToken,
    timeout: Duration,
    recorder: Recorder,
) {
    #[cfg(feature = "metrics")]
    let metrics = StepMetrics::new(scenario.name());

    let mut invocation = 0;
    while !stop.is_cancelled() {
        let ctx = StepContext::new(scenario.name_arc(), id, invocation, stop.clone());

        let outcome = tokio::select! {
            biased;
            _ = run.cancelled() => {
                trace!("Run cancelled; abandoning invocation {invocation}.");
                break;
            }
            outcome = invoke(&scenario, ctx, timeout) => outcome,
        };

        #[cfg(feature = "metrics")]
        metrics.observe(&outcome);

        recorder.record(outcome);
        invocation += 1;

        // NOTE: A step which never suspends would otherwise starve the reconciliation tick.
        tokio::task::yield_now().await;
    }
    trace!("Stopped after {invocation} invocations.");
}

/// Run the step once, mapping every way it can go wrong onto a failed [`Outcome`].
pub(crate) async fn invoke(scenario: &Scenario, ctx: StepContext, timeout: Duration) -> Outcome {
    let step = scenario.step();
    // The step is called inside the future so a panic while building it is caught too.
    let fut = AssertUnwindSafe(async move { step(ctx).await }).catch_unwind();

    let start = Instant::now();
    let res = tokio::time::timeout(timeout, fut).await;
    let latency = start.elapsed();
    let timestamp = start.into_std();

    match res {
        Ok(Ok(response)) => Outcome::completed(response, latency, timestamp),
        Ok(Err(_)) => {
            debug!("Step panicked in {}.", scenario.name());
            Outcome::failed(FailKind::Panic, latency, timestamp)
        }
        Err(_) => {
            trace!(
                "Step exceeded {}; abandoning it.",
                humantime::format_duration(timeout)
            );
            Outcome::failed(FailKind::Timeout, latency, timestamp)
        }
    }
}

#[cfg(feature = "metrics")]
struct StepMetrics {
    ok: metrics::Counter,
    fail: metrics::Counter,
    latency: metrics::Histogram,
}

#[cfg(feature = "metrics")]
impl StepMetrics {
    fn new(scenario: &str) -> Self {
        let scenario = scenario.to_string();
        Self {
            ok: metrics::counter!("bomber_outcomes_ok", "scenario" => scenario.clone()),
            fail: metrics::counter!("bomber_outcomes_fail", "scenario" => scenario.clone()),
            latency: metrics::histogram!("bomber_latency_seconds", "scenario" => scenario),
        }
    }

    fn observe(&self, outcome: &Outcome) {
        self.latency.record(outcome.latency().as_secs_f64());
        if outcome.status().is_ok() {
            self.ok.increment(1);
        } else {
            self.fail.increment(1);
        }
    }
}
