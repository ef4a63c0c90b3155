//! Keeps the number of live virtual users on the load profile.
use crate::aggregator::{Recorder, StatsAggregator};
use crate::context::RunContext;
use crate::executor::VirtualUser;
use crate::scenario::{RunSpec, Scenario};
use bomber_core::{LoadProfile, RunOptions, RunStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

mod timer;

use timer::Timer;

/// Stand-in for deadlines too far away to represent, roughly thirty years out.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}

pub(crate) struct VirtualUserScheduler {
    scenario: Scenario,
    profile: Arc<LoadProfile>,
    options: RunOptions,
    recorder: Recorder,
    run: CancellationToken,
    active: Vec<VirtualUser>,
    retiring: Vec<VirtualUser>,
    next_id: u64,
    #[cfg(feature = "metrics")]
    gauge: metrics::Gauge,
}

impl VirtualUserScheduler {
    pub fn new(spec: &RunSpec, ctx: &RunContext, recorder: Recorder) -> Self {
        #[cfg(feature = "metrics")]
        metrics::describe_histogram!(
            "bomber_latency_seconds",
            metrics::Unit::Seconds,
            "Latency of workload step invocations."
        );

        Self {
            scenario: spec.scenario.clone(),
            profile: spec.profile.clone(),
            options: spec.options.clone(),
            recorder,
            run: ctx.token().clone(),
            active: vec![],
            retiring: vec![],
            next_id: 0,
            #[cfg(feature = "metrics")]
            gauge: metrics::gauge!(
                "bomber_virtual_users",
                "scenario" => spec.scenario.name().to_string()
            ),
        }
    }

    /// Drive the profile until it ends or the run is cancelled.
    #[instrument(name = "scheduler", skip_all, fields(scenario = self.scenario.name()))]
    pub async fn run(&mut self, ctx: &RunContext, aggregator: &mut StatsAggregator) -> RunStatus {
        let total = self.profile.total_duration();
        let deadline = ctx.start().checked_add(total).unwrap_or_else(far_future);
        let mut timer = Timer::new(self.options.reconciliation_interval).await;
        debug!(
            "Reconciling every {timer} over {}.",
            humantime::format_duration(total)
        );

        loop {
            if ctx.is_cancelled() {
                return RunStatus::Cancelled;
            }

            let elapsed = ctx.elapsed();
            if elapsed >= total {
                return RunStatus::Completed;
            }

            let live = self.reconcile(elapsed);
            aggregator.note_virtual_users(live);
            let folded = aggregator.collect();
            trace!(
                "live={live}, retiring={}, folded={folded}, {:?}",
                self.retiring(),
                aggregator.live()
            );

            tokio::select! {
                _ = timer.tick() => {}
                _ = ctx.token().cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    /// Move the live count to the profile's target for `elapsed`, returning the new count.
    pub fn reconcile(&mut self, elapsed: Duration) -> usize {
        let target = if self.run.is_cancelled() {
            0
        } else {
            self.profile
                .concurrency_at(elapsed)
                .min(self.options.max_virtual_users)
        };

        self.set_concurrency(target);
        self.retiring.retain(|vu| !vu.handle.is_finished());
        self.live()
    }

    fn set_concurrency(&mut self, concurrency: usize) {
        if self.active.len() > concurrency {
            // Newest virtual users retire first.
            for vu in self.active.drain(concurrency..).rev() {
                vu.stop.cancel();
                self.retiring.push(vu);
            }
        } else {
            while self.active.len() < concurrency {
                let id = self.next_id;
                self.next_id += 1;
                self.active.push(VirtualUser::spawn(
                    id,
                    self.scenario.clone(),
                    self.run.clone(),
                    self.run.child_token(),
                    self.options.invocation_timeout,
                    self.recorder.clone(),
                ));
            }
        }

        #[cfg(feature = "metrics")]
        self.gauge.set(self.active.len() as f64);
    }

    pub fn live(&self) -> usize {
        self.active.len()
    }

    /// Virtual users told to stop which are still finishing their last invocation.
    pub fn retiring(&self) -> usize {
        self.retiring.len()
    }

    /// Stop every virtual user and wait for them to exit.
    ///
    /// Each gets until the invocation timeout plus one reconciliation interval; stragglers are
    /// aborted.
    #[instrument(name = "scheduler", skip_all, fields(scenario = self.scenario.name()))]
    pub async fn shutdown(mut self) {
        self.set_concurrency(0);

        let grace = self
            .options
            .invocation_timeout
            .saturating_add(self.options.reconciliation_interval);
        let deadline = Instant::now().checked_add(grace).unwrap_or_else(far_future);
        let mut aborted = 0;
        for mut vu in std::mem::take(&mut self.retiring) {
            match tokio::time::timeout_at(deadline, &mut vu.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("Virtual user {} exited abnormally: {err}", vu.id),
                Err(_) => {
                    vu.handle.abort();
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            warn!(
                "Aborted {aborted} virtual users still running after {}.",
                humantime::format_duration(grace)
            );
        }
    }
}
