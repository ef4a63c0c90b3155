//! Lock-free ingestion of outcomes and terminal computation of run statistics.
use bomber_core::{
    AggregateStats, FailKind, LatencyStats, LiveCounters, Outcome, RunStatus, Status,
};
use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const TDIGEST_BACKLOG_SIZE: usize = 100;
const TDIGEST_COMPRESSION: f64 = 100.;

struct Tallies {
    start: std::time::Instant,
    ok: AtomicU64,
    fail: AtomicU64,
    timeouts: AtomicU64,
    panics: AtomicU64,
    stale: AtomicU64,
    payload_bytes: AtomicU64,
    latency_sum_ns: AtomicU64,
    latency_min_ns: AtomicU64,
    latency_max_ns: AtomicU64,
    latencies: AtomicBucket<Duration>,
}

impl Tallies {
    fn new(start: std::time::Instant) -> Self {
        Self {
            start,
            ok: AtomicU64::new(0),
            fail: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            panics: AtomicU64::new(0),
            stale: AtomicU64::new(0),
            payload_bytes: AtomicU64::new(0),
            latency_sum_ns: AtomicU64::new(0),
            latency_min_ns: AtomicU64::new(u64::MAX),
            latency_max_ns: AtomicU64::new(0),
            latencies: AtomicBucket::new(),
        }
    }

    fn live(&self) -> LiveCounters {
        let ok = self.ok.load(Ordering::Relaxed);
        let fail = self.fail.load(Ordering::Relaxed);
        LiveCounters {
            total: ok + fail,
            ok,
            fail,
        }
    }
}

/// Ingestion handle given to every executor of a run.
///
/// Recording never takes a lock: counters are relaxed atomics and latencies go to an
/// append-only atomic bucket which the owning [`StatsAggregator`] drains.
#[derive(Clone)]
pub struct Recorder {
    tallies: Arc<Tallies>,
}

impl Recorder {
    pub fn record(&self, outcome: Outcome) {
        let tallies = &*self.tallies;

        if outcome.timestamp() < tallies.start {
            trace!("Discarding outcome stamped before the run started.");
            tallies.stale.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match outcome.status() {
            Status::Ok => {
                tallies.ok.fetch_add(1, Ordering::Relaxed);
                if let Some(size) = outcome.payload_size() {
                    tallies.payload_bytes.fetch_add(size, Ordering::Relaxed);
                }
            }
            Status::Fail(kind) => {
                tallies.fail.fetch_add(1, Ordering::Relaxed);
                match kind {
                    FailKind::Timeout => {
                        tallies.timeouts.fetch_add(1, Ordering::Relaxed);
                    }
                    FailKind::Panic => {
                        tallies.panics.fetch_add(1, Ordering::Relaxed);
                    }
                    FailKind::Step => {}
                }
            }
        }

        let latency = outcome.latency();
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        tallies.latency_sum_ns.fetch_add(nanos, Ordering::Relaxed);
        tallies.latency_min_ns.fetch_min(nanos, Ordering::Relaxed);
        tallies.latency_max_ns.fetch_max(nanos, Ordering::Relaxed);
        tallies.latencies.push(latency);
    }

    pub fn live(&self) -> LiveCounters {
        self.tallies.live()
    }
}

/// Owns the statistics of a single run.
///
/// Created when the run starts; only outcomes stamped at or after that instant are counted.
/// [`StatsAggregator::collect`] folds buffered latencies into a t-digest and is called on every
/// reconciliation tick so memory stays bounded. [`StatsAggregator::finalize`] is terminal.
pub struct StatsAggregator {
    scenario: String,
    start: Instant,
    tallies: Arc<Tallies>,
    digest: TDigest<K1>,
    peak_virtual_users: usize,
    frozen: Option<AggregateStats>,
}

impl StatsAggregator {
    pub fn new(scenario: &str) -> Self {
        let start = Instant::now();
        Self {
            scenario: scenario.to_string(),
            start,
            tallies: Arc::new(Tallies::new(start.into_std())),
            digest: default_tdigest(),
            peak_virtual_users: 0,
            frozen: None,
        }
    }

    pub fn recorder(&self) -> Recorder {
        Recorder {
            tallies: self.tallies.clone(),
        }
    }

    pub fn live(&self) -> LiveCounters {
        self.tallies.live()
    }

    /// Drain buffered latencies into the sketch, returning how many were folded in.
    pub fn collect(&mut self) -> usize {
        let digest = &mut self.digest;
        let mut drained = 0;
        self.tallies.latencies.clear_with(|latencies| {
            drained += latencies.len();
            for latency in latencies {
                digest.insert(latency.as_secs_f64());
            }
        });
        drained
    }

    pub fn note_virtual_users(&mut self, live: usize) {
        self.peak_virtual_users = self.peak_virtual_users.max(live);
    }

    /// Freeze the run's statistics.
    ///
    /// Must only be called once no executor can record anymore. The first call computes
    /// percentiles and takes the run duration; later calls return that same snapshot.
    pub fn finalize(&mut self, status: RunStatus) -> AggregateStats {
        if let Some(frozen) = &self.frozen {
            return frozen.clone();
        }

        let duration = self.start.elapsed();
        self.collect();

        let tallies = &*self.tallies;
        let ok = tallies.ok.load(Ordering::Relaxed);
        let fail = tallies.fail.load(Ordering::Relaxed);
        let total = ok + fail;

        let stale = tallies.stale.load(Ordering::Relaxed);
        if stale > 0 {
            warn!("Discarded {stale} outcomes recorded before {} started.", self.scenario);
        }

        let latency = if total == 0 {
            LatencyStats::default()
        } else {
            let min = Duration::from_nanos(tallies.latency_min_ns.load(Ordering::Relaxed));
            let max = Duration::from_nanos(tallies.latency_max_ns.load(Ordering::Relaxed));
            let mean = Duration::from_nanos(tallies.latency_sum_ns.load(Ordering::Relaxed) / total);
            LatencyStats {
                min,
                max,
                mean,
                p50: self.quantile(0.50, min, max),
                p75: self.quantile(0.75, min, max),
                p95: self.quantile(0.95, min, max),
                p99: self.quantile(0.99, min, max),
            }
        };

        let stats = AggregateStats {
            scenario: self.scenario.clone(),
            status,
            total,
            ok,
            fail,
            timeouts: tallies.timeouts.load(Ordering::Relaxed),
            panics: tallies.panics.load(Ordering::Relaxed),
            payload_bytes: tallies.payload_bytes.load(Ordering::Relaxed),
            latency,
            duration,
            peak_virtual_users: self.peak_virtual_users,
        };

        self.frozen = Some(stats.clone());
        stats
    }

    fn quantile(&self, quantile: f64, min: Duration, max: Duration) -> Duration {
        let secs = self.digest.quantile(quantile);

        // TDigest can return NaN on degenerate inputs.
        let secs = if secs.is_finite() {
            secs
        } else {
            error!("NaN latency quantile for p{}; reporting the minimum.", quantile * 100.);
            min.as_secs_f64()
        };

        Duration::from_secs_f64(secs.max(0.)).clamp(min, max)
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(TDIGEST_COMPRESSION), TDIGEST_BACKLOG_SIZE)
}
