#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
#[cfg(feature = "serde")]
use serde_with::{serde_as, DurationMilliSeconds, DurationSecondsWithFrac};
use std::fmt;
use std::time::Duration;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunStatus {
    /// The load profile ran to its end.
    Completed,
    /// Cancellation was requested before the profile ended.
    Cancelled,
}

/// Cheap running counters which may be observed while a run is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveCounters {
    pub total: u64,
    pub ok: u64,
    pub fail: u64,
}

/// Latency distribution over every recorded invocation of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", cfg_eval::cfg_eval, serde_as)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatencyStats {
    #[cfg_attr(feature = "serde", serde_as(as = "DurationSecondsWithFrac<f64>"))]
    pub min: Duration,
    #[cfg_attr(feature = "serde", serde_as(as = "DurationSecondsWithFrac<f64>"))]
    pub max: Duration,
    #[cfg_attr(feature = "serde", serde_as(as = "DurationSecondsWithFrac<f64>"))]
    pub mean: Duration,
    #[cfg_attr(feature = "serde", serde_as(as = "DurationSecondsWithFrac<f64>"))]
    pub p50: Duration,
    #[cfg_attr(feature = "serde", serde_as(as = "DurationSecondsWithFrac<f64>"))]
    pub p75: Duration,
    #[cfg_attr(feature = "serde", serde_as(as = "DurationSecondsWithFrac<f64>"))]
    pub p95: Duration,
    #[cfg_attr(feature = "serde", serde_as(as = "DurationSecondsWithFrac<f64>"))]
    pub p99: Duration,
}

/// Frozen statistics for a single run.
///
/// `fail` includes `timeouts` and `panics`. Latencies cover failed invocations as well, so a
/// target which fails fast shows up as a low-latency target with a high failure rate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", cfg_eval::cfg_eval, serde_as)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AggregateStats {
    pub scenario: String,
    pub status: RunStatus,
    pub total: u64,
    pub ok: u64,
    pub fail: u64,
    pub timeouts: u64,
    pub panics: u64,
    /// Sum of payload sizes reported by successful invocations.
    pub payload_bytes: u64,
    pub latency: LatencyStats,
    #[cfg_attr(feature = "serde", serde_as(as = "DurationMilliSeconds<u64>"))]
    pub duration: Duration,
    pub peak_virtual_users: usize,
}

impl AggregateStats {
    /// Statistics for a run which never started.
    pub fn empty(scenario: &str, status: RunStatus) -> Self {
        Self {
            scenario: scenario.to_string(),
            status,
            total: 0,
            ok: 0,
            fail: 0,
            timeouts: 0,
            panics: 0,
            payload_bytes: 0,
            latency: LatencyStats::default(),
            duration: Duration::ZERO,
            peak_virtual_users: 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    /// Invocations per second over the whole run.
    pub fn rps(&self) -> f64 {
        if self.duration.is_zero() {
            0.
        } else {
            self.total as f64 / self.duration.as_secs_f64()
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            0.
        } else {
            self.fail as f64 / self.total as f64
        }
    }
}

impl fmt::Display for AggregateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:?} in {}] total={}, ok={}, fail={} (timeouts={}, panics={}), RPS={:.2}, ErrorRate={:.2}, min={:?}, mean={:?}, p50={:?}, p75={:?}, p95={:?}, p99={:?}, max={:?}, bytes={}, peak_vus={}",
            self.scenario,
            self.status,
            humantime::format_duration(Duration::from_millis(self.duration.as_millis() as u64)),
            self.total,
            self.ok,
            self.fail,
            self.timeouts,
            self.panics,
            self.rps(),
            self.failure_rate(),
            self.latency.min,
            self.latency.mean,
            self.latency.p50,
            self.latency.p75,
            self.latency.p95,
            self.latency.p99,
            self.latency.max,
            self.payload_bytes,
            self.peak_virtual_users,
        )
    }
}
