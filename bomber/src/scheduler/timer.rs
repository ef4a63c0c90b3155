use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Reconciliation clock. A slow tick is delayed rather than followed by a burst of catch-up
/// ticks, so the scheduler never reconciles twice for the same instant.
pub(crate) struct Timer {
    interval: Interval,
    last_tick: Instant,
    period: Duration,
}

impl Timer {
    pub async fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        interval.tick().await;
        let last_tick = Instant::now();
        Self {
            interval,
            last_tick,
            period,
        }
    }

    /// Wait for the next tick, returning the time since the previous one.
    pub async fn tick(&mut self) -> Duration {
        self.interval.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        if elapsed > self.period * 2 {
            debug!(
                "Reconciliation tick lagged: {} since the last one.",
                humantime::format_duration(elapsed)
            );
        }
        elapsed
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_at_period() {
        let mut timer = Timer::new(Duration::from_millis(100)).await;
        assert_eq!(timer.to_string(), "100ms");
        assert_eq!(timer.tick().await, Duration::from_millis(100));
        assert_eq!(timer.tick().await, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn delays_after_missed_tick() {
        let mut timer = Timer::new(Duration::from_millis(100)).await;
        tokio::time::sleep(Duration::from_millis(350)).await;

        // The missed ticks are not replayed back-to-back.
        let late = timer.tick().await;
        assert_eq!(late, Duration::from_millis(350));
        assert_eq!(timer.tick().await, Duration::from_millis(100));
    }
}
