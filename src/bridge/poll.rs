//! Idle/Polling state machine and cadence throttle.

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Owns the polling interval. `Some` interval means Polling, `None` Idle.
#[derive(Debug)]
pub struct PollScheduler {
    interval: Option<Interval>,
    period: Duration,
    throttle: Duration,
    last_emit: Option<Instant>,
}

impl PollScheduler {
    pub fn new(period: Duration, throttle: Duration) -> Self {
        Self {
            interval: None,
            period,
            throttle,
            last_emit: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    /// Idle → Polling. Returns false (and does nothing) if already polling.
    /// The first cadence tick is one period away; the caller emits the
    /// entry snapshot itself.
    pub fn start(&mut self) -> bool {
        if self.interval.is_some() {
            return false;
        }
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        true
    }

    /// Polling → Idle. Dropping the interval cancels any pending tick.
    /// Returns false if already idle.
    pub fn stop(&mut self) -> bool {
        self.interval.take().is_some()
    }

    /// Next cadence tick; pends forever while idle.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => futures_util::future::pending::<()>().await,
        }
    }

    /// Cadence emissions are capped at one per throttle window, measured
    /// from the previous emission of any kind.
    pub fn cadence_allowed(&self, now: Instant) -> bool {
        self.last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.throttle)
    }

    pub fn record_emit(&mut self, at: Instant) {
        self.last_emit = Some(at);
    }
}
