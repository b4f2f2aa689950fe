use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::coordinate::MockCoordinate;

struct Armed {
    coordinate: MockCoordinate,
    interval: Interval,
}

/// Fixed-rate timer that hands back the held coordinate on every tick while
/// armed. It is polled from the host's own loop, so ticks never run
/// concurrently with a start or stop.
pub struct RefreshScheduler {
    period: Duration,
    armed: Option<Armed>,
}

impl RefreshScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            armed: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// The coordinate being re-asserted, if armed
    pub fn coordinate(&self) -> Option<&MockCoordinate> {
        self.armed.as_ref().map(|a| &a.coordinate)
    }

    /// Start ticking one period from now, replacing any previous schedule
    pub fn arm(&mut self, coordinate: MockCoordinate) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.armed = Some(Armed {
            coordinate,
            interval,
        });
    }

    /// Cancel the schedule, no tick is delivered after this returns
    pub fn disarm(&mut self) -> Option<MockCoordinate> {
        self.armed.take().map(|a| a.coordinate)
    }

    /// Wait for the next tick, pends forever while disarmed.
    ///
    /// Cancel safe, dropping the future before it completes loses no tick.
    pub async fn next_tick(&mut self) -> MockCoordinate {
        match self.armed.as_mut() {
            Some(armed) => {
                armed.interval.tick().await;
                armed.coordinate
            }
            None => std::future::pending().await,
        }
    }
}
