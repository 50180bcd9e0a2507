// Rate limiting for the odometry and navigation passes
// The host calls update() as often as it likes; each pass only runs once its
// own period has elapsed.

use std::time::{Duration, Instant};

pub const DEFAULT_ODOM_PERIOD: Duration = Duration::from_millis(10);
pub const DEFAULT_NAV_PERIOD: Duration = Duration::from_millis(20);

/// Passes that are due this tick, with seconds since each last ran
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DuePasses {
    pub odometry: Option<f64>,
    pub navigation: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Pass {
    period: Duration,
    last: Option<Instant>,
}

impl Pass {
    fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// Elapsed seconds if due. The timestamp is reset to `now`, not advanced
    /// by the period, so a late pass never triggers a burst of catch-up runs.
    fn poll(&mut self, now: Instant) -> Option<f64> {
        let Some(last) = self.last else {
            self.last = Some(now);
            return None;
        };
        let elapsed = now.saturating_duration_since(last);
        if elapsed >= self.period && !elapsed.is_zero() {
            self.last = Some(now);
            Some(elapsed.as_secs_f64())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    odometry: Pass,
    navigation: Pass,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_ODOM_PERIOD, DEFAULT_NAV_PERIOD)
    }
}

impl Scheduler {
    pub fn new(odom_period: Duration, nav_period: Duration) -> Self {
        Self {
            odometry: Pass::new(odom_period),
            navigation: Pass::new(nav_period),
        }
    }

    /// Decide which passes run at `now`
    ///
    /// The first call only records the start time for both passes.
    pub fn poll(&mut self, now: Instant) -> DuePasses {
        DuePasses {
            odometry: self.odometry.poll(now),
            navigation: self.navigation.poll(now),
        }
    }

    pub fn odom_period(&self) -> Duration {
        self.odometry.period
    }

    pub fn set_odom_period(&mut self, period: Duration) {
        self.odometry.period = period;
    }

    pub fn nav_period(&self) -> Duration {
        self.navigation.period
    }

    pub fn set_nav_period(&mut self, period: Duration) {
        self.navigation.period = period;
    }

    /// Forget the last-run timestamps; the next poll starts over
    pub fn reset(&mut self) {
        self.odometry.last = None;
        self.navigation.last = None;
    }
}
