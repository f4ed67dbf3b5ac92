//! Process liveness tracking for the health probe.
//!
//! The tracker records the timestamp of the most recent liveness tick.
//! Ticks come from a periodic heartbeat task, deliberately independent
//! of sensor activity: the probe answers "is the process loop alive",
//! not "is liquid flowing".

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// How often the heartbeat task refreshes the tracker.
pub const TICK_PERIOD: Duration = Duration::from_secs(15);

/// How stale the last tick may be before the probe reports unhealthy.
pub const STALE_AFTER: Duration = Duration::from_secs(60);

/// Records the most recent liveness tick and answers the health probe.
#[derive(Debug)]
pub struct LivenessTracker {
    last_tick: RwLock<Instant>,
    stale_after: Duration,
}

impl LivenessTracker {
    /// Create a tracker that starts live, with the default staleness bound.
    pub fn new() -> Self {
        Self::with_staleness(STALE_AFTER)
    }

    /// Create a tracker with an explicit staleness bound.
    pub fn with_staleness(stale_after: Duration) -> Self {
        Self {
            last_tick: RwLock::new(Instant::now()),
            stale_after,
        }
    }

    /// Refresh the liveness timestamp to now.
    pub fn tick(&self) {
        self.tick_at(Instant::now());
    }

    /// Refresh the liveness timestamp to an explicit instant.
    pub fn tick_at(&self, now: Instant) {
        *self.last_tick.write() = now;
    }

    /// True iff the last tick is within the staleness bound of now.
    pub fn is_live(&self) -> bool {
        self.is_live_at(Instant::now())
    }

    /// True iff the last tick is within the staleness bound of `now`.
    pub fn is_live_at(&self, now: Instant) -> bool {
        now.duration_since(*self.last_tick.read()) <= self.stale_after
    }
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the heartbeat task refreshing `tracker` every [`TICK_PERIOD`].
///
/// Runs until the runtime shuts down. The returned handle can be used
/// to abort it.
pub fn spawn_ticker(tracker: Arc<LivenessTracker>) -> tokio::task::JoinHandle<()> {
    spawn_ticker_with_period(tracker, TICK_PERIOD)
}

/// Spawn a heartbeat task with an explicit period.
pub fn spawn_ticker_with_period(
    tracker: Arc<LivenessTracker>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            tracker.tick();
        }
    })
}
