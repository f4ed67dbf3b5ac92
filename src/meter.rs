//! Flow-rate calculation from rotation pulse timing.
//!
//! The sensor emits one pulse per rotation of its impeller, and each
//! rotation moves a fixed volume of liquid. The instantaneous flow rate
//! therefore falls out of the time elapsed between two consecutive
//! pulses:
//!
//! ```text
//! rate [l/min] = liters_per_rotation * 60e9 / elapsed [ns]
//! ```
//!
//! The meter keeps no history beyond the timestamp of the last pulse.
//! It cannot detect missed or reordered pulses; every call trusts that
//! exactly one rotation happened since the previous one.

use std::time::Instant;

use serde::Serialize;

/// Nanoseconds in a minute, used to convert an inter-pulse interval
/// into a liters-per-minute rate.
const NANOS_PER_MINUTE: f64 = 60_000_000_000.0;

/// One computed flow sample, produced per qualifying pulse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowSample {
    /// Instantaneous flow rate in liters per minute.
    pub rate_lpm: f64,
    /// Cumulative volume in liters since the meter was created.
    pub liters_total: f64,
}

/// Converts rotation pulse timing into flow rate and accumulated volume.
///
/// A `FlowMeter` is exclusively owned by the single task that dispatches
/// pulses; it is deliberately not `Sync`-wrapped. Share the results, not
/// the meter.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use flowpulse::FlowMeter;
///
/// let epoch = Instant::now();
/// let mut meter = FlowMeter::with_epoch(0.1, epoch);
///
/// let sample = meter.pulse(epoch + Duration::from_secs(6));
/// assert_eq!(sample.rate_lpm, 1.0);
/// assert_eq!(sample.liters_total, 0.1);
/// ```
#[derive(Debug)]
pub struct FlowMeter {
    liters_per_rotation: f64,
    last_pulse: Instant,
    liters_total: f64,
}

impl FlowMeter {
    /// Create a meter whose first interval starts now.
    pub fn new(liters_per_rotation: f64) -> Self {
        Self::with_epoch(liters_per_rotation, Instant::now())
    }

    /// Create a meter with an explicit epoch for the first interval.
    ///
    /// Useful in tests where pulse timestamps are synthesized.
    pub fn with_epoch(liters_per_rotation: f64, epoch: Instant) -> Self {
        Self {
            liters_per_rotation,
            last_pulse: epoch,
            liters_total: 0.0,
        }
    }

    /// Record one rotation pulse observed at `now`.
    ///
    /// Computes the rate over the interval since the previous pulse,
    /// advances the stored timestamp, and adds one rotation's volume to
    /// the cumulative total.
    ///
    /// Two pulses with zero elapsed time (duplicate or malformed
    /// upstream data) divide by a zero-length interval and yield an
    /// infinite rate. That degenerate value is passed through rather
    /// than clamped; `Instant` arithmetic saturates, so a timestamp
    /// earlier than the stored one behaves the same way.
    pub fn pulse(&mut self, now: Instant) -> FlowSample {
        let elapsed = now.duration_since(self.last_pulse);
        let rate_lpm = self.liters_per_rotation * NANOS_PER_MINUTE / elapsed.as_nanos() as f64;

        self.last_pulse = now;
        self.liters_total += self.liters_per_rotation;

        FlowSample {
            rate_lpm,
            liters_total: self.liters_total,
        }
    }

    /// Volume represented by one rotation, in liters.
    pub fn liters_per_rotation(&self) -> f64 {
        self.liters_per_rotation
    }

    /// Cumulative volume in liters.
    pub fn liters_total(&self) -> f64 {
        self.liters_total
    }

    /// Timestamp of the most recent pulse (or the epoch before any).
    pub fn last_pulse(&self) -> Instant {
        self.last_pulse
    }
}
