//! Shared metric state and Prometheus text exposition.
//!
//! The registry is the meeting point between the dispatch task (which
//! writes one sample per qualifying pulse) and the HTTP server (which
//! renders on every scrape). It is internally synchronized so it can be
//! `Arc`-shared freely.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::meter::FlowSample;

/// Thread-safe store for the exported flow metrics.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    /// Instantaneous flow rate gauge, liters per minute.
    rate_lpm: RwLock<f64>,
    /// Monotonic cumulative volume counter, liters.
    liters_total: RwLock<f64>,
    /// Upstream connections closed (cleanly or not) since startup.
    connection_closes: AtomicU64,
    /// Malformed payloads dropped since startup.
    malformed_payloads: AtomicU64,
}

impl FlowRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a computed sample: gauge and counter move together.
    pub fn record(&self, sample: &FlowSample) {
        *self.rate_lpm.write() = sample.rate_lpm;
        *self.liters_total.write() = sample.liters_total;
    }

    /// Count one upstream connection close.
    pub fn record_close(&self) {
        self.connection_closes.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one dropped malformed payload.
    pub fn record_malformed(&self) {
        self.malformed_payloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Current flow rate in liters per minute.
    pub fn rate_lpm(&self) -> f64 {
        *self.rate_lpm.read()
    }

    /// Cumulative liters circulated.
    pub fn liters_total(&self) -> f64 {
        *self.liters_total.read()
    }

    /// Upstream connection closes since startup.
    pub fn connection_closes(&self) -> u64 {
        self.connection_closes.load(Ordering::Relaxed)
    }

    /// Malformed payloads dropped since startup.
    pub fn malformed_payloads(&self) -> u64 {
        self.malformed_payloads.load(Ordering::Relaxed)
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP rate_liters_per_minute Current flow rate in liters per minute\n");
        output.push_str("# TYPE rate_liters_per_minute gauge\n");
        output.push_str(&format!(
            "rate_liters_per_minute {}\n",
            format_value(self.rate_lpm())
        ));

        output.push_str("# HELP liters_total Current number of liters circulated\n");
        output.push_str("# TYPE liters_total counter\n");
        output.push_str(&format!(
            "liters_total {}\n",
            format_value(self.liters_total())
        ));

        output.push_str(
            "# HELP flowpulse_connection_closes_total Total number of upstream connection closes\n",
        );
        output.push_str("# TYPE flowpulse_connection_closes_total counter\n");
        output.push_str(&format!(
            "flowpulse_connection_closes_total {}\n",
            self.connection_closes()
        ));

        output.push_str(
            "# HELP flowpulse_malformed_payloads_total Total number of malformed payloads dropped\n",
        );
        output.push_str("# TYPE flowpulse_malformed_payloads_total counter\n");
        output.push_str(&format!(
            "flowpulse_malformed_payloads_total {}\n",
            self.malformed_payloads()
        ));

        output
    }
}

/// Format a float for exposition. A duplicate pulse can drive the gauge
/// to infinity; Prometheus spells that "+Inf".
fn format_value(v: f64) -> String {
    if v.is_infinite() {
        if v > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_updates_gauge_and_counter_together() {
        let registry = FlowRegistry::new();

        registry.record(&FlowSample {
            rate_lpm: 1.5,
            liters_total: 0.3,
        });

        assert_eq!(registry.rate_lpm(), 1.5);
        assert_eq!(registry.liters_total(), 0.3);
    }

    #[test]
    fn render_includes_help_and_type_headers() {
        let registry = FlowRegistry::new();
        let output = registry.render();

        assert!(output.contains("# HELP rate_liters_per_minute"));
        assert!(output.contains("# TYPE rate_liters_per_minute gauge"));
        assert!(output.contains("# HELP liters_total"));
        assert!(output.contains("# TYPE liters_total counter"));
        assert!(output.contains("# TYPE flowpulse_connection_closes_total counter"));
        assert!(output.contains("# TYPE flowpulse_malformed_payloads_total counter"));
    }

    #[test]
    fn render_includes_current_values() {
        let registry = FlowRegistry::new();
        registry.record(&FlowSample {
            rate_lpm: 2.5,
            liters_total: 0.5,
        });
        registry.record_close();
        registry.record_malformed();
        registry.record_malformed();

        let output = registry.render();
        assert!(output.contains("rate_liters_per_minute 2.5\n"));
        assert!(output.contains("liters_total 0.5\n"));
        assert!(output.contains("flowpulse_connection_closes_total 1\n"));
        assert!(output.contains("flowpulse_malformed_payloads_total 2\n"));
    }

    #[test]
    fn empty_registry_renders_zeroes() {
        let output = FlowRegistry::new().render();

        assert!(output.contains("rate_liters_per_minute 0\n"));
        assert!(output.contains("liters_total 0\n"));
        assert!(output.contains("flowpulse_connection_closes_total 0\n"));
    }

    #[test]
    fn infinite_rate_renders_as_prometheus_inf() {
        let registry = FlowRegistry::new();
        registry.record(&FlowSample {
            rate_lpm: f64::INFINITY,
            liters_total: 0.1,
        });

        assert!(registry.render().contains("rate_liters_per_minute +Inf\n"));
    }

    #[test]
    fn counters_accumulate() {
        let registry = FlowRegistry::new();
        for _ in 0..3 {
            registry.record_close();
        }
        assert_eq!(registry.connection_closes(), 3);
    }
}
