//! Pulse sources and the supervising reconnect loop.
//!
//! A [`PulseSource`] owns one upstream subscription and feeds qualifying
//! events into a [`Dispatcher`]. Sources run until the stream fails or
//! closes, returning the error to [`run_supervised`], which reconnects
//! with bounded exponential backoff instead of taking the process down.

mod bus;
mod gateway;

pub use bus::BusSource;
pub use gateway::GatewaySource;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::SourceError;
use crate::meter::{FlowMeter, FlowSample};
use crate::registry::FlowRegistry;
use crate::sink::RateSink;

/// First retry delay after a failed session.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Retry delay ceiling.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// A subscription to an upstream pulse stream.
#[async_trait]
pub trait PulseSource {
    /// Human-readable description used in log lines.
    fn description(&self) -> String;

    /// Run the subscription until the stream fails or closes.
    ///
    /// Messages must be processed in receipt order. Malformed payloads
    /// are handled inside the loop via [`Dispatcher::drop_malformed`];
    /// only session-ending conditions are returned. Implementations
    /// call [`Dispatcher::mark_connected`] once the subscription is
    /// established so the supervisor can reset its backoff.
    async fn run(&mut self, dispatcher: &mut Dispatcher) -> Result<(), SourceError>;
}

/// Routes qualifying events from a source into the meter and onward to
/// the exposition surfaces.
///
/// The dispatcher exclusively owns the [`FlowMeter`]; only the single
/// source task mutates it. The registry is shared and internally
/// synchronized.
pub struct Dispatcher {
    meter: FlowMeter,
    registry: Arc<FlowRegistry>,
    sink: Option<RateSink>,
    connected: bool,
}

impl Dispatcher {
    /// Create a dispatcher over a meter and the shared registry.
    pub fn new(meter: FlowMeter, registry: Arc<FlowRegistry>) -> Self {
        Self {
            meter,
            registry,
            sink: None,
            connected: false,
        }
    }

    /// Also publish each sample to a bus topic.
    pub fn with_sink(mut self, sink: RateSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The shared registry this dispatcher records into.
    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.registry
    }

    /// Handle one qualifying event: compute, record, publish.
    pub async fn pulse(&mut self) -> FlowSample {
        let sample = self.meter.pulse(Instant::now());
        self.registry.record(&sample);

        if let Some(sink) = &self.sink {
            sink.publish(&sample).await;
        }

        debug!(
            rate_lpm = sample.rate_lpm,
            liters_total = sample.liters_total,
            "rotation pulse"
        );
        sample
    }

    /// Log and count a malformed payload; the event is dropped and the
    /// meter is left untouched.
    pub fn drop_malformed(&self, err: &SourceError) {
        warn!(error = %err, "dropping malformed payload");
        self.registry.record_malformed();
    }

    /// Note that the current session established its subscription.
    ///
    /// Sources call this once connected; the supervisor reads it after
    /// the session ends to reset its retry delay.
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Consume the connected flag for the session that just ended.
    fn take_connected(&mut self) -> bool {
        std::mem::take(&mut self.connected)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("meter", &self.meter)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Run a source forever, reconnecting with exponential backoff.
///
/// A clean close increments the closes counter; any failure is logged.
/// The delay doubles per session up to [`MAX_BACKOFF`] and resets to
/// the initial value whenever a session got as far as a successful
/// connect.
pub async fn run_supervised<S: PulseSource>(mut source: S, mut dispatcher: Dispatcher) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let result = source.run(&mut dispatcher).await;

        if dispatcher.take_connected() {
            backoff = INITIAL_BACKOFF;
        }

        match result {
            Ok(()) => {
                // Sources run until error; treat a bare return as a close.
                dispatcher.registry().record_close();
                info!(source = %source.description(), "stream ended, resubscribing");
            }
            Err(SourceError::Closed) => {
                dispatcher.registry().record_close();
                info!(source = %source.description(), "stream closed, resubscribing");
            }
            Err(e) => {
                error!(source = %source.description(), error = %e, "source failed");
            }
        }

        debug!(delay_secs = backoff.as_secs(), "retrying after backoff");
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff);
    }
}

/// Double the delay, capped at [`MAX_BACKOFF`].
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let mut delay = INITIAL_BACKOFF;
        let mut observed = Vec::new();

        for _ in 0..8 {
            observed.push(delay.as_secs());
            delay = next_backoff(delay);
        }

        assert_eq!(observed, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[tokio::test]
    async fn pulse_updates_registry() {
        let registry = Arc::new(FlowRegistry::new());
        let meter = FlowMeter::new(0.1);
        let mut dispatcher = Dispatcher::new(meter, registry.clone());

        let sample = dispatcher.pulse().await;

        assert!((registry.liters_total() - 0.1).abs() < 1e-9);
        assert_eq!(registry.rate_lpm(), sample.rate_lpm);
    }

    #[tokio::test]
    async fn repeated_pulses_accumulate_volume() {
        let registry = Arc::new(FlowRegistry::new());
        let mut dispatcher = Dispatcher::new(FlowMeter::new(0.1), registry.clone());

        for _ in 0..5 {
            dispatcher.pulse().await;
        }

        assert!((registry.liters_total() - 0.5).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_resets_after_a_connected_session() {
        struct ScriptedSource {
            sessions: Vec<(bool, SourceError)>,
            starts: Arc<parking_lot::Mutex<Vec<tokio::time::Instant>>>,
        }

        #[async_trait]
        impl PulseSource for ScriptedSource {
            fn description(&self) -> String {
                "scripted".to_string()
            }

            async fn run(&mut self, dispatcher: &mut Dispatcher) -> Result<(), SourceError> {
                self.starts.lock().push(tokio::time::Instant::now());
                if self.sessions.is_empty() {
                    std::future::pending::<()>().await;
                }
                let (connected, err) = self.sessions.remove(0);
                if connected {
                    dispatcher.mark_connected();
                }
                Err(err)
            }
        }

        let starts = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let source = ScriptedSource {
            sessions: vec![
                (false, SourceError::Connect("refused".to_string())),
                (false, SourceError::Connect("refused".to_string())),
                (false, SourceError::Connect("refused".to_string())),
                (true, SourceError::Closed),
                (false, SourceError::Connect("refused".to_string())),
            ],
            starts: starts.clone(),
        };
        let dispatcher = Dispatcher::new(FlowMeter::new(0.1), Arc::new(FlowRegistry::new()));

        let handle = tokio::spawn(run_supervised(source, dispatcher));
        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.abort();

        let starts = starts.lock();
        let gaps: Vec<u64> = starts.windows(2).map(|w| (w[1] - w[0]).as_secs()).collect();

        // Three failed connects double the delay; the session that got
        // through resets it to the initial value.
        assert_eq!(gaps, vec![1, 2, 4, 1, 2]);
    }

    #[tokio::test]
    async fn drop_malformed_counts_without_touching_meter() {
        let registry = Arc::new(FlowRegistry::new());
        let dispatcher = Dispatcher::new(FlowMeter::new(0.1), registry.clone());

        dispatcher.drop_malformed(&SourceError::Malformed("garbage".to_string()));

        assert_eq!(registry.malformed_payloads(), 1);
        assert_eq!(registry.liters_total(), 0.0);
    }
}
