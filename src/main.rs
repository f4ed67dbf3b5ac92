use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use flowpulse::{
    health, run_supervised, BusSource, Dispatcher, FlowMeter, FlowRegistry, GatewaySource,
    HttpServer, LivenessTracker, PulseSource, RateSink,
};

#[derive(Parser, Debug)]
#[command(name = "flowpulse")]
#[command(about = "Exports flow rate from a pulse-counting sensor to Prometheus and a message bus")]
struct Args {
    /// How many liters one rotation of the sensor represents
    #[arg(long, default_value_t = 0.1, value_parser = parse_liters)]
    liters_per_rotation: f64,

    /// Websocket address of the I/O gateway
    #[arg(long, default_value = "ws://localhost:8080/ws", conflicts_with = "bus_url")]
    gateway_address: String,

    /// Digital input circuit the sensor is wired to (gateway mode)
    #[arg(long, default_value_t = 1)]
    circuit: u32,

    /// Message bus URL; selects the bus pull model instead of the gateway
    #[arg(long)]
    bus_url: Option<String>,

    /// Bus topic carrying boolean pulse payloads (bus mode)
    #[arg(long, default_value = "sensor.pulse")]
    topic: String,

    /// Publish each computed sample to this bus topic (bus mode)
    #[arg(long, requires = "bus_url")]
    publish_topic: Option<String>,

    /// Listen address for the metrics and health endpoints
    #[arg(long, default_value = "0.0.0.0:7000")]
    listen: String,
}

/// Parse and validate the liters-per-rotation flag.
fn parse_liters(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err("liters per rotation must be positive".to_string())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let registry = Arc::new(FlowRegistry::new());
    let tracker = Arc::new(LivenessTracker::new());

    HttpServer::new(args.listen.as_str(), registry.clone(), tracker.clone()).start();
    info!(listen = %args.listen, "serving /metrics and /health");

    health::spawn_ticker(tracker.clone());

    let meter = FlowMeter::new(args.liters_per_rotation);
    let mut dispatcher = Dispatcher::new(meter, registry.clone());

    if let Some(bus_url) = &args.bus_url {
        if let Some(publish_topic) = &args.publish_topic {
            let sink = RateSink::connect(bus_url, publish_topic.clone())
                .await
                .with_context(|| format!("connecting sink to {bus_url}"))?;
            dispatcher = dispatcher.with_sink(sink);
        }

        let source = BusSource::new(bus_url.clone(), args.topic.clone());
        listen(source, dispatcher).await;
    } else {
        let source = GatewaySource::new(args.gateway_address.clone(), args.circuit.to_string());
        listen(source, dispatcher).await;
    }

    Ok(())
}

/// Run the supervised source until interrupted.
async fn listen<S: PulseSource>(source: S, dispatcher: Dispatcher) {
    tokio::select! {
        _ = run_supervised(source, dispatcher) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }
}
