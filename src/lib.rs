//! # flowpulse
//!
//! Bridges a pulse-counting flow sensor to Prometheus and a message bus.
//!
//! The sensor emits one pulse per impeller rotation, read either through
//! a building-automation I/O gateway (websocket push) or a message-bus
//! topic (boolean payloads). Each qualifying pulse advances a flow-rate
//! gauge and a cumulative volume counter, both exposed over HTTP for
//! scraping and optionally republished to a bus topic.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ┌─────────┐   ┌────────────┐   ┌───────┐   ┌────────────┐  │
//! │  │ source  │──▶│ dispatcher │──▶│ meter │──▶│  registry  │  │
//! │  │ (ws/bus)│   │  (filter)  │   │ (rate)│   │ + sink     │  │
//! │  └────┬────┘   └────────────┘   └───────┘   └─────┬──────┘  │
//! │       │ supervised reconnect                      ▼         │
//! │       │ with backoff                        ┌───────────┐   │
//! │  ┌────┴────┐   ┌──────────┐                 │  server   │   │
//! │  │ health  │◀──│ 15s tick │                 │ /metrics  │   │
//! │  │ tracker │   └──────────┘                 │ /health   │   │
//! │  └─────────┘                                └───────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: upstream subscriptions ([`PulseSource`] trait) with
//!   implementations for the websocket gateway and the message bus, plus
//!   the supervising reconnect loop
//! - **[`meter`]**: pure flow-rate calculation from pulse timing
//! - **[`event`]**: inbound payload shapes and the qualifying-pulse filter
//! - **[`registry`]**: shared metric state and Prometheus text rendering
//! - **[`server`]**: `/metrics` and `/health` HTTP endpoints
//! - **[`health`]**: liveness heartbeat backing the health probe
//! - **[`sink`]**: optional republication of samples to a bus topic

pub mod error;
pub mod event;
pub mod health;
pub mod meter;
pub mod registry;
pub mod server;
pub mod sink;
pub mod source;

// Re-export main types for convenience
pub use error::SourceError;
pub use event::{parse_bool_payload, GatewayRecord, PulseFilter};
pub use health::LivenessTracker;
pub use meter::{FlowMeter, FlowSample};
pub use registry::FlowRegistry;
pub use server::HttpServer;
pub use sink::RateSink;
pub use source::{run_supervised, BusSource, Dispatcher, GatewaySource, PulseSource};
