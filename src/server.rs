//! HTTP surface for metrics scraping and the health probe.
//!
//! Serves `GET /metrics` in Prometheus text exposition format and
//! `GET /health` backed by the [`LivenessTracker`]. Requests are handled
//! concurrently with the listener and heartbeat tasks.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::error;

use crate::health::LivenessTracker;
use crate::registry::FlowRegistry;

/// HTTP server exposing `/metrics` and `/health`.
#[derive(Debug)]
pub struct HttpServer {
    listen_addr: String,
    registry: Arc<FlowRegistry>,
    tracker: Arc<LivenessTracker>,
}

impl HttpServer {
    /// Create a server bound to `listen_addr` (e.g. "0.0.0.0:7000").
    pub fn new(
        listen_addr: impl Into<String>,
        registry: Arc<FlowRegistry>,
        tracker: Arc<LivenessTracker>,
    ) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            registry,
            tracker,
        }
    }

    /// Start serving in a background task.
    ///
    /// The server runs until the runtime shuts down. Returns a
    /// `JoinHandle` that can be used to await or abort it.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let listen_addr = self.listen_addr.clone();
        let registry = self.registry.clone();
        let tracker = self.tracker.clone();

        tokio::spawn(async move {
            if let Err(e) = run_server(listen_addr, registry, tracker).await {
                error!(error = %e, "metrics server failed");
            }
        })
    }
}

async fn run_server(
    listen_addr: String,
    registry: Arc<FlowRegistry>,
    tracker: Arc<LivenessTracker>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        let registry = registry.clone();
        let tracker = tracker.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let registry = registry.clone();
                let tracker = tracker.clone();

                async move { Ok::<_, Infallible>(respond(req.uri().path(), &registry, &tracker)) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!(error = %e, "metrics connection error");
            }
        });
    }
}

/// Build the response for a request path.
fn respond(path: &str, registry: &FlowRegistry, tracker: &LivenessTracker) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
            .body(Full::new(Bytes::from(registry.render())))
            .unwrap(),
        "/health" => {
            let (status, body) = if tracker.is_live() {
                (StatusCode::OK, "OK")
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, "liveness tick is stale")
            };
            Response::builder()
                .status(status)
                .header("Content-Type", "text/plain")
                .body(Full::new(Bytes::from(body)))
                .unwrap()
        }
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("Content-Type", "text/plain")
            .body(Full::new(Bytes::from("Not Found")))
            .unwrap(),
    }
}
