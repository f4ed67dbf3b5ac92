//! Websocket listener for the I/O gateway push model.
//!
//! On connect the gateway is asked to push digital input updates only;
//! it then sends JSON arrays of device-state records, one frame per
//! state change. A record for the configured circuit with an active
//! value is one rotation pulse.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::info;

use crate::error::SourceError;
use crate::event::{GatewayRecord, PulseFilter};
use crate::source::{Dispatcher, PulseSource};

/// Pulse source backed by an EVOK-style websocket gateway.
#[derive(Debug)]
pub struct GatewaySource {
    address: String,
    filter: PulseFilter,
}

impl GatewaySource {
    /// Create a source for the gateway at `address`, watching `circuit`.
    pub fn new(address: impl Into<String>, circuit: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            filter: PulseFilter::new(circuit),
        }
    }
}

#[async_trait]
impl PulseSource for GatewaySource {
    fn description(&self) -> String {
        format!(
            "gateway {} circuit {}",
            self.address,
            self.filter.circuit()
        )
    }

    async fn run(&mut self, dispatcher: &mut Dispatcher) -> Result<(), SourceError> {
        info!(
            address = %self.address,
            circuit = %self.filter.circuit(),
            "connecting to I/O gateway"
        );

        let (mut stream, _) = connect_async(&self.address)
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        // Subscribe to digital input updates only.
        let cmd = serde_json::json!({"cmd": "filter", "devices": ["input"]});
        stream
            .send(Message::text(cmd.to_string()))
            .await
            .map_err(|e| SourceError::Send(e.to_string()))?;

        dispatcher.mark_connected();

        while let Some(frame) = stream.next().await {
            let frame = frame.map_err(|e| SourceError::Connect(e.to_string()))?;

            match frame {
                Message::Text(payload) => {
                    match serde_json::from_str::<Vec<GatewayRecord>>(payload.as_str()) {
                        Ok(records) => {
                            if self.filter.qualifies(&records) {
                                dispatcher.pulse().await;
                            }
                        }
                        Err(e) => {
                            dispatcher.drop_malformed(&SourceError::Malformed(e.to_string()));
                        }
                    }
                }
                Message::Binary(_) => {
                    dispatcher
                        .drop_malformed(&SourceError::Malformed("binary frame".to_string()));
                }
                Message::Close(_) => return Err(SourceError::Closed),
                // Pings and pongs are handled by the protocol layer.
                _ => {}
            }
        }

        Err(SourceError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_names_address_and_circuit() {
        let source = GatewaySource::new("ws://localhost:8080/ws", "1");
        assert_eq!(source.description(), "gateway ws://localhost:8080/ws circuit 1");
    }

    #[tokio::test]
    async fn connect_to_unreachable_gateway_is_a_connect_error() {
        let registry = std::sync::Arc::new(crate::registry::FlowRegistry::new());
        let mut dispatcher = Dispatcher::new(crate::meter::FlowMeter::new(0.1), registry.clone());

        // Port 9 (discard) is not listening on this address.
        let mut source = GatewaySource::new("ws://127.0.0.1:9/ws", "1");
        let result = source.run(&mut dispatcher).await;

        assert!(matches!(result, Err(SourceError::Connect(_))));
        assert_eq!(registry.liters_total(), 0.0);
    }
}
