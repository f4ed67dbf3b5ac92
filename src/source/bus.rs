//! Message-bus subscriber for the bus pull model.
//!
//! Each message on the configured topic carries one boolean payload:
//! `true` is a rotation pulse, `false` is ignored, anything else is
//! malformed and dropped.

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::info;

use crate::error::SourceError;
use crate::event::parse_bool_payload;
use crate::source::{Dispatcher, PulseSource};

/// Pulse source backed by a NATS subscription.
#[derive(Debug)]
pub struct BusSource {
    url: String,
    topic: String,
}

impl BusSource {
    /// Create a source subscribing to `topic` on the bus at `url`.
    pub fn new(url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl PulseSource for BusSource {
    fn description(&self) -> String {
        format!("bus {} topic {}", self.url, self.topic)
    }

    async fn run(&mut self, dispatcher: &mut Dispatcher) -> Result<(), SourceError> {
        info!(url = %self.url, topic = %self.topic, "connecting to message bus");

        let client = async_nats::connect(&self.url)
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        let mut subscription = client
            .subscribe(self.topic.clone())
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        dispatcher.mark_connected();

        while let Some(message) = subscription.next().await {
            match parse_bool_payload(&message.payload) {
                Ok(true) => {
                    dispatcher.pulse().await;
                }
                Ok(false) => {}
                Err(e) => dispatcher.drop_malformed(&e),
            }
        }

        Err(SourceError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_names_url_and_topic() {
        let source = BusSource::new("nats://localhost:4222", "sensor.pulse");
        assert_eq!(
            source.description(),
            "bus nats://localhost:4222 topic sensor.pulse"
        );
    }
}
