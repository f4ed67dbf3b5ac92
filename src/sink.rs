//! Downstream publication of computed samples to the message bus.

use tracing::warn;

use crate::error::SourceError;
use crate::meter::FlowSample;

/// Publishes each computed sample as JSON to a bus topic.
///
/// Publication is best effort: a failed publish is logged and the
/// sample is dropped, it never stalls or fails the dispatch loop.
pub struct RateSink {
    client: async_nats::Client,
    topic: String,
}

impl RateSink {
    /// Connect to the bus and create a sink for `topic`.
    pub async fn connect(url: &str, topic: impl Into<String>) -> Result<Self, SourceError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            topic: topic.into(),
        })
    }

    /// The output topic samples are published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish one sample.
    pub async fn publish(&self, sample: &FlowSample) {
        let payload = match serde_json::to_vec(sample) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to serialize sample");
                return;
            }
        };

        if let Err(e) = self.client.publish(self.topic.clone(), payload.into()).await {
            warn!(error = %e, topic = %self.topic, "failed to publish sample");
        }
    }
}

impl std::fmt::Debug for RateSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateSink").field("topic", &self.topic).finish()
    }
}
