//! Relay
//!
//! Glue between the broker link and the browsers. Inbound broker messages
//! update the topic cache and are then broadcast; browser publish requests
//! are validated and handed to the broker.

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broker::{BrokerError, Message, Publisher};
use crate::stream::BroadcastHub;
use crate::topics::TopicCache;

/// Errors returned to publish callers
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or malformed topic/payload
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Connects the broker link, the topic cache and the broadcast hub
#[derive(Clone)]
pub struct Relay {
    cache: Arc<TopicCache>,
    hub: Arc<BroadcastHub>,
    publisher: Arc<dyn Publisher>,
}

impl Relay {
    pub fn new(cache: Arc<TopicCache>, hub: Arc<BroadcastHub>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            cache,
            hub,
            publisher,
        }
    }

    /// Apply one inbound broker message
    ///
    /// The cache is updated before the broadcast, so a browser reacting to
    /// the event by reading the topic sees at least this value.
    pub async fn handle_inbound(&self, message: Message) -> usize {
        tracing::debug!(
            topic = %message.topic,
            bytes = message.payload.len(),
            "Received MQTT message"
        );

        self.cache.update(&message.topic, message.payload.clone()).await;
        self.hub.broadcast(&message)
    }

    /// Drain inbound broker messages in arrival order until the link closes
    pub fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<Message>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                self.handle_inbound(message).await;
            }
            tracing::debug!("Inbound channel closed, relay stopped");
        })
    }

    /// Publish a browser request to the broker
    pub async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), RelayError> {
        if topic.is_empty() {
            return Err(RelayError::InvalidRequest("Topic cannot be empty".to_string()));
        }
        if topic.contains(['+', '#']) {
            return Err(RelayError::InvalidRequest(format!(
                "Cannot publish to wildcard topic '{}'",
                topic
            )));
        }
        if payload.is_empty() {
            return Err(RelayError::InvalidRequest("Missing payload".to_string()));
        }

        tracing::info!(
            topic = %topic,
            payload = %String::from_utf8_lossy(&payload),
            "Publishing"
        );
        self.publisher.publish(topic, payload).await?;
        Ok(())
    }

    pub fn broker_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    pub fn cache(&self) -> &Arc<TopicCache> {
        &self.cache
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingPublisher;
    use super::*;
    use crate::stream::{HubConfig, OPEN_FRAME};
    use std::time::Duration;

    fn relay_with(publisher: Arc<RecordingPublisher>) -> Relay {
        Relay::new(
            Arc::new(TopicCache::new()),
            Arc::new(BroadcastHub::new(HubConfig::default())),
            publisher,
        )
    }

    #[tokio::test]
    async fn test_inbound_updates_cache_then_broadcasts() {
        let relay = relay_with(Arc::new(RecordingPublisher::default()));
        let mut connection = relay.hub().register().unwrap();
        assert_eq!(connection.next_frame().await.unwrap(), OPEN_FRAME);

        let delivered = relay.handle_inbound(Message::new("room/temp", "21.5")).await;
        assert_eq!(delivered, 1);

        assert_eq!(
            connection.next_frame().await.unwrap(),
            Bytes::from_static(b"data: {\"topic\":\"room/temp\",\"payload\":\"21.5\"}\n\n")
        );
        assert_eq!(
            relay.cache().get("room/temp").await,
            Some(Bytes::from_static(b"21.5"))
        );
    }

    #[tokio::test]
    async fn test_inbound_without_browsers_still_cached() {
        let relay = relay_with(Arc::new(RecordingPublisher::default()));

        assert_eq!(relay.handle_inbound(Message::new("door", "open")).await, 0);
        assert_eq!(relay.cache().get("door").await, Some(Bytes::from("open")));
    }

    #[tokio::test]
    async fn test_run_preserves_arrival_order() {
        let relay = Arc::new(relay_with(Arc::new(RecordingPublisher::default())));
        let mut connection = relay.hub().register().unwrap();
        connection.next_frame().await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        let task = Arc::clone(&relay).run(rx);

        for value in ["1", "2", "3"] {
            tx.send(Message::new("counter", value)).await.unwrap();
        }
        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();

        for value in ["1", "2", "3"] {
            let frame = connection.next_frame().await.unwrap();
            let expected = format!("data: {{\"topic\":\"counter\",\"payload\":\"{value}\"}}\n\n");
            assert_eq!(frame, Bytes::from(expected));
        }
        assert_eq!(relay.cache().get("counter").await, Some(Bytes::from("3")));
    }

    #[tokio::test]
    async fn test_publish_forwards_to_broker() {
        let publisher = Arc::new(RecordingPublisher::default());
        let relay = relay_with(Arc::clone(&publisher));

        relay.publish("lamp/cmd", Bytes::from("on")).await.unwrap();

        assert_eq!(
            publisher.published(),
            vec![("lamp/cmd".to_string(), Bytes::from("on"))]
        );
    }

    #[tokio::test]
    async fn test_publish_rejects_missing_payload() {
        let publisher = Arc::new(RecordingPublisher::default());
        let relay = relay_with(Arc::clone(&publisher));

        let err = relay.publish("lamp/cmd", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));

        let err = relay.publish("", Bytes::from("on")).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));

        let err = relay.publish("lamp/#", Bytes::from("on")).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));

        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_propagates_broker_failure() {
        let relay = relay_with(Arc::new(RecordingPublisher::offline()));

        let err = relay.publish("lamp/cmd", Bytes::from("on")).await.unwrap_err();
        assert!(matches!(err, RelayError::Broker(BrokerError::Publish { .. })));
        assert!(!relay.broker_connected());
    }
}
