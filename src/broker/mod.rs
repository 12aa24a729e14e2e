//! MQTT Broker Link
//!
//! Maintains the single session to the MQTT broker:
//!
//! - **link**: connection, subscriptions, reconnect policy and the event loop task
//! - **message**: the immutable `(topic, payload)` pair relayed to browsers
//! - **error**: broker-layer error types
//!
//! # Architecture
//!
//! ```text
//! Inbound:
//!   Broker → EventLoop task → mpsc channel → Relay
//!
//! Outbound:
//!   Relay → Publisher::publish → AsyncClient → Broker
//! ```
//!
//! The event loop task owns the transport. When the session drops it waits
//! `reconnect_interval_ms` and tries again, forever, re-issuing every recorded
//! subscription once the broker acknowledges the new session.

mod error;
mod link;
mod message;

pub use error::{BrokerError, BrokerResult};
pub use link::BrokerLink;
pub use message::Message;

use async_trait::async_trait;
use bytes::Bytes;

/// Outbound half of the broker link
///
/// The relay only ever publishes through this trait, which keeps the raw
/// transport private to [`BrokerLink`].
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `topic`. Best-effort: success means the message
    /// was handed to the session, not that the broker received it.
    async fn publish(&self, topic: &str, payload: Bytes) -> BrokerResult<()>;

    /// Whether a broker session is currently established
    fn is_connected(&self) -> bool;
}
