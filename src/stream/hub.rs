//! Broadcast Hub
//!
//! Registry of open browser streams. Every connection gets a bounded frame
//! queue; the hub only ever `try_send`s into it, so registry operations never
//! wait on a browser.

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::frames::{encode_message, KEEPALIVE_FRAME, OPEN_FRAME};
use crate::broker::Message;
use crate::config::StreamConfig;

const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(10);

/// Unique identifier for a browser stream, increasing in registration order
pub type ConnectionId = u64;

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent streams
    pub max_connections: usize,
    /// Frames queued per stream before it counts as stalled
    pub connection_buffer: usize,
    /// Period of the keep-alive comment frame
    pub keepalive_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from(&StreamConfig::default())
    }
}

impl From<&StreamConfig> for HubConfig {
    fn from(config: &StreamConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            connection_buffer: config.connection_buffer,
            keepalive_interval: Duration::from_millis(config.keepalive_interval_ms),
        }
    }
}

/// Fans frames out to every registered browser stream
pub struct BroadcastHub {
    /// Active streams: ConnectionId → frame queue
    connections: Mutex<BTreeMap<ConnectionId, mpsc::Sender<Bytes>>>,
    next_id: AtomicU64,
    config: HubConfig,
}

/// Why a connection was dropped during delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    Closed,
    Stalled,
}

impl BroadcastHub {
    /// Create a new broadcast hub
    pub fn new(config: HubConfig) -> Self {
        Self {
            connections: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Register a new browser stream
    ///
    /// The returned [`Connection`] is live immediately and already holds the
    /// opening frame. Dropping it unregisters the stream.
    pub fn register(self: &Arc<Self>) -> Result<Connection, HubError> {
        // Room for the opening frame plus at least one event
        let (tx, rx) = mpsc::channel(self.config.connection_buffer.max(2));
        // Fresh queue, cannot be full or closed
        let _ = tx.try_send(Bytes::from_static(OPEN_FRAME));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut connections = self.connections.lock();
            if connections.len() >= self.config.max_connections {
                return Err(HubError::TooManyConnections(self.config.max_connections));
            }
            connections.insert(id, tx);
        }

        tracing::info!(connection_id = id, "Browser stream connected");
        Ok(Connection {
            id,
            frames: rx,
            hub: Arc::downgrade(self),
        })
    }

    /// Remove a stream from the registry
    ///
    /// Unknown or already removed ids are ignored. Returns whether anything
    /// was removed.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.lock().remove(&id).is_some();
        if removed {
            tracing::info!(connection_id = id, "Browser stream disconnected");
        }
        removed
    }

    /// Send a broker message to every registered stream
    ///
    /// Returns the number of streams the frame was queued on. Streams that
    /// are closed or stalled are removed; they never affect the others.
    pub fn broadcast(&self, message: &Message) -> usize {
        let frame = match encode_message(message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(topic = %message.topic, error = %e, "Failed to encode stream event");
                return 0;
            }
        };

        let delivered = self.deliver(frame);
        tracing::trace!(topic = %message.topic, streams = delivered, "Broadcast message");
        delivered
    }

    /// Send the keep-alive comment to every registered stream
    pub fn keepalive(&self) -> usize {
        self.deliver(Bytes::from_static(KEEPALIVE_FRAME))
    }

    /// Start the periodic keep-alive task
    ///
    /// The task ends on its own once the hub is dropped.
    pub fn start_keepalive(self: &Arc<Self>) -> JoinHandle<()> {
        let hub = Arc::downgrade(self);
        // `interval_at` panics on a zero period
        let period = self.config.keepalive_interval.max(MIN_KEEPALIVE_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(hub) = hub.upgrade() else {
                    break;
                };
                let streams = hub.keepalive();
                tracing::trace!(streams, "Sent keep-alive");
            }
        })
    }

    /// Drop every registered stream
    ///
    /// Each browser receives what is already queued and then sees its
    /// stream end. Used on shutdown so open responses can complete.
    pub fn close_all(&self) -> usize {
        let closed = std::mem::take(&mut *self.connections.lock());
        if !closed.is_empty() {
            tracing::info!(streams = closed.len(), "Closing browser streams");
        }
        closed.len()
    }

    /// Get the current connection count
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn deliver(&self, frame: Bytes) -> usize {
        let mut delivered = 0;
        let mut dropped = Vec::new();

        {
            let mut connections = self.connections.lock();
            connections.retain(|id, sender| match sender.try_send(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    dropped.push((*id, DropReason::Stalled));
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    dropped.push((*id, DropReason::Closed));
                    false
                }
            });
        }

        for (id, reason) in dropped {
            match reason {
                DropReason::Stalled => {
                    tracing::warn!(connection_id = id, "Browser stream stalled, dropping connection")
                }
                DropReason::Closed => {
                    tracing::info!(connection_id = id, "Browser stream disconnected")
                }
            }
        }

        delivered
    }
}

/// One registered browser stream
///
/// Owned by the HTTP layer for the lifetime of the response body; dropping it
/// (the browser went away) removes it from the hub.
pub struct Connection {
    id: ConnectionId,
    frames: mpsc::Receiver<Bytes>,
    hub: Weak<BroadcastHub>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait for the next frame; `None` once the hub has dropped this stream
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }

    /// Frames as a response body stream
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        stream::unfold(self, |mut connection| async move {
            let frame = connection.next_frame().await?;
            Some((Ok(frame), connection))
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

/// Errors that can occur in the broadcast hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),
}
