//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::UiConfig;
use crate::relay::Relay;
use crate::stream::BroadcastHub;
use crate::tiles::TileStore;
use crate::topics::TopicCache;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Broker ⇄ browser relay (owns the topic cache and broadcast hub handles)
    pub relay: Arc<Relay>,
    /// Dashboard tile layout
    pub tiles: Arc<TileStore>,
    /// HTTP server configuration
    pub config: Arc<UiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(relay: Arc<Relay>, tiles: Arc<TileStore>, config: UiConfig) -> Self {
        Self {
            relay,
            tiles,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn cache(&self) -> &Arc<TopicCache> {
        self.relay.cache()
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        self.relay.hub()
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
