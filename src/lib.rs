//! # Marquette
//!
//! A small web relay between an MQTT broker and browser dashboards.
//!
//! Every message received from the broker is remembered per topic and pushed
//! to all connected browsers over a Server-Sent Events stream. Browsers
//! publish back to the broker through plain HTTP POSTs, and the dashboard tile
//! layout is served from (and saved to) a JSON document.
//!
//! ## Modules
//!
//! - [`broker`]: MQTT session, subscriptions and publishing
//! - [`topics`]: Last-value cache per topic
//! - [`stream`]: Broadcast hub and the event stream endpoint
//! - [`relay`]: Wires inbound messages to the cache and the hub
//! - [`tiles`]: Persisted dashboard layout
//! - [`api`]: HTTP server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marquette::{AppState, BroadcastHub, BrokerLink, Config, Relay, TileStore, TopicCache};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!
//!     let tiles = Arc::new(TileStore::load(&config.tiles.path).await?);
//!     let hub = Arc::new(BroadcastHub::new((&config.stream).into()));
//!     let (link, inbound) = BrokerLink::new(&config.broker);
//!     let link = Arc::new(link);
//!
//!     let relay = Arc::new(Relay::new(Arc::new(TopicCache::new()), hub, link.clone()));
//!     relay.clone().run(inbound);
//!
//!     link.establish(&config.broker.subscriptions).await;
//!     marquette::serve(AppState::new(relay, tiles, config.ui)).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod broker;
pub mod config;
pub mod relay;
pub mod stream;
pub mod tiles;
pub mod topics;

pub use api::{build_router, serve, ApiError, AppState};

pub use broker::{BrokerError, BrokerLink, BrokerResult, Message, Publisher};

pub use config::{
    BrokerConfig, Config, ConfigError, LoggingConfig, StreamConfig, TilesConfig, UiConfig,
};

pub use relay::{Relay, RelayError};

pub use stream::{BroadcastHub, Connection, ConnectionId, HubConfig, HubError};

pub use tiles::{TileDefinition, TileError, TileKind, TileStore};

pub use topics::TopicCache;
