//! Tile Layout Store
//!
//! Dashboard tiles are small widgets bound to a topic: buttons publish a
//! fixed payload, text tiles show the topic's latest value. The ordered
//! collection is persisted as one JSON document and is always replaced
//! wholesale, never merged. Documents are served back with the keys they
//! were written with.
//!
//! # Example document
//!
//! The dashboard reads `name`, `topic` and `payload`:
//!
//! ```json
//! [
//!     { "type": "button", "name": "Lamp on", "row": 1, "col": 1,
//!       "topic": "lamp/cmd", "payload": "on" },
//!     { "type": "text", "name": "Temperature", "row": 1, "col": 2,
//!       "topic": "room/temp" }
//! ]
//! ```
//!
//! Tile editors may instead write `title`, `publish_topic`/`publish_payload`
//! and `subscribe_topic`; both spellings are understood.

mod error;
mod store;
mod types;

pub use error::{TileError, TileResult};
pub use store::TileStore;
pub use types::{TileDefinition, TileKind};
