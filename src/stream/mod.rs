//! Browser Event Stream
//!
//! Pushes broker messages to every connected dashboard over Server-Sent Events.
//!
//! ## Architecture
//!
//! - **BroadcastHub**: Registry of open streams, fan-out and keep-alive
//! - **Handler**: `GET /update-stream`, turns a registered connection into a response body
//! - **Frames**: The `text/event-stream` wire format
//!
//! Each connection has its own bounded frame queue, so a slow browser only ever
//! stalls itself. A browser whose queue is full or closed is dropped from the
//! registry and is expected to reconnect.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const source = new EventSource('/update-stream');
//!
//! source.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log(msg.topic, msg.payload);
//! };
//! ```

mod frames;
mod handler;
mod hub;

pub use frames::{encode_message, KEEPALIVE_FRAME, OPEN_FRAME};
pub use handler::stream_handler;
pub use hub::{BroadcastHub, Connection, ConnectionId, HubConfig, HubError};
