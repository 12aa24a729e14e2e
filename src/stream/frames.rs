//! Event Stream Frames
//!
//! Wire format written to browsers:
//!
//! ```text
//! :\n                                           opening comment, flushes headers
//! data: {"topic":"room/temp","payload":"21.5"}\n\n
//! : ping\n\n                                    keep-alive, ignored by EventSource
//! ```

use bytes::Bytes;
use serde::Serialize;
use std::borrow::Cow;

use crate::broker::Message;

/// First bytes written on every new stream
pub const OPEN_FRAME: &[u8] = b":\n";

/// Comment frame sent on the keep-alive interval
pub const KEEPALIVE_FRAME: &[u8] = b": ping\n\n";

/// JSON body of a `data:` frame
#[derive(Debug, Serialize)]
struct StreamEvent<'a> {
    topic: &'a str,
    payload: Cow<'a, str>,
}

/// Encode a broker message as a `data:` frame
pub fn encode_message(message: &Message) -> Result<Bytes, serde_json::Error> {
    let event = StreamEvent {
        topic: &message.topic,
        payload: message.payload_text(),
    };

    let json = serde_json::to_vec(&event)?;
    let mut frame = Vec::with_capacity(json.len() + 8);
    frame.extend_from_slice(b"data: ");
    frame.extend_from_slice(&json);
    frame.extend_from_slice(b"\n\n");
    Ok(Bytes::from(frame))
}
