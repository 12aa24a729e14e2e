//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON body of `POST /topics/*topic`
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    /// Strings are published verbatim, other JSON values in their JSON text form
    #[serde(default)]
    pub payload: Option<Value>,
}

impl PublishRequest {
    pub fn into_payload(self) -> String {
        match self.payload {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// "connected" or "disconnected"
    pub broker: String,
    /// Open browser streams
    pub connections: usize,
    /// Topics with a cached value
    pub topics: usize,
    /// Tiles in the current layout
    pub tiles: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
