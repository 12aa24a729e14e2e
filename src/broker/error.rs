//! Broker link error types
//!
//! All of these are potentially transient; the link recovers from dropped
//! sessions on its own and only reports conditions the caller can act on.

use thiserror::Error;

/// Errors that can occur in the broker link
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The broker refused the session or did not answer in time
    #[error("Failed to connect to broker at {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// `connect` was called on a link that already has a session
    #[error("Broker link is already connected")]
    AlreadyConnected,

    /// Subscription could not be issued
    #[error("Subscribe failed for '{filter}': {reason}")]
    Subscribe { filter: String, reason: String },

    /// No local session to publish on
    #[error("Publish failed for '{topic}': {reason}")]
    Publish { topic: String, reason: String },
}

/// Result type alias for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrokerError::Connect {
            addr: "127.0.0.1:1883".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to connect to broker at 127.0.0.1:1883: connection refused"
        );

        let err = BrokerError::Publish {
            topic: "lamp/cmd".to_string(),
            reason: "not connected".to_string(),
        };
        assert_eq!(err.to_string(), "Publish failed for 'lamp/cmd': not connected");
    }
}
