//! Outbound delivery seam.

use async_trait::async_trait;

/// Sends a text reply back to a sender over the transport.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    /// Deliver `text` to `sender_id`. Delivery failures are returned as a
    /// message; the caller logs them (a lost reply is not retried).
    async fn send(&self, sender_id: &str, text: &str) -> Result<(), String>;
}
