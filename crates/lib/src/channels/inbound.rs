//! Inbound message from the transport: delivered to the debouncer and, once a
//! turn is assembled, to the router.

use chrono::{DateTime, Utc};

/// One message as received from the transport. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Sender identifier as the transport reports it (e.g. a phone number).
    pub sender_id: String,
    pub body: String,
    /// Message kind as reported by the transport ("text", "image", ...).
    pub kind: String,
    /// Reference to attached media, when the transport provides one.
    pub media_url: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Plain text message with the current timestamp.
    pub fn text(sender_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            body: body.into(),
            kind: "text".to_string(),
            media_url: None,
            received_at: Utc::now(),
        }
    }
}
