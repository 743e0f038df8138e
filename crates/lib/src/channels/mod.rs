//! Transport seam: inbound messages from the chat provider, outbound replies
//! through an [`OutboundSender`]. The provider itself (WhatsApp, a REPL, ...)
//! lives outside this crate.

mod inbound;
mod outbound;

pub use inbound::InboundMessage;
pub use outbound::OutboundSender;
