//! Wires the pipeline together: transport → debouncer → router → transport.
//!
//! The service is the debouncer's registered consumer; immediate-dispatch
//! messages (greetings) skip the buffer and go through the same routing path
//! as a one-message turn.

use crate::channels::{InboundMessage, OutboundSender};
use crate::debounce::{MessageDebouncer, TurnConsumer};
use crate::llm::ChatBackend;
use crate::router::{ConversationRouter, ConversationTurn, RouteOutcome};
use async_trait::async_trait;
use std::sync::Arc;

/// Message pipeline for one deployment.
pub struct BotService<B: ChatBackend> {
    debouncer: MessageDebouncer,
    router: Arc<ConversationRouter<B>>,
    outbound: Arc<dyn OutboundSender>,
}

impl<B: ChatBackend + 'static> BotService<B> {
    /// Build the service and register it as the debouncer's consumer.
    pub fn start(
        debouncer: MessageDebouncer,
        router: Arc<ConversationRouter<B>>,
        outbound: Arc<dyn OutboundSender>,
    ) -> Arc<Self> {
        let service = Arc::new(Self {
            debouncer,
            router,
            outbound,
        });
        service
            .debouncer
            .set_consumer(service.clone() as Arc<dyn TurnConsumer>);
        service
    }

    /// Entry point for every message the transport delivers.
    pub async fn handle_inbound(&self, message: InboundMessage) {
        self.router.record_message();
        let buffered = self.debouncer.admit(message.clone()).await;
        if !buffered {
            // Immediate dispatch: a one-message turn, same routing contract.
            let turn = ConversationTurn {
                sender_id: message.sender_id.clone(),
                combined_text: message.body.clone(),
                messages: vec![message],
            };
            if let Err(e) = self.dispatch(&turn).await {
                log::error!("service: reply delivery failed for {}: {}", turn.sender_id, e);
            }
        }
    }

    async fn dispatch(&self, turn: &ConversationTurn) -> Result<(), String> {
        match self.router.route(turn).await {
            RouteOutcome::Reply(text) => self.outbound.send(&turn.sender_id, &text).await,
            RouteOutcome::Dropped => Ok(()),
        }
    }
}

#[async_trait]
impl<B: ChatBackend + 'static> TurnConsumer for BotService<B> {
    async fn on_turn(
        &self,
        sender_id: &str,
        messages: Vec<InboundMessage>,
        combined_text: String,
    ) -> Result<(), String> {
        let turn = ConversationTurn {
            sender_id: sender_id.to_string(),
            combined_text,
            messages,
        };
        // A delivery failure surfaces to the debouncer, which logs the lost
        // turn; there is no retry.
        self.dispatch(&turn).await
    }
}
