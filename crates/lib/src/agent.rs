//! Agent turn: build the prompt, run the bounded tool-calling protocol, and
//! return the final user-facing text.
//!
//! At most two model calls per turn and at most one tool invocation: the
//! first call offers the tool catalog; if the model calls a tool, only the
//! first call is honored, its result is fed back, and a second call (no
//! tools) produces the reply. A sentinel tool result short-circuits with a
//! generic failure message and no second call. Nothing in here propagates an
//! error to the caller: every failure becomes a fixed apology.

use crate::catalog::{CatalogClient, CatalogError};
use crate::history::{format_history, HistoryEntry, HistoryError, HistoryStore};
use crate::llm::{ChatBackend, ChatMessage, LlmError};
use crate::prompt::build_system_prompt;
use crate::tools::{is_error_sentinel, sentinel, ToolRegistry};
use std::sync::Arc;

/// Reply when a tool invocation failed: generic and non-technical by design.
pub const TOOL_FAILURE_REPLY: &str = "Lo siento, estoy teniendo problemas técnicos en este \
momento. Por favor, intenta de nuevo en unos minutos.";

/// Reply when anything else inside the turn fails.
pub const AGENT_APOLOGY: &str = "En este momento tengo dificultades para procesar tu solicitud. \
Por favor, intenta de nuevo en unos minutos.";

#[derive(Debug, thiserror::Error)]
enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Produces one final reply per conversation turn.
pub struct AgentOrchestrator<B: ChatBackend> {
    backend: B,
    model: String,
    catalog: Arc<CatalogClient>,
    registry: ToolRegistry,
    history: Arc<dyn HistoryStore>,
}

impl<B: ChatBackend> AgentOrchestrator<B> {
    pub fn new(
        backend: B,
        model: impl Into<String>,
        catalog: Arc<CatalogClient>,
        registry: ToolRegistry,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            catalog,
            registry,
            history,
        }
    }

    /// Run one turn. Never fails: internal errors are logged and surface as
    /// the fixed apology text.
    pub async fn reply(&self, sender_id: &str, turn_text: &str) -> String {
        match self.run_turn(sender_id, turn_text).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("agent: turn failed for {}: {}", sender_id, e);
                AGENT_APOLOGY.to_string()
            }
        }
    }

    async fn run_turn(&self, sender_id: &str, turn_text: &str) -> Result<String, AgentError> {
        let context = self.catalog.product_context().await?;
        let prior = format_history(self.history.get(sender_id).await?);

        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.push(ChatMessage::system(build_system_prompt(&context)));
        messages.extend(prior.into_iter().map(|e| ChatMessage {
            role: e.role,
            content: e.content,
            tool_calls: None,
            tool_call_id: None,
        }));
        messages.push(ChatMessage::user(turn_text));

        let first = self
            .backend
            .chat(&self.model, messages.clone(), Some(self.registry.definitions()))
            .await?;

        let reply = if first.tool_calls().is_empty() {
            first.content().to_string()
        } else {
            let calls = first.tool_calls();
            if calls.len() > 1 {
                log::debug!("agent: model returned {} tool calls, honoring the first", calls.len());
            }
            let call = calls[0].clone();
            let name = call.function.name.as_str();

            let result = match self.registry.handler(name) {
                None => {
                    log::warn!("agent: model called unknown tool {}", name);
                    sentinel(format!("herramienta desconocida: {}", name))
                }
                Some(handler) => match call.function.parsed_arguments() {
                    Err(e) => {
                        log::warn!("agent: bad arguments for tool {}: {}", name, e);
                        sentinel(e)
                    }
                    Ok(args) => {
                        log::info!("agent: invoking tool {} for {}", name, sender_id);
                        handler.call(&args).await
                    }
                },
            };

            if is_error_sentinel(&result) {
                log::warn!("agent: tool {} returned sentinel, skipping second call", name);
                TOOL_FAILURE_REPLY.to_string()
            } else {
                let assistant = first.message().cloned().ok_or(LlmError::Empty)?;
                messages.push(assistant);
                messages.push(ChatMessage::tool_result(call.id.clone(), result));
                let second = self.backend.chat(&self.model, messages, None).await?;
                second.content().to_string()
            }
        };

        // The reply already exists; a history write failure must not turn a
        // good turn into an apology.
        if let Err(e) = self
            .history
            .append(
                sender_id,
                vec![
                    HistoryEntry::user(turn_text),
                    HistoryEntry::assistant(reply.clone()),
                ],
            )
            .await
        {
            log::warn!("agent: history append failed for {}: {}", sender_id, e);
        }

        Ok(reply)
    }
}
