//! LLM abstraction and the OpenAI-compatible chat-completions client.
//!
//! The agent is generic over [`ChatBackend`] so tests can drive the
//! tool-calling protocol with a scripted backend and count calls.

mod openai;

pub use openai::{
    ChatChoice, ChatMessage, ChatResponse, LlmError, OpenAiClient, ToolCall, ToolCallFunction,
    ToolDefinition, ToolFunctionDefinition,
};

use async_trait::async_trait;

/// Chat completion backend: one request, one response, optional tool catalog.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `messages` (and the tool catalog, when offered) to the model.
    /// Tool choice is automatic whenever tools are present.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse, LlmError>;
}
