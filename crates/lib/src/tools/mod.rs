//! Tool registry: tool name -> schema offered to the model + async handler.
//!
//! Handlers normalize every downstream failure into the `Error:` sentinel
//! string, so the orchestrator can short-circuit on failure without knowing
//! the shape of catalog errors.

mod catalog;

pub use catalog::default_registry;

use crate::llm::ToolDefinition;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

/// Fixed marker for tool failures, recognized by the orchestrator and by the
/// model's error-handling rules.
pub const ERROR_SENTINEL: &str = "Error:";

/// True when a tool result carries the failure marker.
pub fn is_error_sentinel(result: &str) -> bool {
    result.trim_start().starts_with(ERROR_SENTINEL)
}

/// Build a sentinel result from any failure detail.
pub fn sentinel(detail: impl Display) -> String {
    format!("{} {}", ERROR_SENTINEL, detail)
}

/// One callable tool. `call` never fails: failures come back as sentinel
/// strings.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: &serde_json::Value) -> String;
}

/// Static mapping from tool name to schema + handler.
#[derive(Default)]
pub struct ToolRegistry {
    /// Definition order is preserved: it is the order offered to the model.
    entries: Vec<ToolDefinition>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A re-registered name replaces the old handler.
    pub fn register(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        let name = definition.function.name.clone();
        self.entries.retain(|d| d.function.name != name);
        self.entries.push(definition);
        self.handlers.insert(name, handler);
    }

    /// Tool catalog for the model request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.clone()
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}
