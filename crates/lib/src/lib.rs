//! Tiendita core library — message debouncing, conversation routing, and the
//! tool-calling sales agent, shared by the CLI and any transport adapter.

pub mod agent;
pub mod catalog;
pub mod channels;
pub mod config;
pub mod debounce;
pub mod history;
pub mod init;
pub mod llm;
pub mod prompt;
pub mod router;
pub mod service;
pub mod state;
pub mod tools;
