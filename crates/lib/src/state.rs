//! Durable bot state (paused/active) keyed by deployment environment.
//!
//! The authoritative copy lives behind the [`ConfigStore`] trait; the router
//! keeps an in-memory mirror that is only used when a fetch fails. A state
//! mutation counts as committed only after the store write succeeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Pause state of the bot as gated decisions see it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotState {
    pub is_paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    /// Normalized sender id of the admin who paused the bot.
    pub paused_by: Option<String>,
}

/// One durable record, as the store returns it.
#[derive(Debug, Clone)]
pub struct BotStateRecord {
    pub environment: String,
    pub is_paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub paused_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BotStateRecord {
    pub fn state(&self) -> BotState {
        BotState {
            is_paused: self.is_paused,
            paused_at: self.paused_at,
            paused_by: self.paused_by.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
    #[error("state store rejected write: {0}")]
    Write(String),
}

/// Durable bot-state store, keyed by deployment environment.
///
/// Implementations must bound their own I/O (the router treats any returned
/// error as "use the cached state", never as a reason to hang).
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the record for `environment`; `None` when no record exists yet.
    async fn get_config(&self, environment: &str) -> Result<Option<BotStateRecord>, StateError>;

    /// Persist a new pause state. Must complete durably before returning Ok.
    async fn set_state(
        &self,
        environment: &str,
        is_paused: bool,
        paused_by: Option<&str>,
    ) -> Result<(), StateError>;
}

/// In-memory [`ConfigStore`]: backing for tests and the local REPL transport.
#[derive(Default)]
pub struct MemoryConfigStore {
    inner: Arc<RwLock<HashMap<String, BotStateRecord>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_config(&self, environment: &str) -> Result<Option<BotStateRecord>, StateError> {
        Ok(self.inner.read().await.get(environment).cloned())
    }

    async fn set_state(
        &self,
        environment: &str,
        is_paused: bool,
        paused_by: Option<&str>,
    ) -> Result<(), StateError> {
        let now = Utc::now();
        let mut g = self.inner.write().await;
        let record = g
            .entry(environment.to_string())
            .or_insert_with(|| BotStateRecord {
                environment: environment.to_string(),
                is_paused: false,
                paused_at: None,
                paused_by: None,
                created_at: now,
                updated_at: now,
            });
        record.is_paused = is_paused;
        record.paused_at = if is_paused { Some(now) } else { None };
        record.paused_by = if is_paused {
            paused_by.map(String::from)
        } else {
            None
        };
        record.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryConfigStore::new();
        assert!(store.get_config("development").await.unwrap().is_none());

        store
            .set_state("development", true, Some("5493518576432"))
            .await
            .unwrap();
        let record = store.get_config("development").await.unwrap().unwrap();
        assert!(record.is_paused);
        assert_eq!(record.paused_by.as_deref(), Some("5493518576432"));
        assert!(record.paused_at.is_some());

        store.set_state("development", false, None).await.unwrap();
        let record = store.get_config("development").await.unwrap().unwrap();
        assert!(!record.is_paused);
        assert!(record.paused_by.is_none());
        assert!(record.paused_at.is_none());
    }

    #[tokio::test]
    async fn environments_are_isolated() {
        let store = MemoryConfigStore::new();
        store.set_state("production", true, Some("1")).await.unwrap();
        assert!(store.get_config("development").await.unwrap().is_none());
    }
}
