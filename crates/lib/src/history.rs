//! Conversation history: canonical role/content entries, the multi-shape
//! decoder for stored history, and the store seam.
//!
//! Stored history arrives in one of three shapes: already-canonical entries,
//! a single JSON blob encoding the whole sequence, or a list of legacy JSON
//! fragments (each a record, or a one-element array wrapping one). The
//! decoder handles each shape explicitly; fragments that fail to parse are
//! logged and skipped, never aborting the whole turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One canonical history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Stored history in whichever shape the store kept it.
#[derive(Debug, Clone)]
pub enum RawHistory {
    /// Already-canonical ordered entries.
    Entries(Vec<HistoryEntry>),
    /// A single JSON-encoded array of entries.
    Json(String),
    /// Legacy fragments: each is JSON for one entry, or a one-element array
    /// containing one entry.
    Fragments(Vec<String>),
}

/// Decode stored history into canonical ordered entries.
pub fn format_history(raw: RawHistory) -> Vec<HistoryEntry> {
    match raw {
        RawHistory::Entries(entries) => entries,
        RawHistory::Json(blob) => match serde_json::from_str::<Vec<HistoryEntry>>(&blob) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("history: discarding undecodable JSON history: {}", e);
                Vec::new()
            }
        },
        RawHistory::Fragments(fragments) => fragments
            .iter()
            .filter_map(|f| match decode_fragment(f) {
                Some(entry) => Some(entry),
                None => {
                    log::warn!("history: skipping undecodable fragment: {:.80}", f);
                    None
                }
            })
            .collect(),
    }
}

/// One legacy fragment: `{role, content}` or `[{role, content}]`.
fn decode_fragment(fragment: &str) -> Option<HistoryEntry> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Fragment {
        Entry(HistoryEntry),
        Wrapped([HistoryEntry; 1]),
    }

    match serde_json::from_str::<Fragment>(fragment).ok()? {
        Fragment::Entry(e) => Some(e),
        Fragment::Wrapped([e]) => Some(e),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// Durable per-sender history store.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stored history for a sender; empty entries when none.
    async fn get(&self, sender_id: &str) -> Result<RawHistory, HistoryError>;

    /// Append entries to a sender's history in order.
    async fn append(&self, sender_id: &str, entries: Vec<HistoryEntry>) -> Result<(), HistoryError>;
}

/// In-memory [`HistoryStore`] for tests and the local REPL transport.
#[derive(Default)]
pub struct MemoryHistoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<HistoryEntry>>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn get(&self, sender_id: &str) -> Result<RawHistory, HistoryError> {
        let g = self.inner.read().await;
        Ok(RawHistory::Entries(
            g.get(sender_id).cloned().unwrap_or_default(),
        ))
    }

    async fn append(
        &self,
        sender_id: &str,
        entries: Vec<HistoryEntry>,
    ) -> Result<(), HistoryError> {
        let mut g = self.inner.write().await;
        g.entry(sender_id.to_string()).or_default().extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_entries_round_trip_unchanged() {
        let entries = vec![
            HistoryEntry::user("busco camisetas"),
            HistoryEntry::assistant("Tenemos varias, ¿qué color?"),
        ];
        assert_eq!(format_history(RawHistory::Entries(entries.clone())), entries);
    }

    #[test]
    fn json_blob_decodes_in_order() {
        let blob = r#"[{"role":"user","content":"a"},{"role":"assistant","content":"b"}]"#;
        let out = format_history(RawHistory::Json(blob.to_string()));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], HistoryEntry::user("a"));
        assert_eq!(out[1], HistoryEntry::assistant("b"));
    }

    #[test]
    fn undecodable_json_blob_yields_empty() {
        assert!(format_history(RawHistory::Json("not json".to_string())).is_empty());
    }

    #[test]
    fn fragment_list_skips_only_the_malformed_entry() {
        let fragments = vec![
            r#"{"role":"user","content":"uno"}"#.to_string(),
            "{broken".to_string(),
            r#"[{"role":"assistant","content":"dos"}]"#.to_string(),
        ];
        let out = format_history(RawHistory::Fragments(fragments));
        assert_eq!(
            out,
            vec![HistoryEntry::user("uno"), HistoryEntry::assistant("dos")]
        );
    }

    #[test]
    fn nested_multi_element_fragment_is_rejected() {
        let fragments = vec![
            r#"[{"role":"user","content":"a"},{"role":"user","content":"b"}]"#.to_string(),
        ];
        assert!(format_history(RawHistory::Fragments(fragments)).is_empty());
    }

    #[tokio::test]
    async fn memory_store_appends_in_order() {
        let store = MemoryHistoryStore::new();
        store
            .append("u1", vec![HistoryEntry::user("hola")])
            .await
            .unwrap();
        store
            .append("u1", vec![HistoryEntry::assistant("buenas")])
            .await
            .unwrap();
        let out = format_history(store.get("u1").await.unwrap());
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].role, "assistant");
    }
}
