//! Message store.
//!
//! Uses DashMap for concurrent access. The in-memory maps are the source
//! of truth; when `data_dir` is configured, every mutation mirrors the
//! whole collection to a JSON file on disk (best effort — a failed write
//! is logged, never surfaced).

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::types::{AbandonedMessage, Message};

/// On-disk persistence format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedData {
    messages: Vec<Message>,
    #[serde(default)]
    abandoned: Vec<AbandonedMessage>,
}

/// Store for submitted messages and abandoned drafts.
///
/// Ids are creation-time milliseconds; a colliding id overwrites (last
/// write wins, matching the durability contract). Records are append-only
/// apart from delete — nothing is ever updated in place.
#[derive(Clone)]
pub struct MessageStore {
    /// id → submitted message.
    messages: Arc<DashMap<i64, Message>>,

    /// id → abandoned draft. Swept periodically by the cleanup task.
    abandoned: Arc<DashMap<i64, AbandonedMessage>>,

    /// Directory for persistence. None = in-memory only.
    data_dir: Option<PathBuf>,
}

impl MessageStore {
    /// Create a new store. Pass None for in-memory only.
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self {
            messages: Arc::new(DashMap::new()),
            abandoned: Arc::new(DashMap::new()),
            data_dir,
        }
    }

    // ── Persistence ───────────────────────────────────────────────────────

    fn data_file_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("messages.json"))
    }

    /// Load stored records from disk.
    ///
    /// Called once at startup. If the file doesn't exist or is corrupt,
    /// logs a warning and starts with an empty store. Returns the number
    /// of records loaded.
    pub fn load_from_disk(&self) -> usize {
        let path = match self.data_file_path() {
            Some(p) => p,
            None => {
                tracing::info!("No data_dir configured, running in-memory only");
                return 0;
            }
        };

        if !path.exists() {
            tracing::info!(path = %path.display(), "No existing message file, starting fresh");
            return 0;
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<PersistedData>(&contents) {
                Ok(data) => {
                    let count = data.messages.len() + data.abandoned.len();
                    for message in data.messages {
                        self.messages.insert(message.id, message);
                    }
                    for draft in data.abandoned {
                        self.abandoned.insert(draft.id, draft);
                    }
                    tracing::info!(
                        messages = self.messages.len(),
                        abandoned = self.abandoned.len(),
                        path = %path.display(),
                        "Message data loaded from disk"
                    );
                    count
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "Failed to parse message file, starting fresh"
                    );
                    0
                }
            },
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "Failed to read message file, starting fresh"
                );
                0
            }
        }
    }

    /// Persist current state to disk.
    ///
    /// Uses atomic write (write to temp file, then rename) to prevent
    /// corruption.
    fn persist_to_disk(&self) {
        let path = match self.data_file_path() {
            Some(p) => p,
            None => return, // No persistence configured
        };

        let data = PersistedData {
            messages: self.list_all(),
            abandoned: self.list_abandoned(),
        };

        let json = match serde_json::to_string_pretty(&data) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message data");
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::error!(error = %e, path = %parent.display(), "Failed to create data directory");
                return;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        match std::fs::write(&tmp_path, &json) {
            Ok(()) => {
                if let Err(e) = std::fs::rename(&tmp_path, &path) {
                    tracing::error!(error = %e, "Failed to rename temp file to messages.json");
                    let _ = std::fs::remove_file(&tmp_path);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to write message data temp file");
            }
        }
    }

    // ── Messages ──────────────────────────────────────────────────────────

    /// Append a submitted message.
    pub fn append(&self, message: Message) {
        tracing::info!(
            id = message.id,
            source = message.source.as_str(),
            location = message.location.as_str(),
            "Message stored"
        );
        self.messages.insert(message.id, message);
        self.persist_to_disk();
    }

    /// All submitted messages, id-ascending (ids are creation times, so
    /// this is storage order; callers re-sort by timestamp for display).
    pub fn list_all(&self) -> Vec<Message> {
        let mut messages: Vec<Message> =
            self.messages.iter().map(|r| r.value().clone()).collect();
        messages.sort_by_key(|m| m.id);
        messages
    }

    /// Remove at most one message. Returns false if the id was absent —
    /// which is not an error.
    pub fn delete_by_id(&self, id: i64) -> bool {
        let removed = self.messages.remove(&id).is_some();
        if removed {
            tracing::info!(id = id, "Message deleted");
            self.persist_to_disk();
        }
        removed
    }

    // ── Abandoned Drafts ──────────────────────────────────────────────────

    /// Append an abandoned draft.
    pub fn append_abandoned(&self, draft: AbandonedMessage) {
        tracing::info!(
            id = draft.id,
            reason = ?draft.reason,
            "Abandoned draft stored"
        );
        self.abandoned.insert(draft.id, draft);
        self.persist_to_disk();
    }

    /// All abandoned drafts, id-ascending.
    pub fn list_abandoned(&self) -> Vec<AbandonedMessage> {
        let mut drafts: Vec<AbandonedMessage> =
            self.abandoned.iter().map(|r| r.value().clone()).collect();
        drafts.sort_by_key(|d| d.id);
        drafts
    }

    /// Remove abandoned drafts created before `cutoff_ms` (ids are
    /// creation-time milliseconds). Called periodically by the cleanup
    /// task. Submitted messages are never swept.
    pub fn sweep_abandoned_before(&self, cutoff_ms: i64) -> usize {
        let expired: Vec<i64> = self
            .abandoned
            .iter()
            .filter(|r| r.id < cutoff_ms)
            .map(|r| *r.key())
            .collect();

        for id in &expired {
            self.abandoned.remove(id);
        }

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "Swept expired abandoned drafts");
            self.persist_to_disk();
        }
        expired.len()
    }

    // ── Stats ─────────────────────────────────────────────────────────────

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn abandoned_count(&self) -> usize {
        self.abandoned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Enrichment;
    use crate::message::types::AbandonReason;

    fn message(id: i64, content: &str) -> Message {
        Message::compose(
            id,
            "2025-01-01T00:00:00Z".to_string(),
            content,
            Enrichment::default(),
        )
    }

    fn draft(id: i64, partial: &str) -> AbandonedMessage {
        AbandonedMessage::compose(
            id,
            "2025-01-01T00:00:00Z".to_string(),
            partial,
            AbandonReason::PageExit,
            Enrichment::default(),
        )
    }

    #[test]
    fn test_append_and_list() {
        let store = MessageStore::new(None);
        store.append(message(2, "second"));
        store.append(message(1, "first"));

        let all = store.list_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message, "first");
        assert_eq!(all[1].message, "second");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MessageStore::new(None);
        store.append(message(1, "hello"));

        assert!(store.delete_by_id(1));
        assert!(store.list_all().is_empty());

        // Deleting a missing id is not an error
        assert!(!store.delete_by_id(1));
        assert!(!store.delete_by_id(999));
    }

    #[test]
    fn test_abandoned_tracked_separately() {
        let store = MessageStore::new(None);
        store.append(message(1, "sent"));
        store.append_abandoned(draft(2, "never sen"));

        assert_eq!(store.message_count(), 1);
        assert_eq!(store.abandoned_count(), 1);
        assert_eq!(store.list_all().len(), 1);
        assert_eq!(store.list_abandoned().len(), 1);
    }

    #[test]
    fn test_sweep_removes_only_old_drafts() {
        let store = MessageStore::new(None);
        store.append(message(100, "old but submitted"));
        store.append_abandoned(draft(100, "old draft"));
        store.append_abandoned(draft(5000, "fresh draft"));

        let swept = store.sweep_abandoned_before(1000);
        assert_eq!(swept, 1);
        assert_eq!(store.abandoned_count(), 1);
        assert_eq!(store.list_abandoned()[0].partial_message, "fresh draft");
        // Submitted messages are never swept
        assert_eq!(store.message_count(), 1);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let store = MessageStore::new(Some(path.clone()));
        store.append(message(1, "persisted"));
        store.append_abandoned(draft(2, "partial"));

        let reloaded = MessageStore::new(Some(path));
        assert_eq!(reloaded.load_from_disk(), 2);
        assert_eq!(reloaded.list_all()[0].message, "persisted");
        assert_eq!(reloaded.list_abandoned()[0].partial_message, "partial");
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("messages.json"), "not json {").unwrap();

        let store = MessageStore::new(Some(dir.path().to_path_buf()));
        assert_eq!(store.load_from_disk(), 0);
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn test_missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(Some(dir.path().to_path_buf()));
        assert_eq!(store.load_from_disk(), 0);
    }

    #[test]
    fn test_delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let store = MessageStore::new(Some(path.clone()));
        store.append(message(1, "a"));
        store.append(message(2, "b"));
        store.delete_by_id(1);

        let reloaded = MessageStore::new(Some(path));
        reloaded.load_from_disk();
        let all = reloaded.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, 2);
    }
}
