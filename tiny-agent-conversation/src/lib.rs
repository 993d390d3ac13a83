//! Append-only conversation history, optionally persisted to disk.
//!
//! Reuses the Memory Store's debounced, atomic (write-tmp then rename)
//! persistence pattern (itself grounded in `neuron-state-fs::FsStore`),
//! stripped of eviction and relevance scoring since history is a strict
//! append-only log rather than a scored working set.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tiny_agent_types::error::ConversationError;
use tiny_agent_types::Message;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

const DEBOUNCE: std::time::Duration = std::time::Duration::from_millis(500);
const FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ConversationFile {
    version: u32,
    timestamp: DateTime<Utc>,
    messages: Vec<Message>,
}

struct Inner {
    path: Option<PathBuf>,
    messages: RwLock<Vec<Message>>,
    generation: AtomicU64,
}

/// Handle to a conversation's history. Cheaply cloneable; clones share the
/// same underlying log and debounce state.
pub struct ConversationStore {
    inner: Arc<Inner>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ConversationStore {
    /// A store with no backing file — history lives only for the process
    /// lifetime.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// A store persisted to `path`, loaded lazily via
    /// [`ConversationStore::load_history`].
    #[must_use]
    pub fn at_path(path: PathBuf) -> Self {
        Self::new(Some(path))
    }

    fn new(path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                messages: RwLock::new(Vec::new()),
                generation: AtomicU64::new(0),
            }),
            pending: Mutex::new(None),
        }
    }

    /// Load history from disk, if a path was configured. Tolerates every
    /// malformed form — absent file, truncated JSON, version mismatch —
    /// by leaving the in-memory log empty rather than failing.
    pub async fn load_history(&self) -> Vec<Message> {
        let Some(path) = &self.inner.path else {
            return Vec::new();
        };
        let loaded = match tokio::fs::read_to_string(path).await {
            Ok(contents) => match serde_json::from_str::<ConversationFile>(&contents) {
                Ok(file) if file.version == FILE_VERSION => file.messages,
                Ok(_) => {
                    tracing::warn!(path = %path.display(), "conversation file version mismatch, starting empty");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "malformed conversation file, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read conversation file, starting empty");
                Vec::new()
            }
        };
        *self.inner.messages.write().await = loaded.clone();
        loaded
    }

    /// Append one message and schedule a debounced persist.
    pub async fn append(&self, message: Message) {
        self.inner.messages.write().await.push(message);
        self.schedule_persist().await;
    }

    /// Replace the entire history and schedule a debounced persist.
    pub async fn set_history(&self, messages: Vec<Message>) {
        *self.inner.messages.write().await = messages;
        self.schedule_persist().await;
    }

    /// Snapshot of the current history, in append order.
    pub async fn history(&self) -> Vec<Message> {
        self.inner.messages.read().await.clone()
    }

    /// Drop all history and schedule a debounced persist.
    pub async fn clear(&self) {
        self.inner.messages.write().await.clear();
        self.schedule_persist().await;
    }

    /// Number of messages currently held.
    pub async fn len(&self) -> usize {
        self.inner.messages.read().await.len()
    }

    /// Whether the history is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Await any pending debounced write, then write synchronously.
    pub async fn flush(&self) -> Result<(), ConversationError> {
        if let Some(handle) = self.pending.lock().await.take() {
            handle.abort();
        }
        persist(&self.inner).await
    }

    /// Flush and release the store.
    pub async fn close(&self) -> Result<(), ConversationError> {
        self.flush().await
    }

    async fn schedule_persist(&self) {
        if self.inner.path.is_none() {
            return;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE).await;
            if inner.generation.load(Ordering::SeqCst) == generation {
                if let Err(e) = persist(&inner).await {
                    tracing::warn!(error = %e, "debounced conversation persist failed");
                }
            }
        });
        *self.pending.lock().await = Some(handle);
    }
}

async fn persist(inner: &Inner) -> Result<(), ConversationError> {
    let Some(path) = &inner.path else {
        return Ok(());
    };
    let messages = inner.messages.read().await.clone();
    let file = ConversationFile {
        version: FILE_VERSION,
        timestamp: Utc::now(),
        messages,
    };
    let contents = serde_json::to_string_pretty(&file).unwrap_or_else(|_| "{}".to_string());
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_agent_types::ToolCall;

    #[tokio::test]
    async fn append_is_in_order() {
        let store = ConversationStore::in_memory();
        store.append(Message::user("hi")).await;
        store.append(Message::assistant("hello", vec![])).await;
        let history = store.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].content, "hello");
    }

    #[tokio::test]
    async fn set_history_replaces_log() {
        let store = ConversationStore::in_memory();
        store.append(Message::user("first")).await;
        store.set_history(vec![Message::user("replacement")]).await;
        let history = store.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "replacement");
    }

    #[tokio::test]
    async fn clear_empties_history() {
        let store = ConversationStore::in_memory();
        store.append(Message::user("hi")).await;
        store.clear().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn load_history_empty_when_no_path() {
        let store = ConversationStore::in_memory();
        assert!(store.load_history().await.is_empty());
    }

    #[tokio::test]
    async fn load_history_empty_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let store = ConversationStore::at_path(path);
        assert!(store.load_history().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_tolerated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversation.json");
        tokio::fs::write(&path, "{not valid json").await.unwrap();

        let store = ConversationStore::at_path(path);
        assert!(store.load_history().await.is_empty());
    }

    #[tokio::test]
    async fn persists_and_reloads_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversation.json");

        let store = ConversationStore::at_path(path.clone());
        store.load_history().await;
        store.append(Message::user("persisted turn")).await;
        let call = ToolCall {
            id: "tu_1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({}),
        };
        store.append(Message::assistant("", vec![call])).await;
        store.append(Message::tool_result("tu_1", "done")).await;
        store.flush().await.unwrap();

        let reloaded = ConversationStore::at_path(path);
        let history = reloaded.load_history().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "persisted turn");
    }

    #[tokio::test]
    async fn version_mismatch_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversation.json");
        tokio::fs::write(
            &path,
            serde_json::json!({"version": 99, "timestamp": Utc::now(), "messages": []}).to_string(),
        )
        .await
        .unwrap();

        let store = ConversationStore::at_path(path);
        assert!(store.load_history().await.is_empty());
    }
}
