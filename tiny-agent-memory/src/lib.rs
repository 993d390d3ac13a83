//! Persistent store of long-lived facts with relevance retrieval and
//! eviction.
//!
//! Mutations apply synchronously to an in-memory vector; persistence to
//! disk is debounced and atomic (write-tmp then rename), the same pattern
//! `neuron-state-fs::FsStore` uses for its own scope files. A malformed or
//! version-mismatched file is treated as empty rather than a fatal error.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tiny_agent_types::error::MemoryStoreError;
use tiny_agent_types::{Memory, MemoryCategory};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

const DEFAULT_MAX_MEMORIES: usize = 200;
const DEBOUNCE: std::time::Duration = std::time::Duration::from_millis(500);
const FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct MemoryFile {
    version: u32,
    updated_at: chrono::DateTime<Utc>,
    memories: Vec<Memory>,
}

struct Inner {
    path: Option<PathBuf>,
    memories: RwLock<Vec<Memory>>,
    max_memories: usize,
    generation: AtomicU64,
}

/// Handle to a memory store. Cheaply cloneable; clones share the same
/// underlying records and debounce state.
pub struct MemoryStore {
    inner: Arc<Inner>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStore {
    /// A store with no backing file — records live only for the process
    /// lifetime.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(None, DEFAULT_MAX_MEMORIES)
    }

    /// A store persisted to `path`, loaded lazily via [`MemoryStore::init`].
    #[must_use]
    pub fn at_path(path: PathBuf) -> Self {
        Self::new(Some(path), DEFAULT_MAX_MEMORIES)
    }

    /// A store persisted to `path` with a custom eviction cap.
    #[must_use]
    pub fn new(path: Option<PathBuf>, max_memories: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                memories: RwLock::new(Vec::new()),
                max_memories,
                generation: AtomicU64::new(0),
            }),
            pending: Mutex::new(None),
        }
    }

    /// Load persisted records from disk, if a path was configured. Absent
    /// or malformed files are treated as empty, never fatal.
    pub async fn init(&self) -> Result<(), MemoryStoreError> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => match serde_json::from_str::<MemoryFile>(&contents) {
                Ok(file) if file.version == FILE_VERSION => {
                    *self.inner.memories.write().await = file.memories;
                    Ok(())
                }
                Ok(_) => {
                    tracing::warn!(path = %path.display(), "memory file version mismatch, starting empty");
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "malformed memory file, starting empty");
                    Ok(())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MemoryStoreError::Io(e)),
        }
    }

    /// Append a new record and return it. Triggers eviction if the store
    /// now exceeds its cap.
    pub async fn add(&self, content: impl Into<String>, category: MemoryCategory) -> Memory {
        let now = Utc::now();
        let memory = Memory {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            category,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        };
        {
            let mut memories = self.inner.memories.write().await;
            memories.push(memory.clone());
            evict(&mut memories, self.inner.max_memories);
        }
        self.schedule_persist().await;
        memory
    }

    /// Fetch a record by id, touching its access bookkeeping.
    pub async fn get(&self, id: &str) -> Option<Memory> {
        let mut memories = self.inner.memories.write().await;
        let memory = memories.iter_mut().find(|m| m.id == id)?;
        memory.last_accessed_at = Utc::now();
        memory.access_count += 1;
        let snapshot = memory.clone();
        drop(memories);
        self.schedule_persist().await;
        Some(snapshot)
    }

    /// Delete a record, returning whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut memories = self.inner.memories.write().await;
            let before = memories.len();
            memories.retain(|m| m.id != id);
            memories.len() != before
        };
        if removed {
            self.schedule_persist().await;
        }
        removed
    }

    /// Drop every record.
    pub async fn clear(&self) {
        self.inner.memories.write().await.clear();
        self.schedule_persist().await;
    }

    /// Snapshot of every record, sorted by `last_accessed_at` descending.
    pub async fn list(&self) -> Vec<Memory> {
        let mut snapshot = self.inner.memories.read().await.clone();
        snapshot.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        snapshot
    }

    /// Records in the given category, sorted by `last_accessed_at` descending.
    pub async fn list_by_category(&self, category: MemoryCategory) -> Vec<Memory> {
        self.list()
            .await
            .into_iter()
            .filter(|m| m.category == category)
            .collect()
    }

    /// Up to `max` records relevant to `query`, scored by lower-cased
    /// token overlap weighted by category plus a small access boost, in
    /// descending score order. Records with non-positive score are
    /// excluded.
    pub async fn find_relevant(&self, query: &str, max: usize) -> Vec<Memory> {
        let query_tokens: std::collections::HashSet<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let memories = self.inner.memories.read().await.clone();
        let mut scored: Vec<(f64, Memory)> = memories
            .into_iter()
            .map(|m| {
                let score = relevance_score(&query_tokens, &m);
                (score, m)
            })
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(max).map(|(_, m)| m).collect()
    }

    /// Sum of estimated tokens across every stored record.
    pub async fn count_tokens(&self) -> usize {
        let counter = tiny_agent_tokens::TokenCounter::new();
        self.inner
            .memories
            .read()
            .await
            .iter()
            .map(|m| counter.estimate_str(&m.content))
            .sum()
    }

    /// Renders every stored record as a markdown section; empty string if
    /// there are none.
    pub async fn to_context_string(&self) -> String {
        let memories = self.list().await;
        if memories.is_empty() {
            return String::new();
        }
        let mut out = String::from("## Relevant Memories\n");
        for memory in &memories {
            out.push_str(&format!(
                "- [{}] {}\n",
                category_label(memory.category),
                memory.content
            ));
        }
        out
    }

    /// Await any pending debounced write, then write synchronously.
    pub async fn flush(&self) -> Result<(), MemoryStoreError> {
        if let Some(handle) = self.pending.lock().await.take() {
            handle.abort();
        }
        self.persist_now().await
    }

    /// Flush and release the store. Equivalent to [`MemoryStore::flush`];
    /// kept as a distinct method to mirror the shutdown-hook naming used
    /// elsewhere (MCP Manager's `disconnectAll`, Conversation Store).
    pub async fn close(&self) -> Result<(), MemoryStoreError> {
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
                    tracing::warn!(error = %e, "debounced memory persist failed");
                }
            }
        });
        *self.pending.lock().await = Some(handle);
    }

    async fn persist_now(&self) -> Result<(), MemoryStoreError> {
        persist(&self.inner).await
    }
}

async fn persist(inner: &Inner) -> Result<(), MemoryStoreError> {
    let Some(path) = &inner.path else {
        return Ok(());
    };
    let memories = inner.memories.read().await.clone();
    let file = MemoryFile {
        version: FILE_VERSION,
        updated_at: Utc::now(),
        memories,
    };
    let contents = serde_json::to_string_pretty(&file)
        .map_err(|e| MemoryStoreError::Malformed(e.to_string()))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

fn evict(memories: &mut Vec<Memory>, max_memories: usize) {
    if memories.len() <= max_memories {
        return;
    }
    // Best-kept-first: most recently accessed, then most accessed.
    memories.sort_by(|a, b| {
        b.last_accessed_at
            .cmp(&a.last_accessed_at)
            .then(b.access_count.cmp(&a.access_count))
    });
    memories.truncate(max_memories);
}

fn relevance_score(query_tokens: &std::collections::HashSet<String>, memory: &Memory) -> f64 {
    let content_tokens: std::collections::HashSet<String> = memory
        .content
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let overlap = query_tokens.intersection(&content_tokens).count() as f64;
    if overlap == 0.0 {
        return 0.0;
    }
    let access_boost = ((1.0 + memory.access_count as f64).ln()).max(0.0);
    overlap * memory.category.weight() + access_boost
}

fn category_label(category: MemoryCategory) -> &'static str {
    match category {
        MemoryCategory::User => "user",
        MemoryCategory::Project => "project",
        MemoryCategory::Codebase => "codebase",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_list_roundtrip() {
        let store = MemoryStore::in_memory();
        store.add("likes rust", MemoryCategory::User).await;
        let list = store.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].content, "likes rust");
        assert_eq!(list[0].access_count, 0);
    }

    #[tokio::test]
    async fn get_touches_access_bookkeeping() {
        let store = MemoryStore::in_memory();
        let memory = store.add("fact", MemoryCategory::Project).await;
        let fetched = store.get(&memory.id).await.unwrap();
        assert_eq!(fetched.access_count, 1);
        assert!(fetched.last_accessed_at >= fetched.created_at);
    }

    #[tokio::test]
    async fn remove_reports_existence() {
        let store = MemoryStore::in_memory();
        let memory = store.add("temp", MemoryCategory::User).await;
        assert!(store.remove(&memory.id).await);
        assert!(!store.remove(&memory.id).await);
    }

    #[tokio::test]
    async fn eviction_keeps_cap() {
        let store = MemoryStore::new(None, 2);
        store.add("a", MemoryCategory::User).await;
        store.add("b", MemoryCategory::User).await;
        store.add("c", MemoryCategory::User).await;
        assert_eq!(store.list().await.len(), 2);
    }

    #[tokio::test]
    async fn find_relevant_weights_categories() {
        let store = MemoryStore::in_memory();
        store.add("rust project conventions", MemoryCategory::Project).await;
        store.add("rust user preference", MemoryCategory::User).await;
        let results = store.find_relevant("rust", 10).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].category, MemoryCategory::Project);
    }

    #[tokio::test]
    async fn find_relevant_excludes_zero_overlap() {
        let store = MemoryStore::in_memory();
        store.add("completely unrelated", MemoryCategory::User).await;
        let results = store.find_relevant("rust", 10).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn to_context_string_empty_when_no_memories() {
        let store = MemoryStore::in_memory();
        assert_eq!(store.to_context_string().await, "");
    }

    #[tokio::test]
    async fn to_context_string_renders_markdown_section() {
        let store = MemoryStore::in_memory();
        store.add("likes tabs", MemoryCategory::User).await;
        let rendered = store.to_context_string().await;
        assert!(rendered.starts_with("## Relevant Memories\n"));
        assert!(rendered.contains("[user] likes tabs"));
    }

    #[tokio::test]
    async fn persists_and_reloads_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let store = MemoryStore::at_path(path.clone());
        store.init().await.unwrap();
        store.add("persisted fact", MemoryCategory::Codebase).await;
        store.flush().await.unwrap();

        let reloaded = MemoryStore::at_path(path);
        reloaded.init().await.unwrap();
        let list = reloaded.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].content, "persisted fact");
    }

    #[tokio::test]
    async fn malformed_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = MemoryStore::at_path(path);
        store.init().await.unwrap();
        assert!(store.list().await.is_empty());
    }
}
