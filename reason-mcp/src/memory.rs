//! Episodic memory path resolution and the `memory_stats()` RPC (§6, §4.8).

use std::path::PathBuf;

use reason_memory::MemoryStore;
use serde::{Deserialize, Serialize};

use crate::error::McpError;

/// Default on-disk location for the episodic memory file, matching the
/// teacher's "one user-local path" convention (`neuron-state-fs`'s default
/// state directory) — `$XDG_DATA_HOME` (or the OS equivalent) joined with
/// the process name and `memory.json` (§6 "Persisted state").
fn default_memory_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("reasoning-tools")
        .join("memory.json")
}

/// Resolve the configured memory path: `REASONING_MEMORY_PATH` env override,
/// else the platform-local default.
#[must_use]
pub fn memory_path() -> PathBuf {
    std::env::var("REASONING_MEMORY_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_memory_path())
}

/// Open the process's episodic memory store at its resolved path (§4.8
/// "load-on-first-use per process").
///
/// # Errors
///
/// Propagates I/O errors other than "absent" or "corrupted" — both of
/// those are absorbed per §4.8 and never surfaced here.
pub async fn open_memory_store() -> Result<MemoryStore, McpError> {
    let path = memory_path();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| McpError::Transport(format!("creating memory directory: {e}")))?;
    }
    Ok(MemoryStore::open(path).await?)
}

/// `memory_stats()` result shape (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStatsResponse {
    /// Total episodes currently stored.
    pub total_episodes: usize,
    /// Episodes marked successful.
    pub successful_episodes: usize,
    /// Episodes marked unsuccessful.
    pub failed_episodes: usize,
    /// On-disk path of the memory file.
    pub memory_path: String,
}

/// Serve `memory_stats()` (§6).
pub async fn memory_stats(store: &MemoryStore) -> MemoryStatsResponse {
    let stats = store.stats().await;
    MemoryStatsResponse {
        total_episodes: stats.total_episodes,
        successful_episodes: stats.successful_episodes,
        failed_episodes: stats.failed_episodes,
        memory_path: stats.memory_path,
    }
}
