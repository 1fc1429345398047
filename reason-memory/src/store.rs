//! On-disk episodic memory store (C9, §4.8).
//!
//! One JSON file at a configured path holding `{"episodes": [Episode, ...]}`.
//! Loading is lazy (load-on-first-use, §3 "Lifecycles"): [`MemoryStore::open`]
//! performs the load immediately, but callers typically construct one store
//! per process and share it behind an `Arc`, so in practice the load happens
//! once, the first time anything needs memory. A present-but-unparsable file
//! is renamed to a timestamped sidecar (never deleted) and treated as empty.

use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use crate::episode::Episode;
use crate::error::MemoryError;
use crate::similarity::{jaccard_similarity, normalize};

/// Number of most-recent episodes retained on every store (§4.8 "Retention",
/// §9 Open Questions: arbitrary, larger caps are fine).
pub const RETENTION_LIMIT: usize = 100;

/// Number of distinct reflections [`MemoryStore::past_lessons`] returns.
const MAX_LESSONS: usize = 3;

/// Similarity threshold above which two problem texts are considered the
/// "same problem" for lesson retrieval (§4.8 step 2).
const SIMILARITY_THRESHOLD: f64 = 0.5;

#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
struct FileSchema {
    episodes: Vec<Episode>,
}

/// Persistent store of past reflexion attempts, with similarity-based
/// lookup for cross-run learning.
pub struct MemoryStore {
    path: PathBuf,
    episodes: RwLock<Vec<Episode>>,
}

impl MemoryStore {
    /// Open (or create on first save) the store at `path`, loading any
    /// existing episodes now.
    ///
    /// # Errors
    ///
    /// Only I/O errors *other than* "file not found" and "unparsable JSON"
    /// propagate — those two cases are handled per §4.8 (empty start,
    /// corrupted-file rename) rather than surfaced as errors.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let path = path.into();
        let episodes = Self::load_or_recover(&path).await?;
        Ok(Self {
            path,
            episodes: RwLock::new(episodes),
        })
    }

    async fn load_or_recover(path: &Path) -> Result<Vec<Episode>, MemoryError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemoryError::Io(e.to_string())),
        };

        match serde_json::from_slice::<FileSchema>(&bytes) {
            Ok(schema) => Ok(schema.episodes),
            Err(parse_err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %parse_err,
                    "episodic memory file is corrupted, renaming to sidecar and starting empty"
                );
                let sidecar = corrupted_sidecar_path(path);
                tokio::fs::rename(path, &sidecar)
                    .await
                    .map_err(|e| MemoryError::Io(e.to_string()))?;
                Ok(Vec::new())
            }
        }
    }

    async fn rewrite(&self, episodes: &[Episode]) -> Result<(), MemoryError> {
        let schema = FileSchema {
            episodes: episodes.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&schema).map_err(|e| MemoryError::Io(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| MemoryError::Io(e.to_string()))?;
            }
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| MemoryError::Io(e.to_string()))
    }

    /// Persist a new episode: append, truncate to the most recent
    /// [`RETENTION_LIMIT`] (newest-first by timestamp collapses to "drop the
    /// oldest"), and rewrite the file (§4.8 "Retention").
    ///
    /// # Errors
    ///
    /// Propagates I/O errors writing the file.
    pub async fn store_episode(&self, episode: Episode) -> Result<(), MemoryError> {
        let mut guard = self.episodes.write().await;
        guard.push(episode);
        guard.sort_by_key(|e| e.timestamp);
        if guard.len() > RETENTION_LIMIT {
            let drop = guard.len() - RETENTION_LIMIT;
            guard.drain(0..drop);
        }
        self.rewrite(&guard).await
    }

    /// Look up reflections from past *failed* attempts on a similar problem
    /// (§4.8 "Lookup"):
    ///   1. normalize `problem` and compare against every stored episode's
    ///      `problem_hash` (exact match) or Jaccard similarity `>= 0.5`;
    ///   2. sort matches newest-first;
    ///   3. take the first 3 failed episodes' distinct reflections.
    pub async fn past_lessons(&self, problem: &str) -> Vec<String> {
        let query_hash = normalize(problem);
        let guard = self.episodes.read().await;

        let mut matches: Vec<&Episode> = guard
            .iter()
            .filter(|e| e.problem_hash == query_hash || jaccard_similarity(&e.problem, problem) >= SIMILARITY_THRESHOLD)
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut lessons = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for episode in matches {
            if episode.was_successful {
                continue;
            }
            let Some(reflection) = &episode.reflection else {
                continue;
            };
            if seen.insert(reflection.clone()) {
                lessons.push(reflection.clone());
            }
            if lessons.len() >= MAX_LESSONS {
                break;
            }
        }
        lessons
    }

    /// Summary stats over the currently stored episodes (§6 `memory_stats`).
    pub async fn stats(&self) -> MemoryStats {
        let guard = self.episodes.read().await;
        let successful = guard.iter().filter(|e| e.was_successful).count();
        MemoryStats {
            total_episodes: guard.len(),
            successful_episodes: successful,
            failed_episodes: guard.len() - successful,
            memory_path: self.path.display().to_string(),
        }
    }

    /// Snapshot every stored episode, oldest first. Test/debug use.
    pub async fn all_episodes(&self) -> Vec<Episode> {
        self.episodes.read().await.clone()
    }

    /// The configured file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn corrupted_sidecar_path(path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".corrupted.{stamp}"));
    PathBuf::from(name)
}

/// `memory_stats()` result shape (§6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemoryStats {
    /// Total episodes currently stored.
    pub total_episodes: usize,
    /// Episodes marked successful.
    pub successful_episodes: usize,
    /// Episodes marked unsuccessful.
    pub failed_episodes: usize,
    /// On-disk path of the memory file.
    pub memory_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(problem: &str, reflection: &str) -> Episode {
        Episode::new(problem, 1, vec![], "wrong answer", false, "test-provider").with_reflection(reflection)
    }

    #[tokio::test]
    async fn absent_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("mem.json")).await.unwrap();
        assert_eq!(store.stats().await.total_episodes, 0);
    }

    #[tokio::test]
    async fn round_trip_store_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.json");
        let store = MemoryStore::open(&path).await.unwrap();
        let ep = failed("sequence 2 6 12 20 30, ?", "look at differences of differences");
        let ep_id = ep.id.clone();
        store.store_episode(ep.clone()).await.unwrap();

        let reloaded = MemoryStore::open(&path).await.unwrap();
        let episodes = reloaded.all_episodes().await;
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].id, ep_id);
        assert_eq!(episodes[0].reflection, ep.reflection);
    }

    #[tokio::test]
    async fn corrupted_file_is_renamed_not_deleted_and_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.json");
        tokio::fs::write(&path, b"{\"episodes\":[BAD").await.unwrap();

        let store = MemoryStore::open(&path).await.unwrap();
        assert_eq!(store.stats().await.total_episodes, 0);

        let mut sidecars = Vec::new();
        let mut rd = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = rd.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.contains(".corrupted.") {
                sidecars.push(name);
            }
        }
        assert_eq!(sidecars.len(), 1);
        let sidecar_bytes = tokio::fs::read(dir.path().join(&sidecars[0])).await.unwrap();
        assert_eq!(sidecar_bytes, b"{\"episodes\":[BAD");
    }

    #[tokio::test]
    async fn retention_truncates_to_most_recent_100() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("mem.json")).await.unwrap();
        for i in 0..110 {
            let mut ep = failed(&format!("problem {i}"), "reflection");
            ep.timestamp = chrono::Utc::now() + chrono::Duration::milliseconds(i);
            store.store_episode(ep).await.unwrap();
        }
        let episodes = store.all_episodes().await;
        assert_eq!(episodes.len(), RETENTION_LIMIT);
        // Oldest surviving episode should be #10 (0..10 dropped).
        assert_eq!(episodes[0].problem, "problem 10");
    }

    #[tokio::test]
    async fn past_lessons_matches_exact_hash_and_returns_reflection_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("mem.json")).await.unwrap();
        store
            .store_episode(failed(
                "sequence 2, 6, 12, 20, 30, ?",
                "look at differences of differences",
            ))
            .await
            .unwrap();

        let lessons = store.past_lessons("sequence 2, 6, 12, 20, 30, ?").await;
        assert_eq!(lessons, vec!["look at differences of differences".to_string()]);
    }

    #[tokio::test]
    async fn past_lessons_matches_via_jaccard_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("mem.json")).await.unwrap();
        store
            .store_episode(failed("factor the number 2024 into primes", "try trial division by small primes"))
            .await
            .unwrap();

        let lessons = store.past_lessons("factor the number 2024 into its primes").await;
        assert_eq!(lessons, vec!["try trial division by small primes".to_string()]);
    }

    #[tokio::test]
    async fn past_lessons_excludes_successful_episodes() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("mem.json")).await.unwrap();
        let ok = Episode::new("2+2?", 1, vec![], "4", true, "test").with_reflection("n/a");
        store.store_episode(ok).await.unwrap();

        let lessons = store.past_lessons("2+2?").await;
        assert!(lessons.is_empty());
    }

    #[tokio::test]
    async fn past_lessons_caps_at_three_distinct_reflections() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("mem.json")).await.unwrap();
        for i in 0..5 {
            store
                .store_episode(failed("the same repeated problem text", &format!("reflection {i}")))
                .await
                .unwrap();
        }
        let lessons = store.past_lessons("the same repeated problem text").await;
        assert_eq!(lessons.len(), 3);
    }

    #[tokio::test]
    async fn stats_counts_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("mem.json")).await.unwrap();
        store.store_episode(failed("a", "r")).await.unwrap();
        store
            .store_episode(Episode::new("b", 1, vec![], "ans", true, "test"))
            .await
            .unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.total_episodes, 2);
        assert_eq!(stats.successful_episodes, 1);
        assert_eq!(stats.failed_episodes, 1);
    }
}
