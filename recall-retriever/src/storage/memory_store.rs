//! In-memory [`IndexStore`] for tests and throwaway sessions.
//!
//! Entries live in a `Vec` in insertion order behind a `tokio::sync::RwLock`;
//! query is the same brute-force cosine ranking the SQLite store uses.

use super::{FileFingerprint, FingerprintStore, IndexEntry, ScoredEntry, VectorStore, rank};
use anyhow::Result;
use async_trait::async_trait;
use half::f16;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<Vec<IndexEntry>>,
    fingerprints: RwLock<HashMap<String, FileFingerprint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries stored for one source file, in insertion order
    pub async fn entries_for(&self, source_path: &str) -> Vec<IndexEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.source_path == source_path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut stored = self.entries.write().await;
        for entry in entries {
            match stored.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => stored.push(entry),
            }
        }
        Ok(())
    }

    async fn delete_by_source(&self, source_path: &str) -> Result<usize> {
        let mut stored = self.entries.write().await;
        let before = stored.len();
        stored.retain(|e| e.source_path != source_path);
        Ok(before - stored.len())
    }

    async fn query(&self, vector: &[f16], limit: usize) -> Result<Vec<ScoredEntry>> {
        let stored = self.entries.read().await;
        Ok(rank(stored.iter().cloned(), vector, limit))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[async_trait]
impl FingerprintStore for InMemoryStore {
    async fn fingerprint(&self, path: &str) -> Result<Option<FileFingerprint>> {
        Ok(self.fingerprints.read().await.get(path).cloned())
    }

    async fn record_fingerprint(&self, fingerprint: FileFingerprint) -> Result<()> {
        self.fingerprints
            .write()
            .await
            .insert(fingerprint.path.clone(), fingerprint);
        Ok(())
    }

    async fn forget_fingerprint(&self, path: &str) -> Result<()> {
        self.fingerprints.write().await.remove(path);
        Ok(())
    }

    async fn tracked_files(&self) -> Result<usize> {
        Ok(self.fingerprints.read().await.len())
    }

    async fn clear_fingerprints(&self) -> Result<()> {
        self.fingerprints.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::chunk_id;

    fn entry(path: &str, idx: usize, text: &str) -> IndexEntry {
        IndexEntry {
            id: chunk_id(path, idx),
            source_path: path.to_string(),
            filename: "f.txt".to_string(),
            chunk_idx: idx,
            text: text.to_string(),
            embedding: vec![f16::from_f32(1.0)],
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .upsert(vec![entry("/f.txt", 0, "a"), entry("/f.txt", 1, "b")])
            .await?;
        store.upsert(vec![entry("/f.txt", 0, "a2")]).await?;

        let texts: Vec<String> = store
            .entries_for("/f.txt")
            .await
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(texts, vec!["a2", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_query_ties_follow_insertion_order() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .upsert(vec![
                entry("/x.txt", 0, "first"),
                entry("/y.txt", 0, "second"),
                entry("/z.txt", 0, "third"),
            ])
            .await?;

        let results = store.query(&[f16::from_f32(1.0)], 2).await?;
        let texts: Vec<&str> = results.iter().map(|r| r.entry.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_and_fingerprints() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .upsert(vec![entry("/x.txt", 0, "a"), entry("/y.txt", 0, "b")])
            .await?;
        assert_eq!(store.delete_by_source("/x.txt").await?, 1);
        assert_eq!(store.count().await?, 1);

        store
            .record_fingerprint(FileFingerprint {
                path: "/y.txt".to_string(),
                hash: "h".to_string(),
                extension: Some("txt".to_string()),
            })
            .await?;
        assert_eq!(store.tracked_files().await?, 1);
        store.forget_fingerprint("/y.txt").await?;
        assert!(store.fingerprint("/y.txt").await?.is_none());

        store
            .record_fingerprint(FileFingerprint {
                path: "/z.txt".to_string(),
                hash: "h".to_string(),
                extension: None,
            })
            .await?;
        store.clear_fingerprints().await?;
        assert_eq!(store.tracked_files().await?, 0);
        Ok(())
    }
}
