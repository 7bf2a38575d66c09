//! Content fingerprints and the reindex decision.

use crate::storage::{FileFingerprint, FingerprintStore, IndexStore};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Lowercase hex BLAKE3 digest of `content`.
pub fn fingerprint(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// A file needs reindexing when forced, when it was never indexed, or when its
/// content changed since the last successful index.
pub fn should_reindex(current: &str, stored: Option<&str>, force: bool) -> bool {
    force || stored != Some(current)
}

/// Outcome of comparing a file against its stored fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCheck {
    pub fingerprint: String,
    pub reindex: bool,
}

/// Reads and writes fingerprints through the store's fingerprint table.
#[derive(Clone)]
pub struct ChangeTracker {
    store: Arc<dyn IndexStore>,
}

impl ChangeTracker {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }

    pub async fn check(&self, path: &str, content: &[u8], force: bool) -> Result<ChangeCheck> {
        let current = fingerprint(content);
        let stored = self.store.fingerprint(path).await?;
        let reindex = should_reindex(&current, stored.as_ref().map(|f| f.hash.as_str()), force);
        Ok(ChangeCheck {
            fingerprint: current,
            reindex,
        })
    }

    /// Record `hash` as the last successfully indexed content of `path`.
    /// Only call this once the file's entries are stored.
    pub async fn commit(&self, path: &str, hash: String) -> Result<()> {
        let extension = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        self.store
            .record_fingerprint(FileFingerprint {
                path: path.to_string(),
                hash,
                extension,
            })
            .await
    }

    /// Drop the stored fingerprint of `path` so the next check reindexes it.
    pub async fn forget(&self, path: &str) -> Result<()> {
        self.store.forget_fingerprint(path).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.store.clear_fingerprints().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[test]
    fn test_fingerprint_is_deterministic_hex() {
        let a = fingerprint(b"hello");
        assert_eq!(a, fingerprint(b"hello"));
        assert_ne!(a, fingerprint(b"hello!"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_should_reindex() {
        assert!(should_reindex("abc", None, false));
        assert!(should_reindex("abc", Some("def"), false));
        assert!(!should_reindex("abc", Some("abc"), false));
        assert!(should_reindex("abc", Some("abc"), true));
    }

    #[tokio::test]
    async fn test_check_commit_reset() -> Result<()> {
        let tracker = ChangeTracker::new(Arc::new(InMemoryStore::new()));

        let first = tracker.check("/n/a.MD", b"v1", false).await?;
        assert!(first.reindex);
        tracker.commit("/n/a.MD", first.fingerprint).await?;

        assert!(!tracker.check("/n/a.MD", b"v1", false).await?.reindex);
        assert!(tracker.check("/n/a.MD", b"v1", true).await?.reindex);
        assert!(tracker.check("/n/a.MD", b"v2", false).await?.reindex);

        tracker.forget("/n/a.MD").await?;
        assert!(tracker.check("/n/a.MD", b"v1", false).await?.reindex);

        tracker.commit("/n/a.MD", fingerprint(b"v1")).await?;
        tracker.reset().await?;
        assert!(tracker.check("/n/a.MD", b"v1", false).await?.reindex);
        Ok(())
    }
}
