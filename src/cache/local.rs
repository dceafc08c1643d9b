//! Filesystem-backed cache tier.
//!
//! One pretty-printed JSON file per entry, named `<fingerprint-hash>.json`
//! under a configurable directory. Writes go to a pid-suffixed tmp file and
//! rename into place, so concurrent readers never observe a truncated
//! entry. The directory is created lazily on the first `put`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CacheManager, Entry, epoch_seconds};
use crate::error::{ForsetiError, Result};
use crate::fingerprint::Fingerprint;

/// Filesystem-backed [`CacheManager`].
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `dir`. The directory need not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default store location: `<user cache dir>/forseti/results`.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("forseti")
            .join("results")
    }

    /// The directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", key.hash()))
    }
}

#[async_trait]
impl CacheManager for LocalStore {
    async fn get(&self, ctx: &CancellationToken, key: &Fingerprint) -> Result<Entry> {
        if ctx.is_cancelled() {
            return Err(ForsetiError::Cancelled);
        }
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForsetiError::CacheMiss);
            }
            Err(e) => return Err(ForsetiError::Io(e.to_string())),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| ForsetiError::Decode(format!("{}: {e}", path.display())))
    }

    async fn put(&self, ctx: &CancellationToken, mut entry: Entry) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(ForsetiError::Cancelled);
        }
        entry.timestamp = epoch_seconds();

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ForsetiError::Io(format!("create {}: {e}", self.dir.display())))?;

        let path = self.entry_path(&entry.key);
        // Tmp file with pid suffix to avoid collisions between concurrent
        // processes, then rename for atomicity.
        let tmp_path = path.with_extension(format!("json.tmp.{}", std::process::id()));
        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| ForsetiError::Io(format!("serialize entry: {e}")))?;
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| ForsetiError::Io(format!("write {}: {e}", tmp_path.display())))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| ForsetiError::Io(format!("rename into {}: {e}", path.display())))?;

        debug!(path = %path.display(), "stored cache entry");
        Ok(())
    }

    async fn delete(&self, ctx: &CancellationToken, key: &Fingerprint) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(ForsetiError::Cancelled);
        }
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ForsetiError::Io(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Finding, PolicySet};

    fn fingerprint(content: &str) -> Fingerprint {
        Fingerprint::for_request(content, "/proj/a.go", "p", "m", "v", &PolicySet::new(), "")
    }

    #[tokio::test]
    async fn get_missing_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let err = store
            .get(&CancellationToken::new(), &fingerprint("x"))
            .await
            .unwrap_err();
        assert!(err.is_miss());
    }

    #[tokio::test]
    async fn put_then_get_round_trips_findings() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("results"));
        let ctx = CancellationToken::new();

        let key = fingerprint("content");
        let entry = Entry::new(key.clone(), vec![Finding::new("rule", "msg")]);
        store.put(&ctx, entry.clone()).await.unwrap();

        let got = store.get(&ctx, &key).await.unwrap();
        assert_eq!(got.results, entry.results);
        assert_eq!(got.key, key);
        assert!(got.timestamp > 0, "put stamps the timestamp");
    }

    #[tokio::test]
    async fn put_creates_directory_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep").join("results");
        let store = LocalStore::new(&nested);
        assert!(!nested.exists());

        let entry = Entry::new(fingerprint("y"), vec![]);
        store.put(&CancellationToken::new(), entry).await.unwrap();
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn entry_file_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let key = fingerprint("z");
        store
            .put(&CancellationToken::new(), Entry::new(key.clone(), vec![]))
            .await
            .unwrap();

        let text =
            std::fs::read_to_string(dir.path().join(format!("{}.json", key.hash()))).unwrap();
        assert!(text.contains("\n  \"key\""), "two-space indent expected");
    }

    #[tokio::test]
    async fn corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let key = fingerprint("w");
        std::fs::write(dir.path().join(format!("{}.json", key.hash())), "not json").unwrap();

        let err = store.get(&CancellationToken::new(), &key).await.unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let ctx = CancellationToken::new();
        let key = fingerprint("q");

        store
            .put(&ctx, Entry::new(key.clone(), vec![]))
            .await
            .unwrap();
        store.delete(&ctx, &key).await.unwrap();
        // Second delete of the now-absent key still succeeds.
        store.delete(&ctx, &key).await.unwrap();
        assert!(store.get(&ctx, &key).await.unwrap_err().is_miss());
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let ctx = CancellationToken::new();
        ctx.cancel();

        let key = fingerprint("c");
        assert!(store.get(&ctx, &key).await.unwrap_err().is_cancelled());
        assert!(
            store
                .put(&ctx, Entry::new(key.clone(), vec![]))
                .await
                .unwrap_err()
                .is_cancelled()
        );
        assert!(store.delete(&ctx, &key).await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn overwrite_replaces_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let ctx = CancellationToken::new();
        let key = fingerprint("v");

        store
            .put(&ctx, Entry::new(key.clone(), vec![Finding::new("old", "old")]))
            .await
            .unwrap();
        store
            .put(&ctx, Entry::new(key.clone(), vec![Finding::new("new", "new")]))
            .await
            .unwrap();

        let got = store.get(&ctx, &key).await.unwrap();
        assert_eq!(got.results.len(), 1);
        assert_eq!(got.results[0].rule, "new");
    }
}
