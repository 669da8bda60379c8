// src/store.rs
//! Last accepted content per watch identity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::watch::WatchId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub content: String,
    pub last_seen: DateTime<Utc>,
}

/// Keyed get/put. No cross-identity transactions; callers guarantee a single
/// writer per identity.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, id: &WatchId) -> Result<Option<Snapshot>>;
    async fn put(&self, id: &WatchId, snapshot: Snapshot) -> Result<()>;
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<WatchId, Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("snapshot mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn get(&self, id: &WatchId) -> Result<Option<Snapshot>> {
        Ok(self
            .inner
            .lock()
            .expect("snapshot mutex poisoned")
            .get(id)
            .cloned())
    }

    async fn put(&self, id: &WatchId, snapshot: Snapshot) -> Result<()> {
        self.inner
            .lock()
            .expect("snapshot mutex poisoned")
            .insert(id.clone(), snapshot);
        Ok(())
    }
}

/// One JSON file per identity, named by [`WatchId::digest`].
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct StoredSnapshot {
    name: String,
    url: String,
    #[serde(flatten)]
    snapshot: Snapshot,
}

impl FileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating snapshot dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &WatchId) -> PathBuf {
        self.dir.join(format!("{}.json", id.digest()))
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn get(&self, id: &WatchId) -> Result<Option<Snapshot>> {
        let path = self.path_for(id);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let stored: StoredSnapshot = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing snapshot {}", path.display()))?;
        Ok(Some(stored.snapshot))
    }

    /// Write to a temp file, then rename over the target, so an interrupted
    /// write never leaves a truncated snapshot behind.
    async fn put(&self, id: &WatchId, snapshot: Snapshot) -> Result<()> {
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        let stored = StoredSnapshot {
            name: id.name.clone(),
            url: id.url.clone(),
            snapshot,
        };
        let data = serde_json::to_vec_pretty(&stored).context("serializing snapshot")?;
        fs::write(&tmp, data)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(content: &str) -> Snapshot {
        Snapshot {
            content: content.to_string(),
            last_seen: Utc::now(),
        }
    }

    #[tokio::test]
    async fn file_store_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("snaps")).await.unwrap();
        let id = WatchId::new("w", "https://example.com");

        assert!(store.get(&id).await.unwrap().is_none());
        store.put(&id, snap("A")).await.unwrap();
        store.put(&id, snap("B")).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().unwrap().content, "B");

        let names: Vec<String> = std::fs::read_dir(dir.path().join("snaps"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", id.digest())]);
    }

    #[tokio::test]
    async fn identities_are_disjoint() {
        let store = MemoryStore::new();
        let a = WatchId::new("a", "https://example.com");
        let b = WatchId::new("b", "https://example.com");
        store.put(&a, snap("1")).await.unwrap();
        assert!(store.get(&b).await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }
}
