// src/bot/persistence.rs - Write-through snapshot persistence

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{watch, Mutex};

/// Durable image of the bot's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub active_groups: Vec<String>,
    #[serde(default)]
    pub user_interactions: Vec<(String, u64)>,
    #[serde(default)]
    pub user_warnings: Vec<(String, u64)>,
    /// Absent in snapshots written before the blocklist became editable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offensive_words: Option<Vec<String>>,
}

/// Where snapshots are kept
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Raw snapshot bytes, or `None` when nothing was saved yet
    async fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored snapshot; readers never observe a partial write
    async fn write(&self, bytes: &[u8]) -> Result<()>;
}

/// JSON file on local disk, replaced atomically through a sibling temp file
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// Serializes snapshots to a [`StateStore`].
///
/// `save` never blocks the caller: the latest snapshot is handed to a background writer,
/// and intermediate snapshots that were superseded before being written are skipped.
/// Failures are logged and the in-memory state stays authoritative.
#[derive(Clone)]
pub struct PersistenceCoordinator {
    store: Arc<dyn StateStore>,
    latest: Arc<watch::Sender<Option<Snapshot>>>,
    // Held for the duration of each store write
    write_lock: Arc<Mutex<()>>,
}

impl PersistenceCoordinator {
    /// Start the background writer. Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn StateStore>) -> Self {
        let (tx, mut rx) = watch::channel(None::<Snapshot>);
        let writer_store = Arc::clone(&store);
        let write_lock = Arc::new(Mutex::new(()));
        let writer_lock = Arc::clone(&write_lock);

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let _guard = writer_lock.lock().await;
                // Read after locking so a concurrent flush is never overwritten with older data
                let snapshot = rx.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    if let Err(e) = Self::write_snapshot(writer_store.as_ref(), &snapshot).await {
                        error!("Failed to save bot data: {:#}", e);
                    }
                }
            }
            debug!("Persistence writer stopped");
        });

        Self {
            store,
            latest: Arc::new(tx),
            write_lock,
        }
    }

    /// Queue a snapshot for writing
    pub fn save(&self, snapshot: Snapshot) {
        self.latest.send_replace(Some(snapshot));
    }

    /// Write the latest queued snapshot now and wait for the result. Errors are logged, not returned.
    pub async fn flush(&self) -> bool {
        let _guard = self.write_lock.lock().await;
        let latest = self.latest.borrow().clone();
        let snapshot = match latest {
            Some(snapshot) => snapshot,
            None => return true,
        };
        match Self::write_snapshot(self.store.as_ref(), &snapshot).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save bot data: {:#}", e);
                false
            }
        }
    }

    /// Read the stored snapshot. Missing or unreadable data yields `None`.
    pub async fn load(&self) -> Option<Snapshot> {
        let bytes = match self.store.read().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("No saved bot data found, starting fresh");
                return None;
            }
            Err(e) => {
                error!("Failed to load bot data: {:#}", e);
                return None;
            }
        };

        match serde_json::from_slice::<Snapshot>(&bytes) {
            Ok(snapshot) => {
                info!(
                    "Loaded bot data: {} active groups, {} users",
                    snapshot.active_groups.len(),
                    snapshot.user_interactions.len()
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!("Saved bot data is corrupt, starting fresh: {}", e);
                None
            }
        }
    }

    async fn write_snapshot(store: &dyn StateStore, snapshot: &Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        store.write(&bytes).await?;
        debug!("Saved bot data ({} bytes)", bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Snapshot {
        Snapshot {
            active_groups: vec!["a@g.us".to_string()],
            user_interactions: vec![("u@s.whatsapp.net".to_string(), 4)],
            user_warnings: vec![("u@s.whatsapp.net".to_string(), 1)],
            offensive_words: Some(vec!["porra".to_string()]),
        }
    }

    #[test]
    fn test_snapshot_layout() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["activeGroups"], serde_json::json!(["a@g.us"]));
        assert_eq!(value["userInteractions"], serde_json::json!([["u@s.whatsapp.net", 4]]));
        assert_eq!(value["userWarnings"], serde_json::json!([["u@s.whatsapp.net", 1]]));
        assert_eq!(value["offensiveWords"], serde_json::json!(["porra"]));
    }

    #[test]
    fn test_partial_snapshot_defaults() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"activeGroups": ["x@g.us"]}"#).unwrap();
        assert_eq!(snapshot.active_groups, vec!["x@g.us".to_string()]);
        assert!(snapshot.user_interactions.is_empty());
        assert!(snapshot.offensive_words.is_none());
    }

    #[tokio::test]
    async fn test_flush_then_load() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileStateStore::new(dir.path().join("bot_data.json")));
        let coordinator = PersistenceCoordinator::spawn(store.clone());

        coordinator.save(sample());
        assert!(coordinator.flush().await);

        let fresh = PersistenceCoordinator::spawn(store);
        assert_eq!(fresh.load().await, Some(sample()));
    }

    #[tokio::test]
    async fn test_background_save_eventually_lands() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("bot_data.json");
        let coordinator = PersistenceCoordinator::spawn(Arc::new(FileStateStore::new(&path)));

        coordinator.save(sample());
        for _ in 0..50 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let saved: Snapshot = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved, sample());
    }

    /// Store that records every write and takes a while to finish each one
    #[derive(Default)]
    struct SlowStore {
        writes: std::sync::Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl StateStore for SlowStore {
        async fn read(&self) -> Result<Option<Vec<u8>>> {
            Ok(self.writes.lock().unwrap().last().cloned())
        }

        async fn write(&self, bytes: &[u8]) -> Result<()> {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.writes.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_last_write_is_newest_snapshot() {
        let store = Arc::new(SlowStore::default());
        let coordinator = PersistenceCoordinator::spawn(store.clone());

        let mut newest = sample();
        for n in 0..5 {
            newest.user_interactions = vec![("u@s.whatsapp.net".to_string(), n)];
            coordinator.save(newest.clone());
            tokio::task::yield_now().await;
        }
        assert!(coordinator.flush().await);
        // Let any pending background write finish
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let last = store.writes.lock().unwrap().last().cloned().unwrap();
        assert_eq!(serde_json::from_slice::<Snapshot>(&last).unwrap(), newest);
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bot_data.json");
        let coordinator = PersistenceCoordinator::spawn(Arc::new(FileStateStore::new(&path)));
        assert!(coordinator.load().await.is_none());

        std::fs::write(&path, b"{ not json").unwrap();
        assert!(coordinator.load().await.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_write_failure_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("bot_data.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupied"), b"x").unwrap();

        let coordinator = PersistenceCoordinator::spawn(Arc::new(FileStateStore::new(&path)));
        coordinator.save(sample());
        assert!(!coordinator.flush().await);
    }
}
