use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;

use crate::core::moderation::{RuleSnapshot, SnapshotStore, StoreError};

/// JSON file store for the rule snapshot.
///
/// The canonical file is rewritten in full after every mutation; backups
/// are timestamp-named siblings and never overwrite an existing file.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("link_rules");
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");

        let mut path = self
            .path
            .with_file_name(format!("{}-{}.json", stem, timestamp));
        // Same-second backups get a numeric suffix instead of clobbering
        // the previous one.
        let mut n = 1;
        while path.exists() {
            n += 1;
            path = self
                .path
                .with_file_name(format!("{}-{}-{}.json", stem, timestamp, n));
        }
        path
    }

    async fn write_to(&self, path: &Path, snapshot: &RuleSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let text = serde_json::to_string_pretty(snapshot)?;
        fs::write(path, text).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn load(&self) -> Result<RuleSnapshot, StoreError> {
        if !self.path.exists() {
            // First run - nothing persisted yet.
            return Ok(RuleSnapshot::default());
        }

        let text = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn save(&self, snapshot: &RuleSnapshot) -> Result<(), StoreError> {
        self.write_to(&self.path, snapshot).await
    }

    async fn backup(&self, snapshot: &RuleSnapshot) -> Result<String, StoreError> {
        let path = self.backup_path();
        self.write_to(&path, snapshot).await?;
        Ok(path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::RuleStore;
    use tempfile::tempdir;

    fn populated_snapshot() -> RuleSnapshot {
        let mut store = RuleStore::new();
        store.add_channel_rule(1, "tiktok");
        store.add_global_rule(10, "scam");
        store.allow_user(10, 100);
        store.set_watchman(1, true).unwrap();
        store.snapshot()
    }

    #[tokio::test]
    async fn test_load_of_missing_file_yields_empty_snapshot() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("link_rules.json"));

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot, RuleSnapshot::default());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("link_rules.json");
        let snapshot = populated_snapshot();

        JsonSnapshotStore::new(&path).save(&snapshot).await.unwrap();

        // A fresh store at the same path sees the same state.
        let reloaded = JsonSnapshotStore::new(&path).load().await.unwrap();
        assert_eq!(reloaded, snapshot);
    }

    #[tokio::test]
    async fn test_save_overwrites_canonical_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("link_rules.json");
        let store = JsonSnapshotStore::new(&path);

        store.save(&populated_snapshot()).await.unwrap();
        store.save(&RuleSnapshot::default()).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, RuleSnapshot::default());
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("link_rules.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonSnapshotStore::new(&path).load().await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_backup_leaves_canonical_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("link_rules.json");
        let store = JsonSnapshotStore::new(&path);

        let canonical = populated_snapshot();
        store.save(&canonical).await.unwrap();

        let name = store.backup(&RuleSnapshot::default()).await.unwrap();
        assert_ne!(name, "link_rules.json");
        assert!(dir.path().join(&name).exists());

        // Canonical content unchanged by the backup.
        assert_eq!(store.load().await.unwrap(), canonical);
    }

    #[tokio::test]
    async fn test_backups_never_overwrite_each_other() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("link_rules.json"));
        let snapshot = populated_snapshot();

        let first = store.backup(&snapshot).await.unwrap();
        let second = store.backup(&snapshot).await.unwrap();

        assert_ne!(first, second);
        assert!(dir.path().join(&first).exists());
        assert!(dir.path().join(&second).exists());
    }
}
