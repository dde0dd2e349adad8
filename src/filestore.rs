//! Durable on-disk store for stack manifests.
//!
//! Layout: `<root>/<stackFolder>/<entryPoint>`, with a sibling
//! `<entryPoint>.bak` file that only exists during an update window. At most
//! one backup exists per `(stackFolder, entryPoint)`; a rollback between
//! [`FileStore::update_durable`] and [`FileStore::remove_backup`] fully
//! restores the pre-update bytes.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::BACKUP_SUFFIX;

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create file store root {}", root.display()))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn stack_dir(&self, stack_folder: &str) -> PathBuf {
        self.root.join(stack_folder)
    }

    /// Materialize content into a caller-owned (typically temporary)
    /// directory. Parent directories of `rel_path` are created as needed.
    pub async fn write_ephemeral(dir: &Path, rel_path: &str, bytes: &[u8]) -> Result<PathBuf> {
        let target = dir.join(rel_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&target, bytes)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(target)
    }

    /// Replace the durable copy, retaining the previous bytes as a backup
    /// until [`Self::remove_backup`] acknowledges the update. The new content
    /// goes through a temp file and an atomic rename, so the durable file is
    /// never observed half-written. Returns the stack's durable directory.
    pub async fn update_durable(
        &self,
        stack_folder: &str,
        rel_path: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let dir = self.stack_dir(stack_folder);
        let target = dir.join(rel_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let backup = backup_path(&target);
        if fs::try_exists(&target).await.unwrap_or(false) {
            // Staged like the forward write: the backup name only appears
            // once the snapshot is complete, so a rollback can never restore
            // a truncated copy. Overwrites any stale backup from an
            // unacknowledged update.
            let staging = staged_path(&backup);
            let copied = fs::copy(&target, &staging).await;
            if copied.is_err() {
                let _ = fs::remove_file(&staging).await;
            }
            copied.with_context(|| format!("Failed to back up {}", target.display()))?;
            let renamed = fs::rename(&staging, &backup).await;
            if renamed.is_err() {
                let _ = fs::remove_file(&staging).await;
            }
            renamed.with_context(|| format!("Failed to back up {}", target.display()))?;
        }

        let staging = staged_path(&target);
        fs::write(&staging, bytes)
            .await
            .with_context(|| format!("Failed to stage {}", staging.display()))?;
        fs::rename(&staging, &target)
            .await
            .with_context(|| format!("Failed to replace {}", target.display()))?;

        Ok(dir)
    }

    /// Restore the last backup. Without a backup nothing durable was
    /// replaced, so there is nothing to undo and the call is a no-op.
    pub async fn rollback(&self, stack_folder: &str, rel_path: &str) -> Result<()> {
        let target = self.stack_dir(stack_folder).join(rel_path);
        let backup = backup_path(&target);

        if fs::try_exists(&backup).await.unwrap_or(false) {
            fs::rename(&backup, &target)
                .await
                .with_context(|| format!("Failed to restore backup for {}", target.display()))?;
        }

        Ok(())
    }

    /// Acknowledge a successful update and discard the backup. Missing
    /// backups are a no-op.
    pub async fn remove_backup(&self, stack_folder: &str, rel_path: &str) {
        let backup = backup_path(&self.stack_dir(stack_folder).join(rel_path));
        let _ = fs::remove_file(&backup).await;
    }

    pub async fn read_durable(&self, stack_folder: &str, rel_path: &str) -> Result<Vec<u8>> {
        let target = self.stack_dir(stack_folder).join(rel_path);
        fs::read(&target)
            .await
            .with_context(|| format!("Failed to read {}", target.display()))
    }

    pub async fn backup_exists(&self, stack_folder: &str, rel_path: &str) -> bool {
        let backup = backup_path(&self.stack_dir(stack_folder).join(rel_path));
        fs::try_exists(&backup).await.unwrap_or(false)
    }
}

fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

fn staged_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("stacks")).expect("file store");
        (dir, store)
    }

    #[tokio::test]
    async fn update_then_ack_discards_backup() {
        let (_guard, store) = store();

        store.update_durable("1", "app.yml", b"v1").await.unwrap();
        store.remove_backup("1", "app.yml").await;

        store.update_durable("1", "app.yml", b"v2").await.unwrap();
        assert!(store.backup_exists("1", "app.yml").await);
        assert_eq!(store.read_durable("1", "app.yml").await.unwrap(), b"v2");

        store.remove_backup("1", "app.yml").await;
        assert!(!store.backup_exists("1", "app.yml").await);
    }

    #[tokio::test]
    async fn rollback_restores_previous_bytes() {
        let (_guard, store) = store();

        store.update_durable("1", "app.yml", b"old").await.unwrap();
        store.remove_backup("1", "app.yml").await;

        store.update_durable("1", "app.yml", b"new").await.unwrap();
        store.rollback("1", "app.yml").await.unwrap();

        assert_eq!(store.read_durable("1", "app.yml").await.unwrap(), b"old");
        assert!(!store.backup_exists("1", "app.yml").await);
    }

    #[tokio::test]
    async fn rollback_without_backup_is_a_noop() {
        let (_guard, store) = store();

        store.update_durable("2", "app.yml", b"first").await.unwrap();
        store.rollback("2", "app.yml").await.unwrap();

        assert_eq!(store.read_durable("2", "app.yml").await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn failed_backup_leaves_durable_bytes_intact() {
        let (_guard, store) = store();

        store.update_durable("5", "app.yml", b"keep").await.unwrap();
        store.remove_backup("5", "app.yml").await;

        // Occupy the backup staging path so the snapshot cannot complete.
        let blocked = store.stack_dir("5").join("app.yml.bak.tmp");
        tokio::fs::create_dir_all(&blocked).await.unwrap();

        assert!(store.update_durable("5", "app.yml", b"next").await.is_err());

        // No half-written backup appears, so a rollback after the failure
        // cannot clobber the intact durable copy.
        assert!(!store.backup_exists("5", "app.yml").await);
        store.rollback("5", "app.yml").await.unwrap();
        assert_eq!(store.read_durable("5", "app.yml").await.unwrap(), b"keep");
    }

    #[tokio::test]
    async fn repeated_updates_keep_single_backup() {
        let (_guard, store) = store();

        store.update_durable("3", "app.yml", b"a").await.unwrap();
        store.update_durable("3", "app.yml", b"b").await.unwrap();
        store.update_durable("3", "app.yml", b"c").await.unwrap();

        // The backup tracks the immediately-previous content.
        store.rollback("3", "app.yml").await.unwrap();
        assert_eq!(store.read_durable("3", "app.yml").await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn write_ephemeral_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");

        let path = FileStore::write_ephemeral(dir.path(), "nested/app.yml", b"x")
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"x");
    }
}
