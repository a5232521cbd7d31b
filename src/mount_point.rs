use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use derive_more::derive::Deref;
use parking_lot::Mutex;

use crate::error::{MountError, Result};

/// Mount points owned by one manager, from creation until their handle is dropped.
#[derive(Debug, Clone, Default)]
pub struct MountPointRegistry(Arc<Mutex<HashSet<PathBuf>>>);

impl MountPointRegistry {
    pub fn contains(&self, path: &Path) -> bool {
        self.0.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Removes `path` unless it is registered. The lock is held across the
    /// removal so a concurrent [`MountPoint::create`] cannot lose its directory.
    pub(crate) fn remove_unowned(&self, path: &Path) -> std::io::Result<bool> {
        let owned = self.0.lock();
        if owned.contains(path) {
            return Ok(false);
        }
        std::fs::remove_dir(path)?;
        Ok(true)
    }
}

/// A directory created exclusively for one mount.
///
/// The directory is removed on drop until [`MountPoint::disarm`] is called.
/// Once something may be mounted on it, removal is the owner's job after
/// unmounting.
#[derive(Debug, Deref)]
pub struct MountPoint {
    #[deref]
    path: PathBuf,
    registry: MountPointRegistry,
    armed: bool,
}

impl MountPoint {
    pub fn create(root: impl AsRef<Path>, registry: &MountPointRegistry) -> Result<Self> {
        let path = root.as_ref().join(uuid::Uuid::new_v4().to_string());
        registry.0.lock().insert(path.clone());
        let mut mount_point = MountPoint {
            path,
            registry: registry.clone(),
            armed: false,
        };

        tracing::debug!("Creating mount point {}", mount_point.display());
        std::fs::create_dir_all(&mount_point.path).map_err(|source| {
            let path = mount_point.path.clone();
            if source.kind() == ErrorKind::PermissionDenied {
                MountError::PermissionDenied { path, source }
            } else {
                MountError::io(path, source)
            }
        })?;
        mount_point.armed = true;
        Ok(mount_point)
    }

    /// Removes the directory if it is still there.
    pub fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_dir(&self.path) {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Keeps the directory when this value is dropped.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MountPoint {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.remove() {
                tracing::warn!(
                    "Failed to remove unused mount point {}: {err}",
                    self.path.display()
                );
            }
        }
        self.registry.0.lock().remove(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn creates_unique_directories() -> anyhow::Result<()> {
        let root = TempDir::new("mount-point")?;
        let registry = MountPointRegistry::default();
        let a = MountPoint::create(root.path().join("nested"), &registry)?;
        let b = MountPoint::create(root.path().join("nested"), &registry)?;
        assert_ne!(a.path(), b.path());
        assert!(a.is_dir() && b.is_dir());
        assert_eq!(a.parent(), Some(root.path().join("nested").as_path()));
        assert_eq!(registry.len(), 2);
        Ok(())
    }

    #[test]
    fn dropping_removes_the_directory_unless_disarmed() -> anyhow::Result<()> {
        let root = TempDir::new("mount-point")?;
        let registry = MountPointRegistry::default();
        let dropped = MountPoint::create(root.path(), &registry)?;
        let dropped_path = dropped.to_path_buf();
        let mut kept = MountPoint::create(root.path(), &registry)?;
        kept.disarm();
        let kept_path = kept.to_path_buf();

        drop(dropped);
        drop(kept);
        assert!(!dropped_path.exists());
        assert!(kept_path.is_dir());
        assert!(registry.is_empty());
        Ok(())
    }

    #[test]
    fn registered_directories_are_not_removed_as_unowned() -> anyhow::Result<()> {
        let root = TempDir::new("mount-point")?;
        let registry = MountPointRegistry::default();
        let owned = MountPoint::create(root.path(), &registry)?;
        assert!(!registry.remove_unowned(&owned)?);
        assert!(owned.is_dir());

        let stale = root.path().join("stale");
        std::fs::create_dir(&stale)?;
        assert!(registry.remove_unowned(&stale)?);
        assert!(!stale.exists());
        Ok(())
    }

    #[test]
    fn remove_is_idempotent() -> anyhow::Result<()> {
        let root = TempDir::new("mount-point")?;
        let mount_point = MountPoint::create(root.path(), &MountPointRegistry::default())?;
        mount_point.remove()?;
        assert!(!mount_point.exists());
        mount_point.remove()?;
        Ok(())
    }

    #[test]
    fn remove_refuses_non_empty_directories() -> anyhow::Result<()> {
        let root = TempDir::new("mount-point")?;
        let mut mount_point = MountPoint::create(root.path(), &MountPointRegistry::default())?;
        std::fs::write(mount_point.join("file"), "x")?;
        assert!(mount_point.remove().is_err());
        mount_point.disarm();
        Ok(())
    }

    #[test]
    fn creation_failure_is_an_io_error_and_unregisters() -> anyhow::Result<()> {
        let root = TempDir::new("mount-point")?;
        let file = root.path().join("file");
        std::fs::write(&file, "x")?;
        let registry = MountPointRegistry::default();
        assert!(matches!(
            MountPoint::create(&file, &registry),
            Err(MountError::Io { .. })
        ));
        assert!(registry.is_empty());
        Ok(())
    }
}
