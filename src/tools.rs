use std::path::{Path, PathBuf};

use crate::error::{MountError, Result};

pub const MOUNT: &str = "/usr/bin/mount";
pub const UMOUNT: &str = "/usr/bin/umount";
pub const SUDO: &str = "/usr/bin/sudo";

/// Locations of the external executables used to mount and unmount images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTools {
    pub mount: PathBuf,
    pub umount: PathBuf,
    pub sudo: PathBuf,
}

impl Default for MountTools {
    fn default() -> Self {
        Self {
            mount: MOUNT.into(),
            umount: UMOUNT.into(),
            sudo: SUDO.into(),
        }
    }
}

impl MountTools {
    fn all(&self) -> [&Path; 3] {
        [&self.mount, &self.umount, &self.sudo]
    }

    pub fn ensure_available(&self) -> Result<()> {
        for tool in self.all() {
            if !tool.exists() {
                tracing::warn!(r#"Required tool "{}" not found"#, tool.display());
                return Err(MountError::EnvironmentUnavailable(tool.to_path_buf()));
            }
            tracing::trace!(r#"Using "{}""#, tool.display());
        }
        Ok(())
    }
}
