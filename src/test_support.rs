//! Fake `mount`, `umount` and `sudo` executables for tests.
//!
//! The scripts are written once per test process, before any of them can be
//! run, so no test ever execs a file another thread still has open for writing.
//!
//! `mount` fails for images whose name contains `fail`, and for images named
//! `dirty` it also leaves a file behind in the mount point. `umount` fails
//! when a `fail-umount` file exists next to the mount point. Every invocation
//! is appended to `mount.log`, `umount.log` or `sudo.log` in the temp root.

use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

use tempdir::TempDir;

use crate::{
    config::MountConfig, limiter::SlotPool, manager::MountManager, platform::Platform,
    tools::MountTools,
};

const MOUNT: &str = r#"#!/bin/sh
echo "$1 $2" >> "$(dirname "$2")/mount.log"
case "$1" in
  *dirty*) touch "$2/leftover"; echo "mount: dirty" >&2; exit 32 ;;
  *fail*) echo "mount: failed" >&2; exit 32 ;;
esac
echo "mounted $1"
"#;

const UMOUNT: &str = r#"#!/bin/sh
root="$(dirname "$1")"
echo "$1" >> "$root/umount.log"
if [ -e "$root/fail-umount" ]; then
  echo "umount: target is busy" >&2
  exit 32
fi
"#;

const SUDO: &str = r#"#!/bin/sh
for last in "$@"; do :; done
echo "$*" >> "$(dirname "$last")/sudo.log"
exec "$@"
"#;

static FAKE_TOOLS: LazyLock<PathBuf> = LazyLock::new(|| {
    let dir = std::env::temp_dir().join(format!("isomount-tools-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    for (name, script) in [("mount", MOUNT), ("umount", UMOUNT), ("sudo", SUDO)] {
        let path = dir.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    dir
});

pub fn fake_tools() -> MountTools {
    MountTools {
        mount: FAKE_TOOLS.join("mount"),
        umount: FAKE_TOOLS.join("umount"),
        sudo: FAKE_TOOLS.join("sudo"),
    }
}

#[derive(Debug, Clone)]
pub struct FakePlatform {
    pub unix: bool,
    pub kernel: Option<&'static str>,
    pub uid: u32,
}

impl FakePlatform {
    pub fn linux(uid: u32) -> Self {
        Self {
            unix: true,
            kernel: Some("Linux"),
            uid,
        }
    }
}

impl Platform for FakePlatform {
    fn is_unix(&self) -> bool {
        self.unix
    }

    fn kernel_name(&self) -> Option<String> {
        self.kernel.map(String::from)
    }

    fn effective_uid(&self) -> u32 {
        self.uid
    }
}

/// A manager running the fake tools inside its own temp root.
pub struct Fixture {
    pub manager: MountManager,
    pub temp_root: PathBuf,
    _dir: TempDir,
}

impl Fixture {
    pub fn new(capacity: usize, uid: u32) -> Self {
        let dir = TempDir::new("isomount").unwrap();
        let temp_root = dir.path().join("mounts");
        let config = MountConfig::builder()
            .temp_root(temp_root.clone())
            .tools(fake_tools())
            .concurrency(capacity)
            .finish();
        let manager = MountManager::with_parts(
            config,
            SlotPool::new(capacity),
            Arc::new(FakePlatform::linux(uid)),
        );
        Self {
            manager,
            temp_root,
            _dir: dir,
        }
    }

    pub fn log(&self, name: &str) -> Vec<String> {
        std::fs::read_to_string(self.temp_root.join(name))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    /// Directories currently present below the temp root.
    pub fn mount_points(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.temp_root) else {
            return vec![];
        };
        entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_dir())
            .collect()
    }

    pub fn image(&self, name: &str) -> PathBuf {
        Path::new("/images").join(name)
    }
}
