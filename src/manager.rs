use std::{path::Path, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn, Level};

use crate::{
    command::{privileged_command, run_command},
    config::MountConfig,
    error::{MountError, Result},
    handle::MountHandle,
    limiter::SlotPool,
    mount_point::{MountPoint, MountPointRegistry},
    path_ext::PathExt,
    platform::{HostPlatform, Platform},
};

/// Mounts ISO images through the external `mount` tool, at most
/// `concurrency` at a time.
#[derive(Debug)]
pub struct MountManager {
    config: MountConfig,
    slots: SlotPool,
    platform: Arc<dyn Platform>,
    mount_points: MountPointRegistry,
}

impl MountManager {
    /// Builds a manager for the host with a limiter sized from `config.concurrency`.
    ///
    /// # Errors
    ///
    /// [`MountError::InvalidArgument`] if `config.concurrency` is zero.
    pub fn new(config: MountConfig) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(MountError::InvalidArgument("concurrency must be at least 1"));
        }
        let slots = SlotPool::new(config.concurrency);
        Ok(Self::with_parts(config, slots, Arc::new(HostPlatform)))
    }

    /// Uses `slots` as the limiter. Its capacity wins over `config.concurrency`,
    /// which is ignored here.
    pub fn with_parts(config: MountConfig, slots: SlotPool, platform: Arc<dyn Platform>) -> Self {
        Self {
            config,
            slots,
            platform,
            mount_points: MountPointRegistry::default(),
        }
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available()
    }

    /// True for `.iso` files on a Unix host that is not Darwin.
    pub fn can_handle(&self, path: impl AsRef<Path>) -> bool {
        self.platform.is_unix() && !self.platform.is_darwin() && path.as_ref().has_iso_extension()
    }

    /// Mounts `image` on a fresh directory below the temp root.
    ///
    /// `cancel` only interrupts the wait for a free slot. Once `mount` has
    /// been started it runs to completion. Dropping the returned future while
    /// waiting for a slot removes the mount point; dropping it after `mount`
    /// was started is unsupported and may leave the image mounted.
    ///
    /// # Errors
    ///
    /// On failure the slot is returned and the mount point removed. If the
    /// removal fails as well, [`MountError::CleanupFailed`] carries both errors.
    #[instrument(level = "trace", skip_all, fields(image = %image.as_ref().display()), err(level = Level::TRACE))]
    pub async fn mount(
        &self,
        image: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<MountHandle> {
        let image = image.as_ref();
        if image.as_os_str().is_empty() {
            return Err(MountError::InvalidArgument("image path must not be empty"));
        }
        let tools = &self.config.tools;
        tools.ensure_available()?;

        // Removed on drop until handed to the handle.
        let mut mount_point = MountPoint::create(&self.config.temp_root, &self.mount_points)?;
        info!("Mounting {}...", image.display());

        let slot = self.slots.acquire(cancel).await.inspect_err(|_| {
            debug!("Gave up waiting for a slot for {}", image.display());
        })?;

        let escalate = self.platform.needs_escalation();
        let command = privileged_command(
            &tools.mount,
            &tools.sudo,
            escalate,
            [image.as_os_str(), mount_point.as_os_str()],
        );

        match run_command("Mount", command).await {
            Ok(()) => {
                info!("Mounted {} on {}", image.display(), mount_point.display());
                Ok(MountHandle::new(
                    mount_point,
                    image.to_path_buf(),
                    tools.umount.clone(),
                    tools.sudo.clone(),
                    escalate,
                    slot,
                ))
            }
            Err(cause) => {
                warn!("Mounting {} failed: {cause}", image.display());
                slot.release(&mount_point);
                let primary = MountError::MountFailed {
                    image: image.to_path_buf(),
                    cause,
                };
                let removed = mount_point.remove();
                mount_point.disarm();
                match removed {
                    Ok(()) => Err(primary),
                    Err(source) => Err(MountError::CleanupFailed {
                        mount_point: mount_point.to_path_buf(),
                        source,
                        primary: Box::new(primary),
                    }),
                }
            }
        }
    }

    /// Removes empty directories left below the temp root by earlier runs.
    ///
    /// Mount points this manager still owns, including those of mounts waiting
    /// for a slot, are kept. So are directories that are not empty or still
    /// mounted. Another process sharing the temp root is not coordinated with,
    /// so its waiting mounts can lose their directory. Returns how many
    /// directories were removed.
    pub fn purge_stale_mount_points(&self) -> Result<usize> {
        let root = &self.config.temp_root;
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(MountError::io(root, err)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|err| MountError::io(root, err))?.path();
            if !path.is_dir() {
                continue;
            }
            match self.mount_points.remove_unowned(&path) {
                Ok(true) => {
                    debug!("Removed stale mount point {}", path.display());
                    removed += 1;
                }
                Ok(false) => trace!("Keeping owned mount point {}", path.display()),
                Err(err) => debug!("Keeping {}: {err}", path.display()),
            }
        }
        Ok(removed)
    }
}
