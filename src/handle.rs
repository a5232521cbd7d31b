use std::path::{Path, PathBuf};

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{error, info, instrument, warn, Level};

use crate::{
    command::{privileged_command, run_command, run_command_blocking},
    error::{MountError, ProcessFailure, Result},
    limiter::SlotPermit,
    mount_point::MountPoint,
};

/// A mounted image. Holds one mount slot until it is released.
///
/// Release happens exactly once, through [`MountHandle::unmount`],
/// [`MountHandle::release`] or drop, whichever comes first.
///
/// Prefer `unmount().await` inside async code. Release and drop run `umount`
/// synchronously: on a multi-threaded runtime drop moves the wait off the
/// worker with [`tokio::task::block_in_place`], on a current-thread runtime
/// it stalls every task until `umount` exits.
#[derive(Debug)]
pub struct MountHandle {
    mount_point: MountPoint,
    image: PathBuf,
    umount: PathBuf,
    sudo: PathBuf,
    escalate: bool,
    slot: Option<SlotPermit>,
}

impl MountHandle {
    pub(crate) fn new(
        mut mount_point: MountPoint,
        image: PathBuf,
        umount: PathBuf,
        sudo: PathBuf,
        escalate: bool,
        slot: SlotPermit,
    ) -> Self {
        mount_point.disarm();
        Self {
            mount_point,
            image,
            umount,
            sudo,
            escalate,
            slot: Some(slot),
        }
    }

    pub fn mount_point(&self) -> &Path {
        self.mount_point.path()
    }

    pub fn image_path(&self) -> &Path {
        &self.image
    }

    pub fn is_released(&self) -> bool {
        self.slot.is_none()
    }

    /// Unmounts the image, removes the mount point and returns the slot.
    ///
    /// Calling this on a released handle does nothing. If `umount` fails the
    /// slot is still returned, but the mount point is left in place.
    #[instrument(level = "trace", skip_all, fields(mount_point = %self.mount_point.display()), err(level = Level::TRACE))]
    pub async fn unmount(&mut self) -> Result<()> {
        let Some(slot) = self.slot.take() else {
            return Ok(());
        };
        info!("Unmounting {}...", self.image.display());
        let result = run_command("Unmount", self.command()).await;
        self.finish(slot, result)
    }

    /// Blocking form of [`MountHandle::unmount`] that logs failures instead of returning them.
    ///
    /// Blocks the calling thread until `umount` exits.
    pub fn release(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        info!("Releasing {}...", self.image.display());
        let result = run_command_blocking("Unmount", self.command());
        if let Err(err) = self.finish(slot, result) {
            error!("Failed to release {}: {err}", self.mount_point.display());
        }
    }

    fn command(&self) -> std::process::Command {
        privileged_command(
            &self.umount,
            &self.sudo,
            self.escalate,
            [self.mount_point.as_os_str()],
        )
    }

    fn finish(
        &self,
        slot: SlotPermit,
        result: std::result::Result<(), ProcessFailure>,
    ) -> Result<()> {
        slot.release(&self.mount_point);
        if let Err(cause) = result {
            warn!("Leaving mount point {} in place", self.mount_point.display());
            return Err(MountError::UnmountFailed {
                mount_point: self.mount_point.to_path_buf(),
                cause,
            });
        }
        self.mount_point
            .remove()
            .map_err(|source| MountError::io(self.mount_point.path(), source))
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        if self.is_released() {
            return;
        }
        match Handle::try_current() {
            Ok(runtime) if runtime.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.release());
            }
            _ => self.release(),
        }
    }
}
