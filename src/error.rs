use std::{path::PathBuf, process::ExitStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MountError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("Missing {}. Unable to continue", .0.display())]
    EnvironmentUnavailable(PathBuf),
    #[error("Unable to create mount point {} (permission denied)", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to mount file {}", image.display())]
    MountFailed {
        image: PathBuf,
        #[source]
        cause: ProcessFailure,
    },
    #[error("Unable to unmount {}", mount_point.display())]
    UnmountFailed {
        mount_point: PathBuf,
        #[source]
        cause: ProcessFailure,
    },
    /// Removing the mount point failed after `primary` had already happened.
    #[error("Unable to delete mount point {} after: {primary}", mount_point.display())]
    CleanupFailed {
        mount_point: PathBuf,
        #[source]
        source: std::io::Error,
        primary: Box<MountError>,
    },
    #[error("Cancelled while waiting for a mount slot")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ProcessFailure {
    #[error("Failed to start process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Process exited with {status}: {stderr}")]
    Exit { status: ExitStatus, stderr: String },
}

pub type Result<T> = std::result::Result<T, MountError>;

impl MountError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MountError::Io {
            path: path.into(),
            source,
        }
    }
}
