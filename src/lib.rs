pub mod command;
pub mod config;
pub mod error;
pub mod handle;
pub mod limiter;
pub mod manager;
pub mod mount_point;
pub mod path_ext;
pub mod platform;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use config::MountConfig;
pub use error::{MountError, ProcessFailure};
pub use handle::MountHandle;
pub use limiter::{SlotPermit, SlotPool};
pub use manager::MountManager;
pub use platform::{HostPlatform, Platform};
pub use tools::MountTools;
