use std::fmt::Debug;

/// Host facts that decide whether images can be mounted and how.
pub trait Platform: Debug + Send + Sync {
    fn is_unix(&self) -> bool;

    /// Kernel name as reported by the system, `None` if it could not be determined.
    fn kernel_name(&self) -> Option<String>;

    fn effective_uid(&self) -> u32;

    /// Inconclusive detection counts as "not Darwin".
    fn is_darwin(&self) -> bool {
        self.kernel_name().as_deref() == Some("Darwin")
    }

    fn needs_escalation(&self) -> bool {
        self.effective_uid() != 0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HostPlatform;

impl Platform for HostPlatform {
    fn is_unix(&self) -> bool {
        cfg!(unix)
    }

    fn kernel_name(&self) -> Option<String> {
        match nix::sys::utsname::uname() {
            Ok(uts) => Some(uts.sysname().to_string_lossy().into_owned()),
            Err(err) => {
                tracing::debug!("uname failed: {err}");
                None
            }
        }
    }

    fn effective_uid(&self) -> u32 {
        nix::unistd::geteuid().as_raw()
    }
}
