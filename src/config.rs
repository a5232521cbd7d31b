use std::path::PathBuf;

use typed_builder::TypedBuilder;

use crate::{limiter::DEFAULT_CONCURRENCY, tools::MountTools};

pub const DEFAULT_TEMP_ROOT: &str = "/tmp/isomount";

/// Process-wide mount settings, fixed once a manager is built.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
#[builder(build_method(name = finish))]
pub struct MountConfig {
    /// Mount points are created as fresh directories below this root.
    #[builder(default = DEFAULT_TEMP_ROOT.into(), setter(into))]
    pub temp_root: PathBuf,
    #[builder(default)]
    pub tools: MountTools,
    /// Upper bound on mounts held at the same time.
    #[builder(default = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self::builder().finish()
    }
}
