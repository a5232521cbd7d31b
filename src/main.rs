use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use isomount::{
    config::DEFAULT_TEMP_ROOT, limiter::DEFAULT_CONCURRENCY, tools, MountConfig, MountManager,
    MountTools,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn, Level};
use tracing_subscriber::{fmt, fmt::format::FmtSpan, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory below which mount points are created
    #[arg(long, value_name = "DIR", default_value = DEFAULT_TEMP_ROOT)]
    temp_root: PathBuf,

    #[arg(long, value_name = "PATH", default_value = tools::MOUNT)]
    mount_tool: PathBuf,

    #[arg(long, value_name = "PATH", default_value = tools::UMOUNT)]
    umount_tool: PathBuf,

    #[arg(long, value_name = "PATH", default_value = tools::SUDO)]
    sudo_tool: PathBuf,

    /// Maximum number of images mounted at the same time
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a file can be mounted on this host
    Check { path: PathBuf },
    /// Mount an ISO image until interrupted with Ctrl-C
    Mount { image: PathBuf },
    /// Remove empty mount points left behind by earlier runs
    Purge,
}

impl Cli {
    fn config(&self) -> MountConfig {
        MountConfig::builder()
            .temp_root(self.temp_root.clone())
            .tools(MountTools {
                mount: self.mount_tool.clone(),
                umount: self.umount_tool.clone(),
                sudo: self.sudo_tool.clone(),
            })
            .concurrency(self.concurrency)
            .finish()
    }
}

#[instrument(level = "trace", skip_all)]
async fn isomount_mount(manager: &MountManager, image: PathBuf) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut handle = manager
        .mount(&image, &cancel)
        .await
        .with_context(|| format!("Mounting {}", image.display()))?;
    println!("{}", handle.mount_point().display());

    if !cancel.is_cancelled() {
        info!("Press Ctrl-C to unmount");
        cancel.cancelled().await;
    } else {
        warn!("Interrupted while mounting, unmounting right away");
    }

    handle
        .unmount()
        .await
        .with_context(|| format!("Unmounting {}", handle.mount_point().display()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .with_env_var("ISOMOUNT_LOG")
                .from_env()
                .context("Parsing ISOMOUNT_LOG")?,
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let manager = MountManager::new(cli.config()).context("Configuring mount manager")?;

    match cli.command {
        Commands::Check { path } => {
            let supported = manager.can_handle(&path);
            println!("{}: {}", path.display(), if supported { "yes" } else { "no" });
            Ok(())
        }
        Commands::Mount { image } => isomount_mount(&manager, image).await,
        Commands::Purge => {
            let removed = manager
                .purge_stale_mount_points()
                .context("Purging stale mount points")?;
            info!("Removed {removed} stale mount points");
            Ok(())
        }
    }
}
