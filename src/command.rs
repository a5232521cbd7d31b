use std::{
    ffi::OsStr,
    path::Path,
    process::{Command, Output, Stdio},
};

use crate::error::ProcessFailure;

/// Builds `tool args...`, or `sudo tool args...` when `escalate` is set.
/// Arguments are passed individually and never go through a shell.
pub fn privileged_command(
    tool: &Path,
    sudo: &Path,
    escalate: bool,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Command {
    let mut command = if escalate {
        let mut command = Command::new(sudo);
        command.arg(tool);
        command
    } else {
        Command::new(tool)
    };
    command.args(args);
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command
}

pub async fn run_command(label: &str, command: Command) -> Result<(), ProcessFailure> {
    tracing::debug!("Running command: {command:?}");
    let mut command = tokio::process::Command::from(command);
    let output = command.output().await.map_err(ProcessFailure::Spawn)?;
    check_output(label, output)
}

/// Blocking variant of [`run_command`] for contexts that cannot await, such as `Drop`.
pub fn run_command_blocking(label: &str, mut command: Command) -> Result<(), ProcessFailure> {
    tracing::debug!("Running command: {command:?}");
    let output = command.output().map_err(ProcessFailure::Spawn)?;
    check_output(label, output)
}

fn first_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn check_output(label: &str, output: Output) -> Result<(), ProcessFailure> {
    let stderr = first_line(&output.stderr);
    tracing::debug!("{label} StdOut: {}", first_line(&output.stdout));
    tracing::debug!("{label} StdErr: {stderr}");
    if !output.status.success() {
        return Err(ProcessFailure::Exit {
            status: output.status,
            stderr,
        });
    }
    Ok(())
}
