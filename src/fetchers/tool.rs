//! External tool invocation shared by the CLI-driven fetchers

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::traits::FetchError;

/// Captured result of one tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Case-insensitive search for any marker in stdout or stderr
    pub fn mentions_any(&self, markers: &[&str]) -> bool {
        let stdout = self.stdout.to_lowercase();
        let stderr = self.stderr.to_lowercase();
        markers.iter().any(|marker| {
            let marker = marker.to_lowercase();
            stderr.contains(&marker) || stdout.contains(&marker)
        })
    }

    /// Classify a failed run: not-found markers mean the dependency is missing
    pub fn into_error(self, tool: &str, reference: &str, not_found_markers: &[&str]) -> FetchError {
        if self.mentions_any(not_found_markers) {
            FetchError::NotFound(format!("{} could not find {}", tool, reference))
        } else {
            FetchError::Transient(format!("{} failed for {}: {}", tool, reference, self.stderr.trim()))
        }
    }
}

/// Run `binary` with `args`, optionally inside `cwd`
///
/// The binary is resolved through `PATH` first; a missing tool is a
/// deployment problem and therefore transient. The child is killed if the
/// returned future is dropped, so stage timeouts do not leak processes.
pub async fn run_tool<I, S>(binary: &str, args: I, cwd: Option<&Path>) -> Result<ToolOutput, FetchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = which::which(binary)
        .map_err(|e| FetchError::Transient(format!("{} not available: {}", binary, e)))?;

    let mut command = Command::new(&program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!(program = %program.display(), "Running tool");

    let output = command
        .output()
        .await
        .map_err(|e| FetchError::Transient(format!("Failed to execute {}: {}", binary, e)))?;

    Ok(ToolOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Shell script stand-ins for real tools in tests
#[cfg(all(test, unix))]
pub(crate) mod fake {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable `/bin/sh` script named `name` into `dir`
    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
