//! Shared subprocess execution helper.
//!
//! Every runner shells out through [`run_command`] rather than invoking
//! `tokio::process::Command` directly, so timeout handling and PATH-miss
//! detection are consistent across languages.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use super::RunnerError;

/// The outcome of a subprocess invocation: exit code plus captured output.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs `program args...` in `cwd`, capturing stdout/stderr, under a
/// timeout. Mirrors `src/provider/local.rs`'s subprocess pattern, but
/// blocks until exit rather than streaming — nothing here needs
/// incremental output.
pub async fn run_command(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> Result<CommandOutput, RunnerError> {
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd).kill_on_drop(true);

    let child = cmd.output();
    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RunnerError::RuntimeNotFound(program.to_string()))
        }
        Ok(Err(e)) => Err(RunnerError::Io(e)),
        Err(_) => Err(RunnerError::Timeout(timeout)),
    }
}

/// Checks whether `program --version` (or equivalent) succeeds, returning
/// `(available, first_line_of_output)`.
pub async fn probe_version(program: &str, version_flag: &str) -> (bool, String) {
    let mut cmd = Command::new(program);
    cmd.arg(version_flag);
    match tokio::time::timeout(Duration::from_secs(10), cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout);
            let line = text
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            if line.is_empty() {
                let err_text = String::from_utf8_lossy(&output.stderr);
                (true, err_text.lines().next().unwrap_or("").trim().to_string())
            } else {
                (true, line)
            }
        }
        _ => (false, String::new()),
    }
}

/// Reads a file's contents as a string, returning `None` on any error
/// (missing file, non-UTF8, permission denied) rather than propagating —
/// detection heuristics treat an unreadable file the same as an absent one.
pub fn read_to_string_lossy(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}
