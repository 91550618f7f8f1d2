//! Git subprocess wrapper used by the orchestrator to reconstruct the
//! three source-tree states.
//!
//! Grounded on `examples/original_source/analyzer.py`'s `_git_checkout`,
//! `_get_all_changed_files`, `_get_new_files`, `_apply_test_files_from_head`,
//! and the reset-to-default-branch block at the top of
//! `F2PP2PAnalyzer.analyze`, re-expressed with `tokio::process::Command` +
//! `tokio::time::timeout` per `runner/exec.rs`'s subprocess idiom.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

/// Per-operation subprocess timeouts, sourced from
/// [`crate::config::AnalysisConfig`]. Defaults match §5's budgets
/// (checkout ≤ 60s, fetch ≤ 120s, diff ≤ 30s).
#[derive(Debug, Clone, Copy)]
pub struct VcsTimeouts {
    pub checkout: Duration,
    pub fetch: Duration,
    pub diff: Duration,
}

impl Default for VcsTimeouts {
    fn default() -> Self {
        Self {
            checkout: Duration::from_secs(60),
            fetch: Duration::from_secs(120),
            diff: Duration::from_secs(30),
        }
    }
}

/// Errors a git operation can surface. Like [`crate::runner::RunnerError`],
/// these are data the orchestrator inspects, not panics.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("git checkout failed: {0}")]
    CheckoutFailed(String),

    #[error("git operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("io error running git: {0}")]
    Io(#[from] std::io::Error),
}

async fn run_git(repo_path: &Path, args: &[&str], budget: Duration) -> Result<(i32, String, String), VcsError> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(repo_path).kill_on_drop(true);

    match timeout(budget, cmd.output()).await {
        Ok(Ok(output)) => Ok((
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        )),
        Ok(Err(e)) => Err(VcsError::Io(e)),
        Err(_) => Err(VcsError::Timeout(budget)),
    }
}

/// Resolves the remote's default branch name, falling back to `"main"` if
/// the symbolic ref can't be read. Never fails: an unresolvable default
/// branch is non-fatal per the reset step's original `try/except: pass`.
pub async fn default_branch(repo_path: &Path) -> String {
    match run_git(repo_path, &["symbolic-ref", "refs/remotes/origin/HEAD", "--short"], Duration::from_secs(10)).await {
        Ok((0, stdout, _)) => {
            let branch = stdout.trim();
            if branch.is_empty() {
                "main".to_string()
            } else {
                branch.trim_start_matches("origin/").to_string()
            }
        }
        _ => "main".to_string(),
    }
}

/// Force-checks-out the default branch so runner detection starts from a
/// deterministic, non-dirty tree. Best-effort: failures are swallowed,
/// matching the original's bare `except Exception: pass`.
pub async fn reset_to_default_branch(repo_path: &Path) {
    let branch = default_branch(repo_path).await;
    let _ = run_git(repo_path, &["checkout", &branch, "--force"], Duration::from_secs(30)).await;
}

/// `git diff --name-only base...head`, one path per line.
pub async fn changed_files(repo_path: &Path, base_sha: &str, head_sha: &str, timeouts: VcsTimeouts) -> Vec<String> {
    let range = format!("{base_sha}...{head_sha}");
    match run_git(repo_path, &["diff", "--name-only", &range], timeouts.diff).await {
        Ok((0, stdout, _)) => split_lines(&stdout),
        _ => Vec::new(),
    }
}

/// `git diff --name-only --diff-filter=A base...head`, filtered down to
/// `candidates` (the already-identified test files).
pub async fn new_files(repo_path: &Path, base_sha: &str, head_sha: &str, candidates: &[String], timeouts: VcsTimeouts) -> Vec<String> {
    let range = format!("{base_sha}...{head_sha}");
    let added: std::collections::HashSet<String> = match run_git(
        repo_path,
        &["diff", "--name-only", "--diff-filter=A", &range],
        timeouts.diff,
    )
    .await
    {
        Ok((0, stdout, _)) => split_lines(&stdout).into_iter().collect(),
        _ => return Vec::new(),
    };
    candidates.iter().filter(|f| added.contains(*f)).cloned().collect()
}

/// Overlays `test_files` from `head_sha` onto whatever commit is currently
/// checked out. Best-effort: a partial failure (some paths don't exist at
/// `head_sha`) is logged, never propagated.
pub async fn apply_test_files_from_head(repo_path: &Path, test_files: &[String], head_sha: &str, timeouts: VcsTimeouts) {
    if test_files.is_empty() {
        return;
    }
    let mut args: Vec<&str> = vec!["checkout", head_sha, "--"];
    args.extend(test_files.iter().map(|s| s.as_str()));
    match run_git(repo_path, &args, timeouts.diff).await {
        Ok((0, _, _)) => tracing::info!(count = test_files.len(), "applied test files from head"),
        Ok((_, _, stderr)) => tracing::debug!(%stderr, "some test files could not be applied"),
        Err(e) => tracing::debug!(error = %e, "error applying test files"),
    }
}

/// Resets, cleans, and checks out `sha`, fetching it from `origin` first if
/// it isn't known locally. Mirrors `_git_checkout`'s reset/clean/checkout
/// ordering exactly (reset+clean run unconditionally, even when the sha is
/// already present locally).
pub async fn checkout(repo_path: &Path, sha: &str, timeouts: VcsTimeouts) -> Result<(), VcsError> {
    let known = matches!(
        run_git(repo_path, &["cat-file", "-t", sha], timeouts.diff).await,
        Ok((0, _, _))
    );
    if !known {
        tracing::debug!(sha, "commit not found locally, fetching");
        let _ = run_git(repo_path, &["fetch", "origin", sha], timeouts.fetch).await;
    }

    let _ = run_git(repo_path, &["reset", "--hard"], timeouts.diff).await;
    let _ = run_git(repo_path, &["clean", "-fd"], timeouts.diff).await;

    match run_git(repo_path, &["checkout", sha], timeouts.checkout).await {
        Ok((0, _, _)) => Ok(()),
        Ok((_, _, stderr)) => Err(VcsError::CheckoutFailed(stderr)),
        Err(e) => Err(VcsError::CheckoutFailed(e.to_string())),
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.trim().split('\n').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_drops_blanks() {
        assert_eq!(split_lines("a/b.rs\n\nc/d.rs\n"), vec!["a/b.rs", "c/d.rs"]);
    }

    #[test]
    fn split_lines_handles_empty_input() {
        assert!(split_lines("").is_empty());
        assert!(split_lines("\n").is_empty());
    }
}
