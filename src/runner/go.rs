//! Go test runner (`go test`).
//!
//! Grounded on `examples/original_source/go.py` in full. Uses the trait
//! default version policy (exact major.minor match).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::go_test;
use crate::runner::exec::{read_to_string_lossy, run_command};
use crate::runner::{Runner, RunnerError, RunnerResult, RunResult};

static GO_MOD_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^go\s+(\d+\.\d+)").unwrap());
static GO_VERSION_OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"go(\d+\.\d+)").unwrap());

fn walk_count_suffix(dir: &Path, suffix: &str) -> usize {
    let mut count = 0;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&d) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(suffix)) {
                count += 1;
            }
        }
    }
    count
}

pub struct GoTestRunner;

#[async_trait]
impl Runner for GoTestRunner {
    fn name(&self) -> &'static str {
        "go test"
    }

    fn language(&self) -> &'static str {
        "Go"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;
        if repo_path.join("go.mod").exists() {
            score += 50;
        }
        if repo_path.join("go.sum").exists() {
            score += 20;
        }
        let test_file_count = walk_count_suffix(repo_path, "_test.go");
        if test_file_count > 0 {
            score += 30;
            if test_file_count > 5 {
                score += 10;
            }
        }
        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        let out = run_command("go", &["version"], Path::new("."), Duration::from_secs(10)).await;
        match out {
            Ok(o) if o.success() => (true, o.stdout.trim().to_string()),
            Ok(o) => (false, o.stderr),
            Err(e) => (false, e.to_string()),
        }
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        let content = read_to_string_lossy(&repo_path.join("go.mod"))?;
        GO_MOD_VERSION_RE.captures(&content).map(|c| c[1].to_string())
    }

    async fn check_version_compatible(&self, repo_path: &Path) -> (bool, Option<String>) {
        let Some(required) = self.required_version(repo_path) else {
            return (true, None);
        };
        let (available, version_line) = self.check_runtime().await;
        if !available {
            return (false, Some("Go runtime not installed".to_string()));
        }
        let Some(current) = GO_VERSION_OUTPUT_RE.captures(&version_line).map(|c| c[1].to_string()) else {
            return (true, None);
        };
        if !self.versions_compatible(&required, &current) {
            return (
                false,
                Some(format!("repo requires Go {required}, but {current} is installed")),
            );
        }
        (true, None)
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        let out = run_command("go", &["mod", "download"], repo_path, timeout).await?;
        if out.success() {
            return Ok(());
        }
        let fallback = run_command("go", &["mod", "tidy"], repo_path, timeout).await?;
        if fallback.success() {
            Ok(())
        } else {
            Err(RunnerError::InstallFailed(format!(
                "go mod download failed: {}; go mod tidy failed: {}",
                out.stderr, fallback.stderr
            )))
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let result = run_command("go", &["test", "-json", "-v", "./..."], repo_path, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        let mut parsed = go_test::parse(&output.stdout).unwrap_or_default();
        parsed.raw_output = combined.clone();

        if parsed.total_tests() == 0 {
            let lower = combined.to_lowercase();
            if lower.contains("no test files") || lower.contains("no tests to run") {
                parsed.error = Some("No tests found".to_string());
            } else if !output.success() {
                parsed.error = Some(format!("go test failed with exit code {}", output.status));
            }
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_go_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example\n\ngo 1.22\n").unwrap();
        std::fs::write(dir.path().join("go.sum"), "").unwrap();
        let runner = GoTestRunner;
        assert_eq!(runner.detect(dir.path()), 70);
        assert_eq!(runner.required_version(dir.path()), Some("1.22".to_string()));
    }
}
