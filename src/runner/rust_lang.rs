//! Rust test runner (`cargo test`).
//!
//! Grounded on `examples/original_source/rust.py` in full. Uses the trait
//! default version policy (exact major.minor match).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::cargo_test;
use crate::runner::exec::{read_to_string_lossy, run_command};
use crate::runner::{Runner, RunnerError, RunnerResult, RunResult};

static TOOLCHAIN_CHANNEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"channel\s*=\s*["']?(\d+\.\d+)"#).unwrap());
static CARGO_TOML_RUST_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"rust-version\s*=\s*["'](\d+\.\d+)"#).unwrap());
static RUSTC_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.\d+)").unwrap());

fn walk_has_rs_files(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    let mut stack: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    while let Some(path) = stack.pop() {
        if path.is_dir() {
            if let Ok(sub) = std::fs::read_dir(&path) {
                stack.extend(sub.flatten().map(|e| e.path()));
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
            return true;
        }
    }
    false
}

pub struct CargoRunner;

#[async_trait]
impl Runner for CargoRunner {
    fn name(&self) -> &'static str {
        "cargo test"
    }

    fn language(&self) -> &'static str {
        "Rust"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;
        if repo_path.join("Cargo.toml").exists() {
            score += 60;
        }
        if repo_path.join("Cargo.lock").exists() {
            score += 20;
        }
        if walk_has_rs_files(&repo_path.join("src")) {
            score += 20;
        }
        if walk_has_rs_files(&repo_path.join("tests")) {
            score += 10;
        }
        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        let out = run_command("cargo", &["--version"], Path::new("."), Duration::from_secs(10)).await;
        match out {
            Ok(o) if o.success() => (true, o.stdout.trim().to_string()),
            Ok(o) => (false, o.stderr),
            Err(e) => (false, e.to_string()),
        }
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        for toolchain_file in ["rust-toolchain.toml", "rust-toolchain"] {
            if let Some(content) = read_to_string_lossy(&repo_path.join(toolchain_file))
                && let Some(caps) = TOOLCHAIN_CHANNEL_RE.captures(&content)
            {
                return Some(caps[1].to_string());
            }
        }
        let content = read_to_string_lossy(&repo_path.join("Cargo.toml"))?;
        CARGO_TOML_RUST_VERSION_RE.captures(&content).map(|c| c[1].to_string())
    }

    async fn check_version_compatible(&self, repo_path: &Path) -> (bool, Option<String>) {
        let Some(required) = self.required_version(repo_path) else {
            return (true, None);
        };
        let out = run_command("rustc", &["--version"], Path::new("."), Duration::from_secs(10)).await;
        let Ok(out) = out else {
            return (false, Some("Rust runtime not installed".to_string()));
        };
        let Some(current) = RUSTC_VERSION_RE.captures(&out.stdout).map(|c| c[1].to_string()) else {
            return (true, None);
        };
        if !self.versions_compatible(&required, &current) {
            return (
                false,
                Some(format!("repo requires Rust {required}, but {current} is installed")),
            );
        }
        (true, None)
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        let out = run_command("cargo", &["build"], repo_path, timeout).await?;
        if out.success() {
            return Ok(());
        }
        let fallback = run_command("cargo", &["fetch"], repo_path, timeout).await?;
        if fallback.success() {
            Ok(())
        } else {
            Err(RunnerError::InstallFailed(format!("cargo build failed: {}", out.stderr)))
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let result = run_command("cargo", &["test", "--", "--format=pretty"], repo_path, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        let mut parsed = cargo_test::parse(&combined).unwrap_or_default();
        parsed.raw_output = combined.clone();

        if parsed.total_tests() == 0 {
            if combined.contains("0 passed") && combined.contains("0 failed") {
                parsed.error = Some("No tests found".to_string());
            } else if !output.success() {
                parsed.error = Some(format!("cargo test failed with exit code {}", output.status));
            }
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cargo_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
        std::fs::write(dir.path().join("Cargo.lock"), "").unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        std::fs::write(src.join("lib.rs"), "").unwrap();
        let runner = CargoRunner;
        assert_eq!(runner.detect(dir.path()), 100);
    }

    #[test]
    fn reads_required_version_from_toolchain_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rust-toolchain.toml"), "[toolchain]\nchannel = \"1.75\"\n").unwrap();
        assert_eq!(CargoRunner.required_version(dir.path()), Some("1.75".to_string()));
    }
}
