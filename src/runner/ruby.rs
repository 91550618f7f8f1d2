//! Ruby test runners: RSpec, Minitest.
//!
//! Grounded on `examples/original_source/ruby.py` in full. Neither runner
//! overrides [`Runner::versions_compatible`], so both use the trait default
//! (exact major.minor match).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::rspec;
use crate::runner::exec::{read_to_string_lossy, run_command};
use crate::runner::{Runner, RunnerError, RunnerResult, RunResult};

static RUBY_VERSION_FILE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.\d+)").unwrap());
static GEMFILE_RUBY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?m)^ruby\s+["'](\d+\.\d+)"#).unwrap());
static RUBY_VERSION_OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.\d+)").unwrap());
static RSPEC_SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s+examples?,\s+(\d+)\s+failures?").unwrap());
static MINITEST_SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s+runs?,\s+(\d+)\s+assertions?,\s+(\d+)\s+failures?,\s+(\d+)\s+errors?,?\s*(\d+)?\s*skips?").unwrap()
});

fn get_required_ruby_version(repo_path: &Path) -> Option<String> {
    if let Some(content) = read_to_string_lossy(&repo_path.join(".ruby-version"))
        && let Some(c) = RUBY_VERSION_FILE_RE.captures(content.trim())
    {
        return Some(c[1].to_string());
    }
    let content = read_to_string_lossy(&repo_path.join("Gemfile"))?;
    GEMFILE_RUBY_RE.captures(&content).map(|c| c[1].to_string())
}

async fn check_ruby_runtime() -> (bool, String) {
    let out = run_command("ruby", &["--version"], Path::new("."), Duration::from_secs(10)).await;
    match out {
        Ok(o) if o.success() => (true, o.stdout.trim().to_string()),
        Ok(o) => (false, o.stderr),
        Err(e) => (false, e.to_string()),
    }
}

fn walk_entries(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&d) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

fn walk_has_suffix(dir: &Path, suffix: &str) -> bool {
    walk_entries(dir).into_iter().any(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix))
    })
}

fn walk_has_name_prefix(dir: &Path, prefix: &str, suffix: &str) -> bool {
    walk_entries(dir).into_iter().any(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix) && n.ends_with(suffix))
    })
}

async fn bundle_install(repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
    let bundle_check = run_command("bundle", &["--version"], repo_path, Duration::from_secs(10)).await;
    if bundle_check.is_err() || !bundle_check.map(|o| o.success()).unwrap_or(false) {
        let gem_out = run_command("gem", &["install", "bundler"], repo_path, Duration::from_secs(60)).await?;
        if !gem_out.success() {
            return Err(RunnerError::InstallFailed(format!("failed to install bundler: {}", gem_out.stderr)));
        }
    }
    let out = run_command("bundle", &["install"], repo_path, timeout).await?;
    if out.success() {
        Ok(())
    } else {
        Err(RunnerError::InstallFailed(format!("bundle install failed: {}", out.stderr)))
    }
}

pub struct RSpecRunner;

#[async_trait]
impl Runner for RSpecRunner {
    fn name(&self) -> &'static str {
        "rspec"
    }

    fn language(&self) -> &'static str {
        "Ruby"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;
        if repo_path.join(".rspec").exists() {
            score += 50;
        }
        let spec_dir = repo_path.join("spec");
        if spec_dir.is_dir() {
            score += 30;
            if spec_dir.join("spec_helper.rb").exists() {
                score += 20;
            }
        }
        if let Some(content) = read_to_string_lossy(&repo_path.join("Gemfile"))
            && content.to_lowercase().contains("rspec")
        {
            score += 30;
        }
        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        check_ruby_runtime().await
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        get_required_ruby_version(repo_path)
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        bundle_install(repo_path, timeout).await
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let json_path = std::env::temp_dir().join(format!("patchcheck-rspec-{}.json", std::process::id()));
        let result = run_command(
            "bundle",
            &["exec", "rspec", "--format", "json", "--out", &json_path.to_string_lossy(), "--format", "progress"],
            repo_path,
            timeout,
        )
        .await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        if let Some(json) = std::fs::read_to_string(&json_path).ok().filter(|s| !s.is_empty()) {
            let _ = std::fs::remove_file(&json_path);
            if let Some(mut parsed) = rspec::parse(&json) {
                parsed.raw_output = combined;
                return parsed;
            }
        }
        let _ = std::fs::remove_file(&json_path);

        let mut passed = Vec::new();
        let mut failed = Vec::new();
        if let Some(caps) = RSPEC_SUMMARY_RE.captures(&combined) {
            let total: i64 = caps[1].parse().unwrap_or(0);
            let fail_count: i64 = caps[2].parse().unwrap_or(0);
            let pass_count = (total - fail_count).max(0);
            passed = (0..pass_count).map(|i| format!("example_{i}")).collect();
            failed = (0..fail_count).map(|i| format!("failed_example_{i}")).collect();
        }

        let total = passed.len() + failed.len();
        let error = if total == 0 && !output.success() {
            Some(format!("rspec failed with exit code {}", output.status))
        } else {
            None
        };

        RunResult {
            passed,
            failed,
            skipped: Vec::new(),
            duration_secs: 0.0,
            raw_output: combined,
            error,
            unstable_identifiers: total > 0,
        }
    }
}

pub struct MinitestRunner;

#[async_trait]
impl Runner for MinitestRunner {
    fn name(&self) -> &'static str {
        "minitest"
    }

    fn language(&self) -> &'static str {
        "Ruby"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        if !repo_path.join("Gemfile").exists() {
            return 0;
        }

        let mut score = 0;
        let test_dir = repo_path.join("test");
        if test_dir.is_dir() {
            let has_ruby_tests = walk_has_suffix(&test_dir, "_test.rb") || walk_has_name_prefix(&test_dir, "test_", ".rb");
            if has_ruby_tests {
                score += 40;
            }
            if test_dir.join("test_helper.rb").exists() {
                score += 20;
            }
        }

        if let Some(content) = read_to_string_lossy(&repo_path.join("Rakefile"))
            && (content.to_lowercase().contains("minitest") || content.contains("Rake::TestTask"))
        {
            score += 20;
        }

        if let Some(content) = read_to_string_lossy(&repo_path.join("Gemfile"))
            && content.to_lowercase().contains("minitest")
        {
            score += 30;
        }

        let rspec_score = RSpecRunner.detect(repo_path);
        if rspec_score > 50 {
            score = (score - 30).max(0);
        }

        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        check_ruby_runtime().await
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        get_required_ruby_version(repo_path)
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        bundle_install(repo_path, timeout).await
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let result = run_command("bundle", &["exec", "rake", "test"], repo_path, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        let mut passed = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        if let Some(caps) = MINITEST_SUMMARY_RE.captures(&combined) {
            let runs: i64 = caps[1].parse().unwrap_or(0);
            let failures: i64 = caps[3].parse().unwrap_or(0);
            let errors: i64 = caps[4].parse().unwrap_or(0);
            let skips: i64 = caps.get(5).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let pass_count = (runs - failures - errors - skips).max(0);
            passed = (0..pass_count).map(|i| format!("test_{i}")).collect();
            failed = (0..(failures + errors)).map(|i| format!("failed_test_{i}")).collect();
            skipped = (0..skips).map(|i| format!("skipped_test_{i}")).collect();
        }

        let total = passed.len() + failed.len() + skipped.len();
        let error = if total == 0 && !output.success() {
            Some(format!("minitest failed with exit code {}", output.status))
        } else {
            None
        };

        RunResult {
            passed,
            failed,
            skipped,
            duration_secs: 0.0,
            raw_output: combined,
            error,
            unstable_identifiers: total > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rspec_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".rspec"), "").unwrap();
        std::fs::create_dir(dir.path().join("spec")).unwrap();
        std::fs::write(dir.path().join("spec/spec_helper.rb"), "").unwrap();
        let runner = RSpecRunner;
        assert_eq!(runner.detect(dir.path()), 100);
    }

    #[test]
    fn reads_required_ruby_version_from_gemfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Gemfile"), "source 'https://rubygems.org'\nruby \"3.2\"\n").unwrap();
        assert_eq!(get_required_ruby_version(dir.path()), Some("3.2".to_string()));
    }

    #[test]
    fn minitest_requires_gemfile() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MinitestRunner;
        assert_eq!(runner.detect(dir.path()), 0);
    }
}
