//! C/C++ test runners: CMake/CTest, Make, GoogleTest.
//!
//! Grounded on `examples/original_source/c_cpp.py` in full. None of these
//! three declare a required-version convention, so `required_version`
//! always returns `None` and version compatibility is trivially satisfied.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::junit;
use crate::runner::exec::{read_to_string_lossy, run_command};
use crate::runner::{Runner, RunnerError, RunnerResult, RunResult};

static CTEST_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Test\s+#\d+:\s+(\S+)\s+\.+\s*(Passed|Failed|\*+Failed)").unwrap());
static CTEST_SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)%\s+tests\s+passed,\s+(\d+)\s+tests\s+failed\s+out\s+of\s+(\d+)").unwrap());
static MAKE_PASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(?:PASS|ok|passed):\s*(\S+)").unwrap());
static MAKE_FAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(?:FAIL|failed|error):\s*(\S+)").unwrap());

fn walk_has_extension(dir: &Path, ext: &str) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    let mut stack: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    while let Some(path) = stack.pop() {
        if path.is_dir() {
            if let Ok(sub) = std::fs::read_dir(&path) {
                stack.extend(sub.flatten().map(|e| e.path()));
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some(ext) {
            return true;
        }
    }
    false
}

fn walk_xml_reports(dir: &Path) -> Option<RunResult> {
    if !dir.exists() {
        return None;
    }
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    let mut total_time = 0.0;
    let mut stack = vec![dir.join("Testing")];
    while let Some(d) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&d) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("xml")
                && let Some(content) = read_to_string_lossy(&path)
                && let Some(result) = junit::parse(&content)
            {
                passed.extend(result.passed);
                failed.extend(result.failed);
                skipped.extend(result.skipped);
                total_time += result.duration_secs;
            }
        }
    }
    if passed.is_empty() && failed.is_empty() && skipped.is_empty() {
        return None;
    }
    Some(RunResult {
        passed,
        failed,
        skipped,
        duration_secs: total_time,
        raw_output: String::new(),
        error: None,
        unstable_identifiers: false,
    })
}

fn parse_ctest_output(output: &str, exit_ok: bool) -> RunResult {
    let mut passed = Vec::new();
    let mut failed = Vec::new();

    for caps in CTEST_LINE_RE.captures_iter(output) {
        let name = caps[1].to_string();
        if caps[2].to_lowercase().contains("passed") {
            passed.push(name);
        } else {
            failed.push(name);
        }
    }

    if passed.is_empty()
        && failed.is_empty()
        && let Some(caps) = CTEST_SUMMARY_RE.captures(output)
    {
        let total: i64 = caps[3].parse().unwrap_or(0);
        let fail_count: i64 = caps[2].parse().unwrap_or(0);
        let pass_count = (total - fail_count).max(0);
        passed = (0..pass_count).map(|i| format!("test_{i}")).collect();
        failed = (0..fail_count).map(|i| format!("failed_test_{i}")).collect();
    }

    let total = passed.len() + failed.len();
    let error = if total == 0 {
        if output.to_lowercase().contains("no tests were found") {
            Some("No tests found".to_string())
        } else if !exit_ok {
            Some("ctest failed".to_string())
        } else {
            None
        }
    } else {
        None
    };

    RunResult {
        passed,
        failed,
        skipped: Vec::new(),
        duration_secs: 0.0,
        raw_output: output.to_string(),
        error,
        unstable_identifiers: total > 0 && output.contains('%'),
    }
}

pub struct CMakeRunner;

impl CMakeRunner {
    async fn run_ctest(repo_path: &Path, timeout: Duration) -> RunResult {
        let build_dir = repo_path.join("build");
        let build_dir_str = build_dir.to_string_lossy().to_string();
        let result = run_command(
            "ctest",
            &["--test-dir", &build_dir_str, "--output-on-failure", "-V"],
            repo_path,
            timeout,
        )
        .await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        if let Some(mut parsed) = walk_xml_reports(&build_dir)
            && parsed.total_tests() > 0
        {
            parsed.raw_output = combined;
            return parsed;
        }

        let mut parsed = parse_ctest_output(&combined, output.success());
        if parsed.error.as_deref() == Some("ctest failed") {
            parsed.error = Some(format!("ctest failed with exit code {}", output.status));
        }
        parsed
    }
}

#[async_trait]
impl Runner for CMakeRunner {
    fn name(&self) -> &'static str {
        "cmake"
    }

    fn language(&self) -> &'static str {
        "C++"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;
        if repo_path.join("CMakeLists.txt").exists() {
            score += 60;
        }
        if repo_path.join("build/CMakeCache.txt").exists() {
            score += 20;
        }
        if let Some(content) = read_to_string_lossy(&repo_path.join("CMakeLists.txt")) {
            let lower = content.to_lowercase();
            if lower.contains("enable_testing") || lower.contains("add_test") {
                score += 30;
            }
            if lower.contains("gtest") || lower.contains("googletest") {
                score += 10;
            }
        }
        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        let out = run_command("cmake", &["--version"], Path::new("."), Duration::from_secs(10)).await;
        match out {
            Ok(o) if o.success() => (true, o.stdout.trim().lines().next().unwrap_or_default().to_string()),
            Ok(o) => (false, o.stderr),
            Err(e) => (false, e.to_string()),
        }
    }

    fn required_version(&self, _repo_path: &Path) -> Option<String> {
        None
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        std::fs::create_dir_all(repo_path.join("build")).ok();
        let configure = run_command("cmake", &["-B", "build", "-S", "."], repo_path, timeout).await?;
        if !configure.success() {
            return Err(RunnerError::InstallFailed(format!("cmake configure failed: {}", configure.stderr)));
        }
        let build = run_command("cmake", &["--build", "build"], repo_path, timeout).await?;
        if build.success() {
            Ok(())
        } else {
            Err(RunnerError::InstallFailed(format!("cmake build failed: {}", build.stderr)))
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        Self::run_ctest(repo_path, timeout).await
    }
}

pub struct MakeRunner;

#[async_trait]
impl Runner for MakeRunner {
    fn name(&self) -> &'static str {
        "make"
    }

    fn language(&self) -> &'static str {
        "C++"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        const NON_C_MARKERS: &[&str] = &[
            "package.json",
            "pyproject.toml",
            "setup.py",
            "requirements.txt",
            "Gemfile",
            "Cargo.toml",
            "go.mod",
            "pom.xml",
            "build.gradle",
        ];
        if NON_C_MARKERS.iter().any(|m| repo_path.join(m).exists()) {
            return 0;
        }

        let has_c_files =
            walk_has_extension(repo_path, "c") || walk_has_extension(repo_path, "cpp") || walk_has_extension(repo_path, "cc");
        let has_h_files = walk_has_extension(repo_path, "h") || walk_has_extension(repo_path, "hpp");
        if !has_c_files && !has_h_files {
            return 0;
        }

        let mut score = 0;
        if let Some(content) = read_to_string_lossy(&repo_path.join("Makefile")) {
            score += 40;
            if Regex::new(r"(?m)^test\s*:").unwrap().is_match(&content) {
                score += 40;
            }
            if Regex::new(r"(?m)^check\s*:").unwrap().is_match(&content) {
                score += 30;
            }
        }

        if CMakeRunner.detect(repo_path) > 50 {
            score = (score - 40).max(0);
        }

        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        let out = run_command("make", &["--version"], Path::new("."), Duration::from_secs(10)).await;
        match out {
            Ok(o) if o.success() => (true, o.stdout.trim().lines().next().unwrap_or_default().to_string()),
            Ok(o) => (false, o.stderr),
            Err(e) => (false, e.to_string()),
        }
    }

    fn required_version(&self, _repo_path: &Path) -> Option<String> {
        None
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        if repo_path.join("configure").exists() {
            let configure = run_command("./configure", &[], repo_path, timeout).await?;
            if !configure.success() {
                return Err(RunnerError::InstallFailed(format!("configure failed: {}", configure.stderr)));
            }
        }
        let out = run_command("make", &[], repo_path, timeout).await?;
        if out.success() {
            Ok(())
        } else {
            Err(RunnerError::InstallFailed(format!("make failed: {}", out.stderr)))
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        for target in ["test", "check"] {
            let result = run_command("make", &[target], repo_path, timeout).await;
            let output = match result {
                Ok(out) => out,
                Err(e) => return RunResult::with_error(e.to_string()),
            };
            let combined = output.combined();

            if output.success() || combined.to_lowercase().contains("test") {
                let mut passed = Vec::new();
                let mut failed = Vec::new();
                for caps in MAKE_PASS_RE.captures_iter(&combined) {
                    passed.push(caps[1].to_string());
                }
                for caps in MAKE_FAIL_RE.captures_iter(&combined) {
                    failed.push(caps[1].to_string());
                }
                let total = passed.len() + failed.len();
                if total > 0 || output.success() {
                    let error = if total == 0 && !output.success() {
                        Some(format!("make test failed with exit code {}", output.status))
                    } else {
                        None
                    };
                    return RunResult {
                        passed,
                        failed,
                        skipped: Vec::new(),
                        duration_secs: 0.0,
                        raw_output: combined,
                        error,
                        unstable_identifiers: false,
                    };
                }
            }
        }

        RunResult::with_error("No test target found in Makefile")
    }
}

pub struct GoogleTestRunner;

#[async_trait]
impl Runner for GoogleTestRunner {
    fn name(&self) -> &'static str {
        "gtest"
    }

    fn language(&self) -> &'static str {
        "C++"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;
        if let Some(content) = read_to_string_lossy(&repo_path.join("CMakeLists.txt")) {
            let lower = content.to_lowercase();
            if lower.contains("gtest") || lower.contains("googletest") {
                score += 60;
            }
            if content.contains("gtest_discover_tests") || content.contains("gtest_add_tests") {
                score += 30;
            }
        }
        if repo_path.join("googletest").exists() || repo_path.join("third_party/googletest").exists() {
            score += 20;
        }
        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        CMakeRunner.check_runtime().await
    }

    fn required_version(&self, _repo_path: &Path) -> Option<String> {
        None
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        CMakeRunner.install(repo_path, timeout).await
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        CMakeRunner::run_ctest(repo_path, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cmake_with_testing_enabled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CMakeLists.txt"), "enable_testing()\nadd_test(foo foo)\n").unwrap();
        assert!(CMakeRunner.detect(dir.path()) >= 90);
    }

    #[test]
    fn make_runner_rejects_non_c_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        assert_eq!(MakeRunner.detect(dir.path()), 0);
    }
}
