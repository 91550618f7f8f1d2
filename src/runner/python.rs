//! Python test runners: pytest and unittest.
//!
//! Grounded on `examples/original_source/python.py`'s `PytestRunner` and
//! `UnittestRunner`, with the subprocess idiom taken from the teacher's
//! `src/framework/pytest.rs`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::{Format, ParserChain};
use crate::runner::exec::{read_to_string_lossy, run_command};
use crate::runner::{Runner, RunnerResult, RunResult};

static PYPROJECT_REQUIRES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"requires-python\s*=\s*["']>=?(\d+\.\d+)"#).unwrap());
static SETUP_PY_REQUIRES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"python_requires\s*=\s*["']>=?(\d+\.\d+)"#).unwrap());
static DOCKERFILE_PYTHON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FROM\s+python:(\d+\.\d+)").unwrap());

fn detect_required_python_version(repo_path: &Path) -> Option<String> {
    for dockerfile in ["Dockerfile", "Dockerfile.local", "docker/Dockerfile"] {
        if let Some(content) = read_to_string_lossy(&repo_path.join(dockerfile))
            && let Some(caps) = DOCKERFILE_PYTHON_RE.captures(&content)
        {
            return Some(caps[1].to_string());
        }
    }
    if let Some(content) = read_to_string_lossy(&repo_path.join("pyproject.toml"))
        && let Some(caps) = PYPROJECT_REQUIRES_RE.captures(&content)
    {
        return Some(caps[1].to_string());
    }
    for file in ["setup.py", "setup.cfg"] {
        if let Some(content) = read_to_string_lossy(&repo_path.join(file))
            && let Some(caps) = SETUP_PY_REQUIRES_RE.captures(&content)
        {
            return Some(caps[1].to_string());
        }
    }
    None
}

async fn check_python_runtime() -> (bool, String) {
    crate::runner::exec::probe_version("python3", "--version").await
}

pub struct PytestRunner;

impl PytestRunner {
    fn contains_ci(haystack: &str, needle: &str) -> bool {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}

#[async_trait]
impl Runner for PytestRunner {
    fn name(&self) -> &'static str {
        "pytest"
    }

    fn language(&self) -> &'static str {
        "Python"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;

        if repo_path.join("pytest.ini").exists() {
            score += 50;
        }
        if repo_path.join("conftest.py").exists() {
            score += 30;
        }

        if let Some(content) = read_to_string_lossy(&repo_path.join("pyproject.toml")) {
            if content.contains("[tool.pytest") {
                score += 50;
            } else if Self::contains_ci(&content, "pytest") {
                score += 30;
            }
        }

        if let Some(content) = read_to_string_lossy(&repo_path.join("setup.cfg"))
            && content.contains("[tool:pytest]")
        {
            score += 50;
        }

        for req_file in ["requirements.txt", "requirements-dev.txt", "requirements-test.txt"] {
            if let Some(content) = read_to_string_lossy(&repo_path.join(req_file))
                && Self::contains_ci(&content, "pytest")
            {
                score += 20;
            }
        }

        for test_dir in ["tests", "test", "t"] {
            let test_path = repo_path.join(test_dir);
            if !test_path.is_dir() {
                continue;
            }
            let has_python_tests = walk_has_pattern(&test_path, "test_", ".py")
                || walk_has_suffix(&test_path, "_test.py");
            if has_python_tests {
                score += 10;
            }
            if test_path.join("conftest.py").exists() {
                score += 20;
            } else if walk_has_name(&test_path, "conftest.py") {
                score += 10;
            }
        }

        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        check_python_runtime().await
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        detect_required_python_version(repo_path)
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        let mut attempts: Vec<Vec<&str>> = Vec::new();
        if repo_path.join("pyproject.toml").exists() || repo_path.join("setup.py").exists() {
            attempts.push(vec!["-m", "pip", "install", "-e", ".[dev,test]"]);
            attempts.push(vec!["-m", "pip", "install", "-e", "."]);
        }
        for req_file in ["requirements-dev.txt", "requirements-test.txt", "requirements.txt"] {
            if repo_path.join(req_file).exists() {
                attempts.push(vec!["-m", "pip", "install", "-r", req_file]);
            }
        }
        attempts.push(vec!["-m", "pip", "install", "pytest"]);

        let mut last_err = String::new();
        for args in &attempts {
            match run_command("python3", args, repo_path, timeout).await {
                Ok(out) if out.success() => {}
                Ok(out) => last_err = out.stderr,
                Err(e) => last_err = e.to_string(),
            }
        }

        let probe = run_command("python3", &["-m", "pytest", "--version"], repo_path, Duration::from_secs(30)).await;
        match probe {
            Ok(out) if out.success() => Ok(()),
            _ => Err(crate::runner::RunnerError::InstallFailed(last_err)),
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let xml_path = std::env::temp_dir().join(format!("patchcheck-pytest-{}.xml", std::process::id()));
        let xml_arg = format!("--junitxml={}", xml_path.display());

        let result = run_command(
            "python3",
            &["-m", "pytest", "-v", "--tb=short", &xml_arg, "--continue-on-collection-errors"],
            repo_path,
            timeout,
        )
        .await;

        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };

        let combined = output.combined();

        if let Some(xml) = std::fs::read_to_string(&xml_path).ok().filter(|s| !s.is_empty()) {
            let _ = std::fs::remove_file(&xml_path);
            let chain = ParserChain::new(vec![Format::JunitXml]);
            if let Some(mut parsed) = chain.parse(&xml) {
                parsed.raw_output = combined;
                return parsed;
            }
        }
        let _ = std::fs::remove_file(&xml_path);

        let chain = ParserChain::new(vec![Format::PytestText]);
        let mut parsed = chain.parse(&combined).unwrap_or_default();
        if parsed.total_tests() == 0 {
            parsed.error = Some(if combined.to_lowercase().contains("no tests ran")
                || combined.to_lowercase().contains("collected 0 items")
            {
                "No tests found".to_string()
            } else if !output.success() {
                format!("pytest failed with exit code {}", output.status)
            } else {
                parsed.error.unwrap_or_default()
            });
        }
        parsed
    }
}

pub struct UnittestRunner;

#[async_trait]
impl Runner for UnittestRunner {
    fn name(&self) -> &'static str {
        "unittest"
    }

    fn language(&self) -> &'static str {
        "Python"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;
        let mut has_test_files = false;

        for test_dir in ["tests", "test"] {
            let test_path = repo_path.join(test_dir);
            if !test_path.is_dir() {
                continue;
            }
            for entry in walk_files(&test_path, "test_", ".py") {
                has_test_files = true;
                if let Some(content) = read_to_string_lossy(&entry) {
                    if content.contains("import unittest") || content.contains("from unittest") {
                        score += 30;
                    }
                    if content.contains("TestCase") {
                        score += 20;
                    }
                }
            }
        }

        if has_test_files {
            score += 20;
        }

        if PytestRunner.detect(repo_path) > 50 {
            score = (score - 40).max(0);
        }

        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        check_python_runtime().await
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        detect_required_python_version(repo_path)
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        let mut attempts: Vec<Vec<&str>> = Vec::new();
        if repo_path.join("pyproject.toml").exists() {
            attempts.push(vec!["-m", "pip", "install", "-e", "."]);
        }
        if repo_path.join("setup.py").exists() {
            attempts.push(vec!["-m", "pip", "install", "-e", "."]);
        }
        for req_file in ["requirements.txt", "requirements-dev.txt"] {
            if repo_path.join(req_file).exists() {
                attempts.push(vec!["-m", "pip", "install", "-r", req_file]);
            }
        }
        if attempts.is_empty() {
            return Ok(());
        }

        let mut last_err = String::new();
        let mut any_failed = false;
        for args in &attempts {
            match run_command("python3", args, repo_path, timeout).await {
                Ok(out) if out.success() => {}
                Ok(out) => {
                    any_failed = true;
                    last_err = out.stderr;
                }
                Err(e) => {
                    any_failed = true;
                    last_err = e.to_string();
                }
            }
        }

        if any_failed {
            Err(crate::runner::RunnerError::InstallFailed(last_err))
        } else {
            Ok(())
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let result = run_command("python3", &["-m", "unittest", "discover", "-v"], repo_path, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();
        let chain = ParserChain::new(vec![Format::UnittestText]);
        let mut parsed = chain.parse(&combined).unwrap_or_default();
        if parsed.total_tests() == 0 && !output.success() {
            parsed.error = Some(format!("unittest failed with exit code {}", output.status));
        }
        parsed
    }
}

fn walk_has_pattern(dir: &Path, prefix: &str, suffix: &str) -> bool {
    !walk_files(dir, prefix, suffix).is_empty()
}

fn walk_has_suffix(dir: &Path, suffix: &str) -> bool {
    walk_entries(dir).into_iter().any(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix))
    })
}

fn walk_has_name(dir: &Path, name: &str) -> bool {
    walk_entries(dir)
        .into_iter()
        .any(|p| p.file_name().and_then(|n| n.to_str()) == Some(name))
}

fn walk_files(dir: &Path, prefix: &str, suffix: &str) -> Vec<std::path::PathBuf> {
    walk_entries(dir)
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with(suffix))
        })
        .collect()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pytest_ini() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pytest.ini"), "[pytest]\n").unwrap();
        assert!(PytestRunner.detect(dir.path()) >= 50);
    }

    #[test]
    fn detects_required_python_version_from_pyproject() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pyproject.toml"),
            "[project]\nrequires-python = \">=3.11\"\n",
        )
        .unwrap();
        assert_eq!(
            detect_required_python_version(dir.path()),
            Some("3.11".to_string())
        );
    }

    #[test]
    fn unittest_score_reduced_when_pytest_detected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pytest.ini"), "[pytest]\n").unwrap();
        let tests_dir = dir.path().join("tests");
        std::fs::create_dir(&tests_dir).unwrap();
        std::fs::write(
            tests_dir.join("test_foo.py"),
            "import unittest\nclass T(unittest.TestCase):\n    pass\n",
        )
        .unwrap();
        assert!(UnittestRunner.detect(dir.path()) < PytestRunner.detect(dir.path()));
    }
}
