//! The three-stage orchestrator: drives git through `base`/`before`/`after`,
//! delegates install+test to the selected runner at each stage, and hands
//! the resulting maps to the classifier.
//!
//! Grounded on `examples/original_source/analyzer.py`'s
//! `F2PP2PAnalyzer.analyze`/`_run_at_commit`/`_git_checkout`, restructured
//! around the teacher's `Orchestrator` struct-with-config construction
//! pattern (`anyhow::Result` return at the boundary), but sequential rather
//! than sandbox-pool-scheduled — this crate's Non-goals exclude concurrent
//! analysis entirely. `AnalysisResult`'s `verdict()` precedence is grounded
//! on `base.py`'s `F2PP2PResult.verdict` property.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::classifier::{self, RejectionCode, StatusMap};
use crate::config::AnalysisConfig;
use crate::package;
use crate::registry;
use crate::runner::{Runner, TestOutcome};
use crate::vcs::{self, VcsTimeouts};

/// One analysis request: a PR's identifying metadata plus the two commits
/// to compare.
#[derive(Debug, Clone)]
pub struct PrRequest {
    pub pr_number: i64,
    pub pr_title: String,
    pub base_sha: String,
    pub head_sha: String,
    /// Files the PR touched, if already known (e.g. from a forge API).
    /// When `None`, the orchestrator computes it itself via `git diff`.
    pub pr_files: Option<Vec<String>>,
}

/// Terminal error codes for an analysis that could not produce a
/// classification at all (as opposed to one that ran and was rejected —
/// see [`RejectionCode`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoChangedFiles,
    NoTestFiles,
    NoTestRunner,
    BuildFailed,
    Timeout,
    RuntimeVersionMismatch,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::NoChangedFiles => "NO_CHANGED_FILES",
            ErrorCode::NoTestFiles => "NO_TEST_FILES",
            ErrorCode::NoTestRunner => "NO_TEST_RUNNER",
            ErrorCode::BuildFailed => "BUILD_FAILED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::RuntimeVersionMismatch => "RUNTIME_VERSION_MISMATCH",
        };
        f.write_str(s)
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// The outcome summary of an analysis, per §6's output schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    NoF2p,
    NoP2p,
    BuildFailed,
    Timeout,
    NoTests,
    Rejected(RejectionCode),
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Valid => f.write_str("VALID"),
            Verdict::NoF2p => f.write_str("NO_F2P"),
            Verdict::NoP2p => f.write_str("NO_P2P"),
            Verdict::BuildFailed => f.write_str("BUILD_FAILED"),
            Verdict::Timeout => f.write_str("TIMEOUT"),
            Verdict::NoTests => f.write_str("NO_TESTS"),
            Verdict::Rejected(code) => write!(f, "REJECTED:{code}"),
            Verdict::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Result of analyzing one PR. Serializes directly to the JSON the CLI's
/// `--json` flag prints; no separate pretty-printing layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResult {
    pub pr_number: i64,
    pub pr_title: String,
    pub base_sha: String,
    pub head_sha: String,

    pub f2p_tests: Vec<String>,
    pub p2p_tests: Vec<String>,
    pub f2f_tests: Vec<String>,
    pub p2f_tests: Vec<String>,

    pub success: bool,
    pub error: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub rejection_reason: Option<RejectionCode>,

    pub has_new_test_file: bool,
    pub test_file_count: usize,
    pub changed_file_count: usize,

    /// Packages for which no runner could be detected, kept for diagnostics.
    pub packages_no_runner: Vec<String>,
}

impl AnalysisResult {
    fn new(req: &PrRequest) -> Self {
        Self {
            pr_number: req.pr_number,
            pr_title: req.pr_title.clone(),
            base_sha: req.base_sha.clone(),
            head_sha: req.head_sha.clone(),
            ..Default::default()
        }
    }

    fn has_valid_f2p(&self) -> bool {
        !self.f2p_tests.is_empty()
    }

    fn has_valid_p2p(&self) -> bool {
        !self.p2p_tests.is_empty()
    }

    /// The overall verdict, computed with the same precedence as
    /// `base.py`'s `F2PP2PResult.verdict` property: rejection first, then
    /// failure's error code, then the F2P/P2P emptiness combination.
    pub fn verdict(&self) -> Verdict {
        if let Some(code) = self.rejection_reason {
            return Verdict::Rejected(code);
        }
        if !self.success {
            return match self.error_code {
                Some(ErrorCode::BuildFailed) => Verdict::BuildFailed,
                Some(ErrorCode::Timeout) => Verdict::Timeout,
                None if self.error.as_deref() == Some("No tests found") => Verdict::NoTests,
                _ => Verdict::Unknown,
            };
        }
        if self.has_valid_f2p() && self.has_valid_p2p() {
            Verdict::Valid
        } else if !self.has_valid_f2p() {
            Verdict::NoF2p
        } else {
            Verdict::NoP2p
        }
    }
}

/// A file is a test file by language-specific convention when a language
/// hint is supplied (`*_test.go`, `test_*.py`/`*_test.py`, `*.spec.*`/
/// `*.test.*`, `*_spec.rb`), else by the generic substring heuristic.
/// Grounded on `analyzer.py`'s `_filter_test_files`, which branches the
/// same way on `self.language_config`.
fn is_test_file_path(path: &str, language_hint: Option<&str>) -> bool {
    let lower = path.to_lowercase();
    let file_name = Path::new(&lower).file_name().and_then(|f| f.to_str()).unwrap_or(lower.as_str());

    match language_hint.map(str::to_lowercase).as_deref() {
        Some("go") => file_name.ends_with("_test.go"),
        Some("python") => file_name.starts_with("test_") || file_name.ends_with("_test.py"),
        Some("javascript") | Some("typescript") => {
            file_name.contains(".spec.") || file_name.contains(".test.") || lower.contains("__tests__")
        }
        Some("ruby") => file_name.ends_with("_spec.rb"),
        _ => ["test", "spec", "__tests__"].iter().any(|p| lower.contains(p)),
    }
}

fn vcs_timeouts(config: &AnalysisConfig) -> VcsTimeouts {
    VcsTimeouts {
        checkout: Duration::from_secs(config.checkout_timeout_secs),
        fetch: Duration::from_secs(config.fetch_timeout_secs),
        diff: Duration::from_secs(config.diff_timeout_secs),
    }
}

/// Drives a single repository through the three-stage protocol.
pub struct Orchestrator {
    repo_path: PathBuf,
    config: AnalysisConfig,
}

impl Orchestrator {
    pub fn new(repo_path: &Path, config: AnalysisConfig) -> Self {
        for (key, value) in &config.env {
            // SAFETY: applied once at construction, before any subprocess is
            // spawned; this orchestrator is never used concurrently with
            // other env mutation in the same process.
            unsafe { std::env::set_var(key, value) };
        }
        Self {
            repo_path: repo_path.to_path_buf(),
            config,
        }
    }

    pub async fn analyze(&self, req: PrRequest) -> anyhow::Result<AnalysisResult> {
        let mut result = AnalysisResult::new(&req);
        let timeouts = vcs_timeouts(&self.config);

        vcs::reset_to_default_branch(&self.repo_path).await;

        let changed_files = match &req.pr_files {
            Some(files) => files.clone(),
            None => vcs::changed_files(&self.repo_path, &req.base_sha, &req.head_sha, timeouts).await,
        };
        if changed_files.is_empty() {
            result.error = Some("Could not get changed files from PR".to_string());
            result.error_code = Some(ErrorCode::NoChangedFiles);
            return Ok(result);
        }
        result.changed_file_count = changed_files.len();

        let test_files: Vec<String> = changed_files
            .into_iter()
            .filter(|f| is_test_file_path(f, self.config.language_hint.as_deref()))
            .collect();
        if test_files.is_empty() {
            result.error = Some("No test files changed in PR".to_string());
            result.error_code = Some(ErrorCode::NoTestFiles);
            return Ok(result);
        }
        result.test_file_count = test_files.len();

        let new_files = vcs::new_files(&self.repo_path, &req.base_sha, &req.head_sha, &test_files, timeouts).await;
        result.has_new_test_file = !new_files.is_empty();

        let mut affected_packages = package::affected_packages(&test_files, &self.repo_path);
        if affected_packages.is_empty() {
            affected_packages = vec![self.repo_path.clone()];
        }
        tracing::info!(
            packages = ?affected_packages.iter().map(|p| package::package_label(p, &self.repo_path)).collect::<Vec<_>>(),
            test_files = test_files.len(),
            new_files = new_files.len(),
            "starting analysis"
        );

        let mut all_tests_base: StatusMap = HashMap::new();
        let mut all_tests_before: StatusMap = HashMap::new();
        let mut all_tests_after: StatusMap = HashMap::new();
        let mut errors: Vec<String> = Vec::new();
        let mut packages_tested = 0usize;
        let mut language: Option<String> = None;

        for pkg_path in &affected_packages {
            let pkg_label = package::package_label(pkg_path, &self.repo_path);

            let Some(runner) = registry::get_runner(pkg_path, self.config.language_hint.as_deref()) else {
                tracing::debug!(package = %pkg_label, "no test runner for package, skipping");
                result.packages_no_runner.push(pkg_label.clone());
                continue;
            };

            let (runtime_ok, runtime_msg) = runner.check_runtime().await;
            if !runtime_ok {
                tracing::warn!(package = %pkg_label, runner = runner.name(), "runtime not available: {runtime_msg}");
                errors.push(format!("{pkg_label}: Runtime not available - {runtime_msg}"));
                continue;
            }

            let (version_ok, version_msg) = runner.check_version_compatible(pkg_path).await;
            if !version_ok {
                result.error = version_msg;
                result.error_code = Some(ErrorCode::RuntimeVersionMismatch);
                return Ok(result);
            }

            if language.is_none() {
                language = Some(runner.language().to_string());
            }

            let pkg_test_files: Vec<String> = test_files
                .iter()
                .filter(|f| pkg_path == &self.repo_path || f.starts_with(&format!("{pkg_label}/")))
                .cloned()
                .collect();
            let prefix = if pkg_path != &self.repo_path { format!("[{pkg_label}] ") } else { String::new() };

            tracing::info!(package = %pkg_label, runner = runner.name(), "[1/3] checking out base");
            let base_result = self.run_at_commit(runner.as_ref(), pkg_path, &req.base_sha, timeouts, None, None).await;
            if let Some(err) = &base_result.error
                && err.to_lowercase().contains("checkout")
            {
                errors.push(format!("{pkg_label} base: {err}"));
                continue;
            }

            tracing::info!(package = %pkg_label, "[2/3] applying test files from head to base");
            let before_result = self
                .run_at_commit(runner.as_ref(), pkg_path, &req.base_sha, timeouts, Some(&pkg_test_files), Some(&req.head_sha))
                .await;
            if let Some(err) = &before_result.error
                && err.to_lowercase().contains("checkout")
            {
                errors.push(format!("{pkg_label} before: {err}"));
                continue;
            }

            tracing::info!(package = %pkg_label, "[3/3] checking out head");
            let after_result = self.run_at_commit(runner.as_ref(), pkg_path, &req.head_sha, timeouts, None, None).await;
            if let Some(err) = &after_result.error
                && err.to_lowercase().contains("checkout")
            {
                errors.push(format!("{pkg_label} after: {err}"));
                continue;
            }

            if base_result.unstable_identifiers || before_result.unstable_identifiers || after_result.unstable_identifiers {
                tracing::warn!(package = %pkg_label, "run produced only placeholder identifiers, skipping package");
                errors.push(format!("{pkg_label}: test identifiers unstable across runs (summary-only output)"));
                continue;
            }

            for t in &base_result.passed {
                all_tests_base.insert(format!("{prefix}{t}"), TestOutcome::Passed);
            }
            for t in &base_result.failed {
                all_tests_base.insert(format!("{prefix}{t}"), TestOutcome::Failed);
            }
            for t in &before_result.passed {
                all_tests_before.insert(format!("{prefix}{t}"), TestOutcome::Passed);
            }
            for t in &before_result.failed {
                all_tests_before.insert(format!("{prefix}{t}"), TestOutcome::Failed);
            }
            for t in &after_result.passed {
                all_tests_after.insert(format!("{prefix}{t}"), TestOutcome::Passed);
            }
            for t in &after_result.failed {
                all_tests_after.insert(format!("{prefix}{t}"), TestOutcome::Failed);
            }

            packages_tested += 1;

            if base_result.error.is_some() && before_result.error.is_some() && after_result.error.is_some() {
                errors.push(format!("{pkg_label}: Tests failed at all commits"));
            }
        }

        if packages_tested == 0 {
            if !result.packages_no_runner.is_empty() && errors.is_empty() {
                result.error = Some(format!("No supported test runner found for: {}", result.packages_no_runner.join(", ")));
                result.error_code = Some(ErrorCode::NoTestRunner);
            } else if !errors.is_empty() {
                result.error = Some(errors.join("; "));
                result.error_code = Some(ErrorCode::BuildFailed);
            } else {
                result.error = Some("No test runner detected".to_string());
                result.error_code = Some(ErrorCode::NoTestRunner);
            }
            return Ok(result);
        }

        if all_tests_after.is_empty() && !errors.is_empty() {
            result.error = Some(errors.join("; "));
            result.error_code = Some(ErrorCode::BuildFailed);
            return Ok(result);
        }

        let (report, rejection) =
            classifier::classify_and_validate(&all_tests_base, &all_tests_before, &all_tests_after, result.has_new_test_file, language.as_deref());

        result.f2p_tests = report.fail_to_pass;
        result.p2p_tests = report.pass_to_pass;
        result.f2f_tests = report.fail_to_fail;
        result.p2f_tests = report.pass_to_fail;

        if let Some(code) = rejection {
            result.rejection_reason = Some(code);
            result.success = false;
            tracing::info!(pr = req.pr_number, reason = %code, "analysis rejected");
        } else {
            result.success = true;
            tracing::info!(pr = req.pr_number, "analysis complete");
        }

        tracing::info!(
            f2p = result.f2p_tests.len(),
            p2p = result.p2p_tests.len(),
            verdict = %result.verdict(),
            "analysis summary"
        );

        Ok(result)
    }

    async fn run_at_commit(
        &self,
        runner: &dyn Runner,
        pkg_path: &Path,
        sha: &str,
        timeouts: VcsTimeouts,
        apply_test_files: Option<&[String]>,
        head_sha: Option<&str>,
    ) -> crate::runner::RunResult {
        if let Err(e) = vcs::checkout(&self.repo_path, sha, timeouts).await {
            return crate::runner::RunResult::with_error(format!("Checkout failed: {e}"));
        }

        if let (Some(files), Some(head)) = (apply_test_files, head_sha)
            && !files.is_empty()
        {
            vcs::apply_test_files_from_head(&self.repo_path, files, head, timeouts).await;
        }

        let install_timeout = Duration::from_secs(self.config.install_timeout_secs);
        if let Err(e) = runner.install(pkg_path, install_timeout).await {
            return crate::runner::RunResult::with_error(format!("Install failed: {e}"));
        }

        let test_timeout = Duration::from_secs(self.config.test_timeout_secs);
        let result = runner.run(pkg_path, test_timeout).await;
        tracing::info!(passed = result.passed.len(), failed = result.failed.len(), skipped = result.skipped.len(), "stage complete");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_precedence_rejection_wins() {
        let result = AnalysisResult {
            success: true,
            f2p_tests: vec!["T1".to_string()],
            p2p_tests: vec!["T2".to_string()],
            rejection_reason: Some(RejectionCode::EmptyF2p),
            ..Default::default()
        };
        assert_eq!(result.verdict(), Verdict::Rejected(RejectionCode::EmptyF2p));
    }

    #[test]
    fn verdict_valid_when_both_nonempty() {
        let result = AnalysisResult {
            success: true,
            f2p_tests: vec!["T1".to_string()],
            p2p_tests: vec!["T2".to_string()],
            ..Default::default()
        };
        assert_eq!(result.verdict(), Verdict::Valid);
    }

    #[test]
    fn verdict_no_f2p_when_f2p_empty() {
        let result = AnalysisResult {
            success: true,
            p2p_tests: vec!["T2".to_string()],
            ..Default::default()
        };
        assert_eq!(result.verdict(), Verdict::NoF2p);
    }

    #[test]
    fn verdict_build_failed_propagates_error_code() {
        let result = AnalysisResult {
            success: false,
            error_code: Some(ErrorCode::BuildFailed),
            ..Default::default()
        };
        assert_eq!(result.verdict(), Verdict::BuildFailed);
    }

    #[test]
    fn is_test_file_path_falls_back_to_substring_heuristic_without_a_hint() {
        assert!(is_test_file_path("src/foo.test.js", None));
        assert!(is_test_file_path("spec/foo_spec.rb", None));
        assert!(is_test_file_path("__tests__/foo.js", None));
        assert!(!is_test_file_path("src/foo.js", None));
    }

    #[test]
    fn is_test_file_path_applies_go_convention_when_hinted() {
        assert!(is_test_file_path("pkg/foo_test.go", Some("go")));
        assert!(!is_test_file_path("pkg/testdata.go", Some("go")));
    }

    #[test]
    fn is_test_file_path_applies_python_convention_when_hinted() {
        assert!(is_test_file_path("tests/test_foo.py", Some("Python")));
        assert!(is_test_file_path("tests/foo_test.py", Some("Python")));
        assert!(!is_test_file_path("src/contest.py", Some("Python")));
    }

    #[test]
    fn is_test_file_path_applies_js_convention_when_hinted() {
        assert!(is_test_file_path("src/foo.spec.ts", Some("typescript")));
        assert!(is_test_file_path("src/foo.test.tsx", Some("javascript")));
        assert!(!is_test_file_path("src/foo.ts", Some("typescript")));
    }

    #[test]
    fn is_test_file_path_applies_ruby_convention_when_hinted() {
        assert!(is_test_file_path("spec/foo_spec.rb", Some("ruby")));
        assert!(!is_test_file_path("lib/foo.rb", Some("ruby")));
    }
}
