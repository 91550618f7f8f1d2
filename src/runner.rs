//! Test runner trait and shared execution plumbing.
//!
//! This module provides a language-agnostic interface for detecting,
//! installing, and running a repository's tests. It supports Python,
//! JavaScript/TypeScript, Go, Rust, the JVM languages, Ruby, C/C++, and
//! .NET via the [`Runner`] trait.
//!
//! # Architecture
//!
//! Each runner is a capability contract with five operations:
//!
//! 1. **Detect**: score 0..100 confidence that this runner applies ([`Runner::detect`])
//! 2. **Check runtime**: is the toolchain on `PATH` ([`Runner::check_runtime`])
//! 3. **Required version**: what version does the repo ask for ([`Runner::required_version`])
//! 4. **Install**: fetch/build dependencies ([`Runner::install`])
//! 5. **Run**: execute tests and return a normalized [`RunResult`] ([`Runner::run`])
//!
//! `check_version_compatible` is a provided method built from (2) and (3);
//! most runners accept its default (major.minor equality) and only
//! override [`Runner::versions_compatible`] where the ecosystem convention
//! differs (Node/.NET/Java: major-or-higher).
//!
//! # Built-in Runners
//!
//! | Implementation | Language | Frameworks |
//! |----------------|----------|------------|
//! | [`python::PytestRunner`], [`python::UnittestRunner`] | Python | pytest, unittest |
//! | [`javascript::VitestRunner`], [`javascript::JestRunner`], [`javascript::MochaRunner`], [`javascript::NodeTestRunner`] | JavaScript/TypeScript | vitest, jest, mocha, node:test |
//! | [`go::GoTestRunner`] | Go | go test |
//! | [`rust_lang::CargoRunner`] | Rust | cargo test |
//! | [`jvm::GradleRunner`], [`jvm::MavenRunner`], [`jvm::SbtRunner`] | JVM | gradle, maven, sbt |
//! | [`ruby::RSpecRunner`], [`ruby::MinitestRunner`] | Ruby | rspec, minitest |
//! | [`c_cpp::GoogleTestRunner`], [`c_cpp::CMakeRunner`], [`c_cpp::MakeRunner`] | C/C++ | googletest, cmake, make |
//! | [`dotnet::DotNetRunner`] | C# | dotnet test |

pub mod c_cpp;
pub mod dotnet;
pub mod exec;
pub mod go;
pub mod javascript;
pub mod jvm;
pub mod python;
pub mod ruby;
pub mod rust_lang;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors a runner can surface. Runners never panic or unwind across this
/// boundary — every failure mode below is something the orchestrator can
/// inspect and record as a per-stage diagnostic rather than a crash.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The language runtime (`python`, `node`, `cargo`, ...) isn't on `PATH`.
    #[error("runtime not found: {0}")]
    RuntimeNotFound(String),

    /// Dependency installation failed (package manager exited non-zero, or
    /// every fallback command also failed).
    #[error("dependency install failed: {0}")]
    InstallFailed(String),

    /// The subprocess exceeded its configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error launching or communicating with a subprocess.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;

/// Normalized status of a single test, independent of which framework
/// produced it.
///
/// `Passed` and `Xfail` both count as "passing" for classification
/// purposes; `Failed` and `Error` both count as "failing"; `Skipped` is
/// ignored entirely. See [`TestOutcome::is_passing`] / [`is_failing`](TestOutcome::is_failing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
    Xfail,
    Error,
}

impl TestOutcome {
    pub fn is_passing(self) -> bool {
        matches!(self, TestOutcome::Passed | TestOutcome::Xfail)
    }

    pub fn is_failing(self) -> bool {
        matches!(self, TestOutcome::Failed | TestOutcome::Error)
    }
}

/// The result of running tests once, for one package, at one commit.
///
/// The three lists are pairwise disjoint: every test identifier appears in
/// exactly one of `passed`, `failed`, `skipped`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub duration_secs: f64,
    #[serde(default)]
    pub raw_output: String,
    pub error: Option<String>,
    /// Set when the only available output was a bare summary count and the
    /// parser had to synthesize placeholder identifiers (`test_0`, ...) to
    /// preserve the counts. Such a run is ineligible for F2P/P2P
    /// classification because those identifiers are not stable across the
    /// three stages (see DESIGN.md, Open Question 3).
    #[serde(default)]
    pub unstable_identifiers: bool,
}

impl RunResult {
    pub fn total_tests(&self) -> usize {
        self.passed.len() + self.failed.len() + self.skipped.len()
    }

    /// Builds the per-test status map used by the classifier. Skipped
    /// tests are included (so `keys()` reflects "ran in this stage") but
    /// callers treat `Skipped` as neither passing nor failing.
    pub fn status_map(&self) -> HashMap<String, TestOutcome> {
        let mut map = HashMap::with_capacity(self.total_tests());
        for t in &self.passed {
            map.insert(t.clone(), TestOutcome::Passed);
        }
        for t in &self.failed {
            map.insert(t.clone(), TestOutcome::Failed);
        }
        for t in &self.skipped {
            map.insert(t.clone(), TestOutcome::Skipped);
        }
        map
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// A language/framework-specific strategy for detecting, installing, and
/// running a repository's tests.
///
/// Implementors are stateless: detection results (e.g. a resolved JS
/// monorepo root) are recomputed from the filesystem on every call rather
/// than cached in mutable fields, so a `Runner` can be shared behind
/// `Box<dyn Runner>` without interior mutability.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Short machine name, e.g. `"pytest"`, `"cargo test"`.
    fn name(&self) -> &'static str;

    /// Human language name, e.g. `"Python"`, `"Rust"`.
    fn language(&self) -> &'static str;

    /// Confidence score 0..100 that this runner applies to `repo_path`.
    /// Purely filesystem-based; never shells out.
    fn detect(&self, repo_path: &Path) -> i32;

    /// Is the underlying toolchain available on `PATH`? Returns
    /// `(available, version_or_message)`. Never errors: a missing runtime
    /// is a normal, expected outcome the orchestrator must handle.
    async fn check_runtime(&self) -> (bool, String);

    /// The runtime version the repository's conventional config files ask
    /// for, if any (e.g. `requires-python`, `.nvmrc`, `go.mod`'s `go`
    /// directive).
    fn required_version(&self, repo_path: &Path) -> Option<String>;

    /// Whether `current` satisfies `required`, under this language's
    /// comparison policy. Default: major.minor equality (Python, Ruby,
    /// Rust, Scala). JS/.NET/JVM runners override this for major-or-higher.
    fn versions_compatible(&self, required: &str, current: &str) -> bool {
        let req: Vec<&str> = required.split('.').collect();
        let cur: Vec<&str> = current.split('.').collect();
        match (req.first(), req.get(1), cur.first(), cur.get(1)) {
            (Some(rmaj), Some(rmin), Some(cmaj), Some(cmin)) => rmaj == cmaj && rmin == cmin,
            _ => true,
        }
    }

    /// Combines [`required_version`](Runner::required_version),
    /// [`check_runtime`](Runner::check_runtime) and
    /// [`versions_compatible`](Runner::versions_compatible) into the
    /// compatibility check the orchestrator actually calls. Returns
    /// `(compatible, diagnostic)`; `diagnostic` is `None` iff compatible.
    async fn check_version_compatible(&self, repo_path: &Path) -> (bool, Option<String>) {
        let Some(required) = self.required_version(repo_path) else {
            return (true, None);
        };
        let (available, current) = self.check_runtime().await;
        if !available {
            return (
                false,
                Some(format!("{} runtime not installed", self.language())),
            );
        }
        if !self.versions_compatible(&required, &current) {
            return (
                false,
                Some(format!(
                    "repo requires {} {}, but {} is installed",
                    self.language(),
                    required,
                    current
                )),
            );
        }
        (true, None)
    }

    /// Install dependencies, idempotently. `Err` means every fallback
    /// command also failed or the timeout elapsed; it never panics.
    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()>;

    /// Run the test suite and return a normalized result. This never
    /// returns `Err` for a test failure — a non-zero exit with non-empty
    /// `passed`/`failed` is authoritative. `RunResult.error` is set only
    /// when zero tests were collected (build failure, bad invocation) or
    /// the run timed out.
    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult;
}

/// Metadata about a registered runner, independent of detection against
/// any particular repository. Used by the `list-runners` CLI command.
#[derive(Debug, Clone, Serialize)]
pub struct RunnerInfo {
    pub name: &'static str,
    pub language: &'static str,
}
