//! # patchcheck
//!
//! Validates that a pull request's test changes correctly demonstrate a bug
//! fix, by reconstructing three source-tree states with the version control
//! system — the pristine base commit, the base commit with the PR's test
//! files overlaid, and the pristine head commit — running the repository's
//! tests at each, and classifying the results into Fail-to-Pass (F2P),
//! Pass-to-Pass (P2P), Fail-to-Fail (F2F) and Pass-to-Fail (P2F) sets using
//! the three-run methodology popularized by SWE-Bench.
//!
//! ## Architecture
//!
//! The crate is organized around five subsystems, leaves first:
//!
//! - [`parser`] — pure functions turning raw test-tool output (JUnit XML,
//!   Jest/Mocha/RSpec JSON, `go test -json`, TRX, ad-hoc text) into a
//!   normalized [`runner::RunResult`].
//! - [`runner`] — one [`runner::Runner`] implementation per (language,
//!   framework) pair: detection, runtime/version checks, install, run.
//! - [`registry`] — picks the best-fit [`runner::Runner`] for a repository.
//! - [`orchestrator`] — drives git through the three stages and assembles
//!   the three outcome maps ([`orchestrator::Orchestrator`]).
//! - [`classifier`] — turns the three maps into F2P/P2P/F2F/P2F and applies
//!   the validator's rejection rules ([`classifier::classify_and_validate`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use patchcheck::config::Config;
//! use patchcheck::orchestrator::{Orchestrator, PrRequest};
//! use std::path::Path;
//!
//! # async fn go() -> anyhow::Result<()> {
//! let config = Config::default();
//! let orchestrator = Orchestrator::new(Path::new("."), config.analysis);
//! let result = orchestrator
//!     .analyze(PrRequest {
//!         pr_number: 42,
//!         pr_title: "Fix off-by-one in parser".into(),
//!         base_sha: "abc123".into(),
//!         head_sha: "def456".into(),
//!         pr_files: None,
//!     })
//!     .await?;
//! println!("{}", result.verdict());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod orchestrator;
pub mod package;
pub mod parser;
pub mod preflight;
pub mod registry;
pub mod report;
pub mod runner;
pub mod vcs;

pub use classifier::{RejectionCode, classify_and_validate};
pub use config::{AnalysisConfig, Config, load_config};
pub use orchestrator::{AnalysisResult, ErrorCode, Orchestrator, PrRequest, Verdict};
pub use runner::{Runner, RunnerError, RunResult, TestOutcome};
