//! Runner registry and auto-detection.
//!
//! Grounded on `examples/original_source/registry.py`'s `ALL_RUNNERS`/
//! `LANGUAGE_RUNNERS`/`get_runner`/`get_all_detected_runners`/
//! `get_runner_by_name`/`list_available_runners`, with the 30-point minimum
//! confidence threshold preserved verbatim.

use std::path::Path;

use crate::runner::{c_cpp, dotnet, go, javascript, jvm, python, ruby, rust_lang, Runner, RunnerInfo};

/// Minimum detection score for [`get_runner`] to consider a candidate a
/// real match rather than incidental overlap (e.g. a stray `*.csproj`
/// picked up inside a `node_modules` vendor tree).
const MIN_CONFIDENCE: i32 = 30;

/// All built-in runners, in the priority order the original registry used
/// within each language (pytest before unittest, vitest before jest before
/// mocha before node:test, gradle before maven before sbt, rspec before
/// minitest, googletest before cmake before make).
fn all_runners() -> Vec<Box<dyn Runner>> {
    vec![
        Box::new(python::PytestRunner),
        Box::new(python::UnittestRunner),
        Box::new(javascript::VitestRunner),
        Box::new(javascript::JestRunner),
        Box::new(javascript::MochaRunner),
        Box::new(javascript::NodeTestRunner),
        Box::new(go::GoTestRunner),
        Box::new(rust_lang::CargoRunner),
        Box::new(jvm::GradleRunner),
        Box::new(jvm::MavenRunner),
        Box::new(jvm::SbtRunner),
        Box::new(ruby::RSpecRunner),
        Box::new(ruby::MinitestRunner),
        Box::new(c_cpp::GoogleTestRunner),
        Box::new(c_cpp::CMakeRunner),
        Box::new(c_cpp::MakeRunner),
        Box::new(dotnet::DotNetRunner),
    ]
}

/// Runner names associated with a language hint, checked before the full
/// candidate list. Order matches `all_runners`' per-language ordering.
fn language_runner_names(language: &str) -> &'static [&'static str] {
    match language {
        "Python" => &["pytest", "unittest"],
        "JavaScript" | "TypeScript" => &["vitest", "jest", "mocha", "node:test"],
        "Go" => &["go test"],
        "Rust" => &["cargo test"],
        "Java" => &["gradle", "maven"],
        "Scala" => &["sbt", "gradle"],
        "Kotlin" => &["gradle", "maven"],
        "Ruby" => &["rspec", "minitest"],
        "C++" => &["gtest", "cmake", "make"],
        "C" => &["cmake", "make"],
        "C#" => &["dotnet"],
        _ => &[],
    }
}

/// Auto-detects the best-fit runner for a repository. If `language_hint`
/// names a known language, its runners are scored first; ties still go to
/// the highest-scoring candidate across the full registry. Returns `None`
/// if every candidate scores below [`MIN_CONFIDENCE`].
pub fn get_runner(repo_path: &Path, language_hint: Option<&str>) -> Option<Box<dyn Runner>> {
    if !repo_path.exists() {
        return None;
    }

    let runners = all_runners();
    let hinted_names: &[&str] = language_hint.map(language_runner_names).unwrap_or(&[]);

    let mut ordered: Vec<Box<dyn Runner>> = Vec::with_capacity(runners.len());
    let mut remaining: Vec<Box<dyn Runner>> = Vec::with_capacity(runners.len());
    for runner in runners {
        if hinted_names.contains(&runner.name()) {
            ordered.push(runner);
        } else {
            remaining.push(runner);
        }
    }
    ordered.extend(remaining);

    let mut best: Option<Box<dyn Runner>> = None;
    let mut best_score = 0;
    for runner in ordered {
        let score = runner.detect(repo_path);
        tracing::debug!(runner = runner.name(), score, "detection score");
        if score > best_score {
            best_score = score;
            best = Some(runner);
        }
    }

    match best {
        Some(runner) if best_score >= MIN_CONFIDENCE => {
            tracing::info!(runner = runner.name(), score = best_score, "selected runner");
            Some(runner)
        }
        _ => {
            tracing::warn!(repo = %repo_path.display(), "no suitable test runner found");
            None
        }
    }
}

/// All runners that score above zero against this repository, sorted by
/// score descending. Used by the `detect` CLI subcommand to show every
/// candidate rather than just the winner.
pub fn get_all_detected_runners(repo_path: &Path) -> Vec<(Box<dyn Runner>, i32)> {
    let mut results: Vec<(Box<dyn Runner>, i32)> = all_runners()
        .into_iter()
        .filter_map(|runner| {
            let score = runner.detect(repo_path);
            (score > 0).then_some((runner, score))
        })
        .collect();
    results.sort_by(|a, b| b.1.cmp(&a.1));
    results
}

/// Looks up a runner by its short machine name (case-insensitive), e.g.
/// `"pytest"` or `"cargo test"`.
pub fn get_runner_by_name(name: &str) -> Option<Box<dyn Runner>> {
    let name_lower = name.to_lowercase();
    all_runners().into_iter().find(|r| r.name().to_lowercase() == name_lower)
}

/// Metadata for every registered runner, independent of any repository.
/// Backs the `list-runners` CLI subcommand.
pub fn list_available_runners() -> Vec<RunnerInfo> {
    all_runners()
        .iter()
        .map(|r| RunnerInfo {
            name: r.name(),
            language: r.language(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_for_missing_path() {
        assert!(get_runner(Path::new("/nonexistent/repo/path/xyz"), None).is_none());
    }

    #[test]
    fn picks_pytest_for_pytest_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pytest.ini"), "[pytest]\n").unwrap();
        std::fs::write(dir.path().join("conftest.py"), "").unwrap();
        let runner = get_runner(dir.path(), None).unwrap();
        assert_eq!(runner.name(), "pytest");
    }

    #[test]
    fn language_hint_breaks_ties_in_favor_of_hinted_language() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
        std::fs::write(dir.path().join("build.gradle"), "").unwrap();
        let runner = get_runner(dir.path(), Some("Java")).unwrap();
        assert_eq!(runner.name(), "gradle");
    }

    #[test]
    fn list_available_runners_covers_all_languages() {
        let infos = list_available_runners();
        assert_eq!(infos.len(), 17);
    }
}
