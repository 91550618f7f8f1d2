//! Ad-hoc verbose-text fallback parsers, used when a tool's structured
//! output (JUnit/JSON/TRX) is unavailable or failed to produce any
//! `<testcase>`/event.
//!
//! Grounded on `examples/original_source/parsers.py`'s
//! `parse_pytest_output` (the only text fallback the original implements);
//! extended to unittest's own verbose format (already covered by
//! `python.py`'s `_parse_unittest_output`), CTest's `--verbose` log, and a
//! generic TAP stream, per SPEC_FULL.md's output-parser table.

use regex::Regex;
use std::sync::LazyLock;

use crate::runner::RunResult;

static PYTEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w/.\-]+::\w+(?:\[.*?\])?)\s+(PASSED|FAILED|SKIPPED|ERROR)").unwrap());
static PYTEST_DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"in ([\d.]+)s").unwrap());

/// pytest verbose stdout, e.g. `tests/test_foo.py::test_bar PASSED`.
pub fn parse_pytest(output: &str) -> Option<RunResult> {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();

    for line in output.lines() {
        let Some(caps) = PYTEST_RE.captures(line.trim()) else {
            continue;
        };
        let name = caps[1].to_string();
        match &caps[2] {
            "PASSED" => passed.push(name),
            "FAILED" | "ERROR" => failed.push(name),
            "SKIPPED" => skipped.push(name),
            _ => {}
        }
    }

    if passed.is_empty() && failed.is_empty() && skipped.is_empty() {
        return None;
    }

    let duration_secs = PYTEST_DURATION_RE
        .captures(output)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0.0);

    Some(RunResult {
        passed,
        failed,
        skipped,
        duration_secs,
        raw_output: output.to_string(),
        error: None,
        unstable_identifiers: false,
    })
}

static UNITTEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s+\(([\w.]+)\)\s+\.\.\.\s+(ok|FAIL|ERROR|skipped)").unwrap());
static UNITTEST_DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Ran \d+ tests? in ([\d.]+)s").unwrap());

/// Python `unittest discover -v` verbose output.
pub fn parse_unittest(output: &str) -> Option<RunResult> {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();

    for line in output.lines() {
        let Some(caps) = UNITTEST_RE.captures(line.trim()) else {
            continue;
        };
        let full_name = format!("{}::{}", &caps[2], &caps[1]);
        match &caps[3] {
            "ok" => passed.push(full_name),
            "FAIL" | "ERROR" => failed.push(full_name),
            "skipped" => skipped.push(full_name),
            _ => {}
        }
    }

    if passed.is_empty() && failed.is_empty() && skipped.is_empty() {
        return None;
    }

    let duration_secs = UNITTEST_DURATION_RE
        .captures(output)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0.0);

    Some(RunResult {
        passed,
        failed,
        skipped,
        duration_secs,
        raw_output: output.to_string(),
        error: None,
        unstable_identifiers: false,
    })
}

static CTEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Test\s+#\d+:\s+(\S+)\s+\.+\s*(Passed|Failed|Not Run)").unwrap());

/// `ctest --verbose` summary lines, e.g. `Test #3: parser_tests ... Passed`.
pub fn parse_ctest(output: &str) -> Option<RunResult> {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();

    for line in output.lines() {
        let Some(caps) = CTEST_RE.captures(line) else {
            continue;
        };
        let name = caps[1].to_string();
        match &caps[2] {
            "Passed" => passed.push(name),
            "Failed" => failed.push(name),
            "Not Run" => skipped.push(name),
            _ => {}
        }
    }

    if passed.is_empty() && failed.is_empty() && skipped.is_empty() {
        None
    } else {
        Some(RunResult {
            passed,
            failed,
            skipped,
            duration_secs: 0.0,
            raw_output: output.to_string(),
            error: None,
            unstable_identifiers: false,
        })
    }
}

static TAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(ok|not ok)\s+\d+(?:\s+-\s+(.*?))?(?:\s+#\s*(SKIP|TODO).*)?$").unwrap());

/// Minimal Test Anything Protocol (TAP) stream parser.
pub fn parse_tap(output: &str) -> Option<RunResult> {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    let mut idx = 0usize;

    for line in output.lines() {
        let Some(caps) = TAP_RE.captures(line.trim()) else {
            continue;
        };
        idx += 1;
        let description = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("test_{idx}"));
        let is_ok = &caps[1] == "ok";
        let directive = caps.get(3).map(|m| m.as_str());

        if directive == Some("SKIP") {
            skipped.push(description);
        } else if is_ok {
            passed.push(description);
        } else {
            failed.push(description);
        }
    }

    if passed.is_empty() && failed.is_empty() && skipped.is_empty() {
        None
    } else {
        Some(RunResult {
            passed,
            failed,
            skipped,
            duration_secs: 0.0,
            raw_output: output.to_string(),
            error: None,
            unstable_identifiers: false,
        })
    }
}

/// Last-resort fallback: the tool printed only a bare summary count
/// (`N passed, M failed`) with no per-test identifiers at all. We
/// synthesize a `RunResult` that preserves the counts but marks
/// `unstable_identifiers` so the orchestrator refuses to classify against
/// it (see DESIGN.md, Open Question 3).
static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s+passed(?:,\s*(\d+)\s+failed)?(?:,\s*(\d+)\s+skipped)?").unwrap()
});

pub fn parse_summary_counts(output: &str) -> Option<RunResult> {
    let caps = SUMMARY_RE.captures(output)?;
    let n_passed: usize = caps[1].parse().ok()?;
    let n_failed: usize = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let n_skipped: usize = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);

    if n_passed == 0 && n_failed == 0 && n_skipped == 0 {
        return None;
    }

    Some(RunResult {
        passed: (0..n_passed).map(|i| format!("test_{i}")).collect(),
        failed: (0..n_failed).map(|i| format!("failed_test_{i}")).collect(),
        skipped: (0..n_skipped).map(|i| format!("skipped_test_{i}")).collect(),
        duration_secs: 0.0,
        raw_output: output.to_string(),
        error: None,
        unstable_identifiers: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pytest_verbose_lines() {
        let output = "tests/test_foo.py::test_bar PASSED\ntests/test_foo.py::test_baz FAILED\n\
                       ======== 1 passed, 1 failed in 0.12s ========";
        let result = parse_pytest(output).unwrap();
        assert_eq!(result.passed, vec!["tests/test_foo.py::test_bar"]);
        assert_eq!(result.failed, vec!["tests/test_foo.py::test_baz"]);
        assert!((result.duration_secs - 0.12).abs() < 1e-9);
    }

    #[test]
    fn parses_unittest_verbose_lines() {
        let output = "test_add (calc.TestMath) ... ok\ntest_sub (calc.TestMath) ... FAIL\n\
                       Ran 2 tests in 0.03s";
        let result = parse_unittest(output).unwrap();
        assert_eq!(result.passed, vec!["calc.TestMath::test_add"]);
        assert_eq!(result.failed, vec!["calc.TestMath::test_sub"]);
    }

    #[test]
    fn parses_tap_stream() {
        let output = "1..3\nok 1 - math works\nnot ok 2 - broken thing\nok 3 # SKIP not ready\n";
        let result = parse_tap(output).unwrap();
        assert_eq!(result.passed, vec!["math works"]);
        assert_eq!(result.failed, vec!["broken thing"]);
        assert_eq!(result.skipped.len(), 1);
    }

    #[test]
    fn summary_fallback_marks_unstable() {
        let result = parse_summary_counts("3 passed, 1 failed in 0.5s").unwrap();
        assert!(result.unstable_identifiers);
        assert_eq!(result.passed.len(), 3);
        assert_eq!(result.failed.len(), 1);
    }
}
