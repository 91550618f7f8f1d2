//! `cargo test` plain-text output parsing.
//!
//! Grounded on `examples/original_source/parsers.py`'s
//! `parse_cargo_test_output`.

use regex::Regex;
use std::sync::LazyLock;

use crate::runner::RunResult;

static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^test\s+([\w:]+)\s+\.\.\.\s+(ok|FAILED|ignored)").unwrap());
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"finished in ([\d.]+)s").unwrap());

pub fn parse(output: &str) -> Option<RunResult> {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();

    for line in output.lines() {
        let Some(caps) = LINE_RE.captures(line.trim()) else {
            continue;
        };
        let name = caps[1].to_string();
        match &caps[2] {
            "ok" => passed.push(name),
            "FAILED" => failed.push(name),
            "ignored" => skipped.push(name),
            _ => {}
        }
    }

    if passed.is_empty() && failed.is_empty() && skipped.is_empty() {
        return None;
    }

    let duration_secs = DURATION_RE
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cargo_test_lines() {
        let output = "test classifier::tests::rule_a ... ok\n\
                       test classifier::tests::rule_b ... FAILED\n\
                       test classifier::tests::slow ... ignored\n\
                       test result: FAILED. 1 passed; 1 failed; 1 ignored; finished in 0.42s\n";
        let result = parse(output).unwrap();
        assert_eq!(result.passed, vec!["classifier::tests::rule_a"]);
        assert_eq!(result.failed, vec!["classifier::tests::rule_b"]);
        assert_eq!(result.skipped, vec!["classifier::tests::slow"]);
        assert!((result.duration_secs - 0.42).abs() < 1e-9);
    }
}
