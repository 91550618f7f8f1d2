//! `go test -json` line-delimited event stream parsing.
//!
//! Grounded on `examples/original_source/parsers.py`'s `parse_go_test_json`.

use serde::Deserialize;

use crate::runner::RunResult;

#[derive(Deserialize)]
struct GoEvent {
    #[serde(default, rename = "Action")]
    action: String,
    #[serde(default, rename = "Test")]
    test: String,
    #[serde(default, rename = "Package")]
    package: String,
    #[serde(default, rename = "Elapsed")]
    elapsed: f64,
}

/// Returns `None` only if not a single line parsed as JSON — a Go test run
/// with zero events (build failure before any test ran) still returns
/// `Some` with empty lists, matching the spec's "empty result, not parser
/// failure" distinction.
pub fn parse(output: &str) -> Option<RunResult> {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    let mut total_time = 0.0;
    let mut any_parsed = false;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(event) = serde_json::from_str::<GoEvent>(line) else {
            continue;
        };
        any_parsed = true;
        if event.test.is_empty() {
            continue;
        }
        let full_name = if event.package.is_empty() {
            event.test.clone()
        } else {
            format!("{}::{}", event.package, event.test)
        };
        match event.action.as_str() {
            "pass" => {
                passed.push(full_name);
                total_time += event.elapsed;
            }
            "fail" => {
                failed.push(full_name);
                total_time += event.elapsed;
            }
            "skip" => skipped.push(full_name),
            _ => {}
        }
    }

    if !any_parsed {
        return None;
    }

    Some(RunResult {
        passed,
        failed,
        skipped,
        duration_secs: total_time,
        raw_output: output.to_string(),
        error: None,
        unstable_identifiers: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pass_fail_skip() {
        let output = concat!(
            "{\"Action\":\"run\",\"Test\":\"TestLogin\",\"Package\":\"pkg\"}\n",
            "{\"Action\":\"pass\",\"Test\":\"TestLogin\",\"Package\":\"pkg\",\"Elapsed\":0.5}\n",
            "{\"Action\":\"fail\",\"Test\":\"TestPayment\",\"Package\":\"pkg\",\"Elapsed\":1.2}\n",
            "{\"Action\":\"skip\",\"Test\":\"TestSkip\",\"Package\":\"pkg\"}\n",
        );
        let result = parse(output).unwrap();
        assert_eq!(result.passed, vec!["pkg::TestLogin"]);
        assert_eq!(result.failed, vec!["pkg::TestPayment"]);
        assert_eq!(result.skipped, vec!["pkg::TestSkip"]);
        assert!((result.duration_secs - 1.7).abs() < 1e-9);
    }

    #[test]
    fn non_json_lines_yield_none() {
        assert!(parse("build failed\nexit status 1\n").is_none());
    }
}
