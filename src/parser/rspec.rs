//! RSpec `--format json` output parsing.
//!
//! Grounded on `examples/original_source/parsers.py`'s `parse_rspec_json`.

use serde::Deserialize;

use crate::runner::RunResult;

#[derive(Deserialize)]
struct RSpecReport {
    #[serde(default)]
    examples: Vec<RSpecExample>,
    #[serde(default)]
    summary: RSpecSummary,
}

#[derive(Deserialize, Default)]
struct RSpecSummary {
    #[serde(default)]
    duration: f64,
}

#[derive(Deserialize)]
struct RSpecExample {
    #[serde(default, rename = "full_description")]
    full_description: String,
    #[serde(default)]
    status: String,
}

pub fn parse(json: &str) -> Option<RunResult> {
    let report: RSpecReport = serde_json::from_str(json).ok()?;

    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();

    for e in &report.examples {
        match e.status.as_str() {
            "passed" => passed.push(e.full_description.clone()),
            "failed" => failed.push(e.full_description.clone()),
            "pending" | "skipped" => skipped.push(e.full_description.clone()),
            _ => {}
        }
    }

    Some(RunResult {
        passed,
        failed,
        skipped,
        duration_secs: report.summary.duration,
        raw_output: json.to_string(),
        error: None,
        unstable_identifiers: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rspec_shape() {
        let json = r#"{
            "examples": [
                {"full_description": "User login", "status": "passed"},
                {"full_description": "User logout", "status": "failed"}
            ],
            "summary": {"duration": 1.5}
        }"#;
        let result = parse(json).unwrap();
        assert_eq!(result.passed, vec!["User login"]);
        assert_eq!(result.failed, vec!["User logout"]);
    }
}
