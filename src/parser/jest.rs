//! Jest/Vitest JSON output parsing.
//!
//! Grounded on `examples/original_source/parsers.py`'s `parse_jest_json`
//! (Vitest's `--reporter=json` output shares the same shape, so
//! `parse_vitest` just delegates).

use serde::Deserialize;

use crate::runner::RunResult;

#[derive(Deserialize)]
struct JestReport {
    #[serde(default)]
    #[serde(rename = "startTime")]
    start_time: Option<f64>,
    #[serde(default)]
    #[serde(rename = "endTime")]
    end_time: Option<f64>,
    #[serde(default, rename = "testResults")]
    test_results: Vec<JestFile>,
}

#[derive(Deserialize)]
struct JestFile {
    #[serde(default, rename = "assertionResults")]
    assertion_results: Vec<JestAssertion>,
}

#[derive(Deserialize)]
struct JestAssertion {
    #[serde(default, rename = "fullName")]
    full_name: Option<String>,
    #[serde(default, rename = "ancestorTitles")]
    ancestor_titles: Vec<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    status: String,
}

pub fn parse(json: &str) -> Option<RunResult> {
    let report: JestReport = serde_json::from_str(json).ok()?;

    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();

    for file in &report.test_results {
        for a in &file.assertion_results {
            let name = a.full_name.clone().unwrap_or_else(|| {
                if a.ancestor_titles.is_empty() {
                    a.title.clone()
                } else {
                    format!("{} {}", a.ancestor_titles.join(" "), a.title)
                }
            });
            match a.status.as_str() {
                "passed" => passed.push(name),
                "failed" => failed.push(name),
                "pending" | "skipped" | "todo" => skipped.push(name),
                _ => {}
            }
        }
    }

    let duration_secs = match (report.start_time, report.end_time) {
        (Some(s), Some(e)) => (e - s) / 1000.0,
        _ => 0.0,
    };

    Some(RunResult {
        passed,
        failed,
        skipped,
        duration_secs,
        raw_output: json.to_string(),
        error: None,
        unstable_identifiers: false,
    })
}

/// Vitest's JSON reporter output has the same shape as Jest's.
pub fn parse_vitest(json: &str) -> Option<RunResult> {
    parse(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_passed_and_failed() {
        let json = r#"{
            "startTime": 1000,
            "endTime": 2500,
            "testResults": [{
                "assertionResults": [
                    {"fullName": "login works", "status": "passed"},
                    {"title": "logout", "ancestorTitles": ["Auth"], "status": "failed"}
                ]
            }]
        }"#;
        let result = parse(json).unwrap();
        assert_eq!(result.passed, vec!["login works"]);
        assert_eq!(result.failed, vec!["Auth logout"]);
        assert!((result.duration_secs - 1.5).abs() < 1e-9);
    }
}
