//! Mocha JSON reporter output parsing.
//!
//! Grounded on `examples/original_source/parsers.py`'s `parse_mocha_json`.

use serde::Deserialize;

use crate::runner::RunResult;

#[derive(Deserialize)]
struct MochaReport {
    #[serde(default)]
    stats: MochaStats,
    #[serde(default)]
    passes: Vec<MochaTest>,
    #[serde(default)]
    failures: Vec<MochaTest>,
    #[serde(default)]
    pending: Vec<MochaTest>,
}

#[derive(Deserialize, Default)]
struct MochaStats {
    #[serde(default)]
    duration: f64,
}

#[derive(Deserialize)]
struct MochaTest {
    #[serde(default, rename = "fullTitle")]
    full_title: Option<String>,
    #[serde(default)]
    title: String,
}

fn name_of(t: &MochaTest) -> String {
    t.full_title.clone().unwrap_or_else(|| t.title.clone())
}

pub fn parse(json: &str) -> Option<RunResult> {
    let report: MochaReport = serde_json::from_str(json).ok()?;

    Some(RunResult {
        passed: report.passes.iter().map(name_of).collect(),
        failed: report.failures.iter().map(name_of).collect(),
        skipped: report.pending.iter().map(name_of).collect(),
        duration_secs: report.stats.duration / 1000.0,
        raw_output: json.to_string(),
        error: None,
        unstable_identifiers: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mocha_shape() {
        let json = r#"{
            "stats": {"duration": 1500},
            "passes": [{"fullTitle": "Suite test1"}],
            "failures": [{"title": "test2"}],
            "pending": [{"fullTitle": "Suite test3"}]
        }"#;
        let result = parse(json).unwrap();
        assert_eq!(result.passed, vec!["Suite test1"]);
        assert_eq!(result.failed, vec!["test2"]);
        assert_eq!(result.skipped, vec!["Suite test3"]);
        assert!((result.duration_secs - 1.5).abs() < 1e-9);
    }
}
