//! F2P/P2P classification and result validation.
//!
//! Grounded on `examples/original_source/analyzer.py`'s `generate_test_report`
//! (Rule A/B and the reclassification pass order) and
//! `validate_f2p_p2p_result` (the eight rejection codes and
//! `UNSTABLE_PATTERNS`, both preserved verbatim). See DESIGN.md's "Open
//! Question decisions" for how the reclassification order and placeholder-
//! identifier filtering are resolved here.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::runner::TestOutcome;

/// Per-test status maps for one stage, keyed by (possibly package-prefixed)
/// test identifier.
pub type StatusMap = HashMap<String, TestOutcome>;

/// The four classification lists, each sorted lexicographically with no
/// duplicates (P1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationReport {
    pub fail_to_pass: Vec<String>,
    pub pass_to_pass: Vec<String>,
    pub fail_to_fail: Vec<String>,
    pub pass_to_fail: Vec<String>,
}

/// The eight validator rejection codes, in the order `analyzer.py`'s
/// `validate_f2p_p2p_result` checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCode {
    EmptyF2p,
    EmptyP2p,
    DuplicateTestNames,
    UnstableTestName,
    FailedBaseInP2p,
    FailedAfterInF2pP2p,
    P2pMissingBaseNotPassingBefore,
    TestNotInAllStages,
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionCode::EmptyF2p => "empty_f2p",
            RejectionCode::EmptyP2p => "empty_p2p",
            RejectionCode::DuplicateTestNames => "duplicate_test_names",
            RejectionCode::UnstableTestName => "unstable_test_name",
            RejectionCode::FailedBaseInP2p => "failed_base_in_p2p",
            RejectionCode::FailedAfterInF2pP2p => "failed_after_in_f2p_p2p",
            RejectionCode::P2pMissingBaseNotPassingBefore => "p2p_missing_base_not_passing_before",
            RejectionCode::TestNotInAllStages => "test_not_in_all_stages",
        };
        f.write_str(s)
    }
}

impl Serialize for RejectionCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

static UNSTABLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\d{10,13}",
        r"(?i)\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}",
        r"(?i)built in \d+(\.\d+)?s",
        r"(?i)in \d+(\.\d+)?\s*(ms|s|sec|seconds)",
        r"(?i)[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}",
        r"(?i)0x[a-f0-9]{8,}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

fn has_unstable_pattern(test_name: &str) -> bool {
    UNSTABLE_PATTERNS.iter().any(|re| re.is_match(test_name))
}

fn dedup_push(list: &mut Vec<String>, seen: &mut HashSet<String>, item: String) {
    if seen.insert(item.clone()) {
        list.push(item);
    }
}

/// Computes F2P/P2P/F2F/P2F from the three stage maps. `has_new_test_file`
/// and "is `before` mixed" jointly select Rule A vs Rule B per §4.5.
pub fn classify(
    tests_base: &StatusMap,
    tests_before: &StatusMap,
    tests_after: &StatusMap,
    has_new_test_file: bool,
) -> ClassificationReport {
    let before_mixed = tests_before.values().any(|s| s.is_passing()) && tests_before.values().any(|s| s.is_failing());

    let mut report = ClassificationReport::default();

    if has_new_test_file || !before_mixed {
        let base_passing: HashSet<&String> = tests_base.iter().filter(|(_, s)| s.is_passing()).map(|(t, _)| t).collect();
        let after_passing: Vec<&String> = tests_after.iter().filter(|(_, s)| s.is_passing()).map(|(t, _)| t).collect();

        let mut f2p: Vec<String> = Vec::new();
        let mut p2p: Vec<String> = Vec::new();
        for t in &after_passing {
            if base_passing.contains(*t) {
                p2p.push((*t).clone());
            } else {
                f2p.push((*t).clone());
            }
        }

        // Reclassify F2P -> P2P: tests passing in `before` weren't newly fixed.
        let before_passing: HashSet<&String> = tests_before.iter().filter(|(_, s)| s.is_passing()).map(|(t, _)| t).collect();
        let mut reclassify_to_p2p = Vec::new();
        f2p.retain(|t| {
            if before_passing.contains(t) {
                reclassify_to_p2p.push(t.clone());
                false
            } else {
                true
            }
        });
        let mut p2p_seen: HashSet<String> = p2p.iter().cloned().collect();
        for t in reclassify_to_p2p {
            dedup_push(&mut p2p, &mut p2p_seen, t);
        }

        // Reclassify P2P -> F2P: tests failing in `before` weren't stably passing.
        let before_failing: HashSet<&String> = tests_before.iter().filter(|(_, s)| s.is_failing()).map(|(t, _)| t).collect();
        let mut reclassify_to_f2p = Vec::new();
        p2p.retain(|t| {
            if before_failing.contains(t) {
                reclassify_to_f2p.push(t.clone());
                false
            } else {
                true
            }
        });
        let mut f2p_seen: HashSet<String> = f2p.iter().cloned().collect();
        for t in reclassify_to_f2p {
            dedup_push(&mut f2p, &mut f2p_seen, t);
        }

        f2p.sort();
        p2p.sort();
        report.fail_to_pass = f2p;
        report.pass_to_pass = p2p;
    } else {
        let mut all_tests: HashSet<&String> = tests_before.keys().collect();
        all_tests.extend(tests_after.keys());

        for test in all_tests {
            let before_passing = tests_before.get(test).is_some_and(|s| s.is_passing());
            let before_failing = tests_before.get(test).is_some_and(|s| s.is_failing());
            let after_passing = tests_after.get(test).is_some_and(|s| s.is_passing());
            let after_failing = tests_after.get(test).is_some_and(|s| s.is_failing());

            if before_failing && after_passing {
                report.fail_to_pass.push(test.clone());
            } else if before_passing && after_passing {
                report.pass_to_pass.push(test.clone());
            } else if before_passing && after_failing {
                report.pass_to_fail.push(test.clone());
            } else if before_failing && after_failing {
                report.fail_to_fail.push(test.clone());
            }
        }
        report.fail_to_pass.sort();
        report.pass_to_pass.sort();
        report.fail_to_fail.sort();
        report.pass_to_fail.sort();
    }

    report
}

/// Validates a classification against the eight rejection rules, in the
/// order `validate_f2p_p2p_result` checks them. `language` gates the
/// unstable-identifier check to JS/TS/C++ only.
pub fn validate(
    f2p_tests: &[String],
    p2p_tests: &[String],
    tests_base: &StatusMap,
    tests_before: &StatusMap,
    tests_after: &StatusMap,
    language: Option<&str>,
) -> Option<RejectionCode> {
    if f2p_tests.is_empty() {
        return Some(RejectionCode::EmptyF2p);
    }
    if p2p_tests.is_empty() {
        return Some(RejectionCode::EmptyP2p);
    }

    let all_f2p_p2p: Vec<&String> = f2p_tests.iter().chain(p2p_tests.iter()).collect();

    if let Some(lang) = language {
        let lang_lower = lang.to_lowercase();
        if matches!(lang_lower.as_str(), "javascript" | "typescript" | "c++" | "cpp")
            && all_f2p_p2p.iter().any(|t| has_unstable_pattern(t))
        {
            return Some(RejectionCode::UnstableTestName);
        }
    }

    let unique: HashSet<&&String> = all_f2p_p2p.iter().collect();
    if unique.len() != all_f2p_p2p.len() {
        return Some(RejectionCode::DuplicateTestNames);
    }

    if p2p_tests.iter().any(|t| tests_base.get(t).is_some_and(|s| s.is_failing())) {
        return Some(RejectionCode::FailedBaseInP2p);
    }

    if all_f2p_p2p
        .iter()
        .any(|t| !tests_after.contains_key(t.as_str()) || tests_after.get(t.as_str()).is_some_and(|s| s.is_failing()))
    {
        return Some(RejectionCode::FailedAfterInF2pP2p);
    }

    for t in p2p_tests {
        if !tests_base.contains_key(t) && !tests_before.get(t).is_some_and(|s| s.is_passing()) {
            return Some(RejectionCode::P2pMissingBaseNotPassingBefore);
        }
    }

    for t in &all_f2p_p2p {
        let ran_count =
            tests_base.contains_key(t.as_str()) as u8 + tests_before.contains_key(t.as_str()) as u8 + tests_after.contains_key(t.as_str()) as u8;
        if ran_count < 3 {
            let absent_only_from_base = !tests_base.contains_key(t.as_str());
            if !absent_only_from_base {
                return Some(RejectionCode::TestNotInAllStages);
            }
        }
    }

    None
}

/// Convenience wrapper composing [`classify`] and [`validate`].
pub fn classify_and_validate(
    tests_base: &StatusMap,
    tests_before: &StatusMap,
    tests_after: &StatusMap,
    has_new_test_file: bool,
    language: Option<&str>,
) -> (ClassificationReport, Option<RejectionCode>) {
    let report = classify(tests_base, tests_before, tests_after, has_new_test_file);
    let rejection = validate(
        &report.fail_to_pass,
        &report.pass_to_pass,
        tests_base,
        tests_before,
        tests_after,
        language,
    );
    (report, rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::TestOutcome::{Failed, Passed};

    fn map(pairs: &[(&str, TestOutcome)]) -> StatusMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn scenario_1_new_test_fixed_code() {
        let base = map(&[("T1", Passed), ("T2", Passed)]);
        let before = map(&[("T1", Passed), ("T2", Passed), ("T_new", Failed)]);
        let after = map(&[("T1", Passed), ("T2", Passed), ("T_new", Passed)]);
        let report = classify(&base, &before, &after, true);
        assert_eq!(report.fail_to_pass, vec!["T_new"]);
        assert_eq!(report.pass_to_pass, vec!["T1", "T2"]);
    }

    #[test]
    fn scenario_2_existing_test_flipped_rule_b() {
        let base = map(&[("T1", Failed), ("T2", Passed)]);
        let before = map(&[("T1", Failed), ("T2", Passed)]);
        let after = map(&[("T1", Passed), ("T2", Passed)]);
        let report = classify(&base, &before, &after, false);
        assert_eq!(report.fail_to_pass, vec!["T1"]);
        assert_eq!(report.pass_to_pass, vec!["T2"]);
    }

    #[test]
    fn scenario_3_regression_rejected_empty_f2p() {
        let base = map(&[("T1", Passed)]);
        let before = map(&[("T1", Passed)]);
        let after = map(&[("T1", Failed)]);
        let report = classify(&base, &before, &after, false);
        assert!(report.fail_to_pass.is_empty());
        let rejection = validate(&report.fail_to_pass, &report.pass_to_pass, &base, &before, &after, None);
        assert_eq!(rejection, Some(RejectionCode::EmptyF2p));
    }

    #[test]
    fn scenario_4_unstable_identifier_rejected() {
        let f2p = vec!["perf-0x7f8a1e34b000".to_string()];
        let p2p = vec!["T2".to_string()];
        let base = map(&[("T2", Passed)]);
        let before = map(&[("T2", Passed)]);
        let after = map(&[("perf-0x7f8a1e34b000", Passed), ("T2", Passed)]);
        let rejection = validate(&f2p, &p2p, &base, &before, &after, Some("c++"));
        assert_eq!(rejection, Some(RejectionCode::UnstableTestName));
    }

    #[test]
    fn scenario_5_p2p_ghost_rejected() {
        let f2p = vec!["T1".to_string()];
        let p2p = vec!["Ghost".to_string()];
        let base = map(&[("T1", Failed)]);
        let before = map(&[("T1", Failed)]);
        let after = map(&[("T1", Passed), ("Ghost", Passed)]);
        let rejection = validate(&f2p, &p2p, &base, &before, &after, None);
        assert_eq!(rejection, Some(RejectionCode::P2pMissingBaseNotPassingBefore));
    }

    #[test]
    fn scenario_6_monorepo_prefixes_preserve_uniqueness() {
        let base = map(&[("[web] T1", Passed), ("[api] T1", Failed)]);
        let before = map(&[("[web] T1", Passed), ("[api] T1", Failed)]);
        let after = map(&[("[web] T1", Passed), ("[api] T1", Passed)]);
        let report = classify(&base, &before, &after, false);
        assert_eq!(report.fail_to_pass, vec!["[api] T1"]);
        assert_eq!(report.pass_to_pass, vec!["[web] T1"]);
    }

    #[test]
    fn reclassification_order_f2p_to_p2p_then_p2p_to_f2p() {
        // T1 passes in after but not in base -> initially F2P; also passes in
        // before -> reclassified to P2P. T2 passes in after and base -> P2P
        // initially, but fails in before -> reclassified to F2P.
        let base = map(&[("T2", Passed)]);
        let before = map(&[("T1", Passed), ("T2", Failed)]);
        let after = map(&[("T1", Passed), ("T2", Passed)]);
        let report = classify(&base, &before, &after, true);
        assert_eq!(report.pass_to_pass, vec!["T1"]);
        assert_eq!(report.fail_to_pass, vec!["T2"]);
    }

    #[test]
    fn validator_rejects_duplicate_test_names() {
        let f2p = vec!["T1".to_string()];
        let p2p = vec!["T1".to_string()];
        let base = map(&[("T1", Failed)]);
        let before = map(&[("T1", Failed)]);
        let after = map(&[("T1", Passed)]);
        let rejection = validate(&f2p, &p2p, &base, &before, &after, None);
        assert_eq!(rejection, Some(RejectionCode::DuplicateTestNames));
    }

    #[test]
    fn validator_accepts_valid_result() {
        let f2p = vec!["T1".to_string()];
        let p2p = vec!["T2".to_string()];
        let base = map(&[("T1", Failed), ("T2", Passed)]);
        let before = map(&[("T1", Failed), ("T2", Passed)]);
        let after = map(&[("T1", Passed), ("T2", Passed)]);
        let rejection = validate(&f2p, &p2p, &base, &before, &after, None);
        assert_eq!(rejection, None);
    }
}
