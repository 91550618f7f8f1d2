//! Output Parser subsystem: turns raw test-tool output into a normalized
//! [`crate::runner::RunResult`].
//!
//! Each format lives in its own submodule as a pure `fn(&str) -> Option<RunResult>`
//! (or `fn(&Path) -> Option<RunResult>` for formats read from a result
//! file). `None` means "this text is not in this format", never "zero
//! tests" — a genuinely empty, well-formed report still returns `Some`
//! with empty lists so the orchestrator can tell "parsed, nothing ran"
//! apart from "could not parse".
//!
//! [`ParserChain`] tries a runner-declared list of formats in order and
//! takes the first that both recognizes the input and reports at least
//! one test, then falls back to a bare summary-count scrape if nothing
//! else matched or everything that matched came back empty (see
//! [`text_fallback::parse_summary_counts`]).

pub mod cargo_test;
pub mod go_test;
pub mod jest;
pub mod junit;
pub mod mocha;
pub mod rspec;
pub mod text_fallback;
pub mod trx;

use crate::runner::RunResult;

/// One parseable output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    JunitXml,
    JestJson,
    VitestJson,
    MochaJson,
    RSpecJson,
    GoTestJson,
    CargoTest,
    TrxXml,
    PytestText,
    UnittestText,
    CTestText,
    Tap,
}

impl Format {
    fn try_parse(self, text: &str) -> Option<RunResult> {
        match self {
            Format::JunitXml => junit::parse(text),
            Format::JestJson => jest::parse(text),
            Format::VitestJson => jest::parse_vitest(text),
            Format::MochaJson => mocha::parse(text),
            Format::RSpecJson => rspec::parse(text),
            Format::GoTestJson => go_test::parse(text),
            Format::CargoTest => cargo_test::parse(text),
            Format::TrxXml => trx::parse(text),
            Format::PytestText => text_fallback::parse_pytest(text),
            Format::UnittestText => text_fallback::parse_unittest(text),
            Format::CTestText => text_fallback::parse_ctest(text),
            Format::Tap => text_fallback::parse_tap(text),
        }
    }
}

/// An ordered fallback chain of formats to try against one blob of text
/// (or file contents). Runners build a chain matching their own
/// structured-output preference, e.g. JUnit XML first, plain stdout second.
pub struct ParserChain {
    formats: Vec<Format>,
}

impl ParserChain {
    pub fn new(formats: Vec<Format>) -> Self {
        Self { formats }
    }

    /// Tries each format in order; on the first that both recognizes `text`
    /// and reports at least one test, returns its result. A format that
    /// matches but collects zero tests is not a win — it falls through to
    /// the next format, since a well-formed-but-empty report from the wrong
    /// format (e.g. a Vitest run misread by the Jest parser) looks exactly
    /// like this. If every declared format fails or comes back empty,
    /// makes one last attempt to scrape a bare summary count before giving
    /// up.
    pub fn parse(&self, text: &str) -> Option<RunResult> {
        for format in &self.formats {
            if let Some(result) = format.try_parse(text)
                && result.total_tests() > 0
            {
                return Some(result);
            }
        }
        text_fallback::parse_summary_counts(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_falls_through_to_next_format() {
        let chain = ParserChain::new(vec![Format::JunitXml, Format::PytestText]);
        let output = "tests/test_a.py::test_one PASSED\nin 0.01s";
        let result = chain.parse(output).unwrap();
        assert_eq!(result.passed, vec!["tests/test_a.py::test_one"]);
    }

    #[test]
    fn chain_falls_back_to_summary_counts() {
        let chain = ParserChain::new(vec![Format::JunitXml, Format::PytestText]);
        let result = chain.parse("2 passed, 0 failed in 0.01s").unwrap();
        assert!(result.unstable_identifiers);
    }

    #[test]
    fn chain_does_not_stop_on_a_well_formed_but_empty_match() {
        // A well-formed but empty report (zero testResults) matches
        // Format::JestJson with total_tests() == 0. That must not be
        // treated as a win: every format in the chain reports the same
        // zero count here, so the chain should fall all the way through
        // to the summary-count scrape (which also fails on JSON), not
        // stop at the first empty match.
        let chain = ParserChain::new(vec![Format::JestJson, Format::VitestJson]);
        let empty_report = r#"{"testResults": []}"#;
        assert!(chain.parse(empty_report).is_none());
    }
}
