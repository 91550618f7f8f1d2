//! JUnit XML parsing (pytest, JVM, .NET's `dotnet test --logger junit`, and
//! any tool that emits the format).
//!
//! Event-driven `quick_xml::Reader` parse, grounded on the read half of
//! `src/report/junit.rs`'s `parse_testsuite_xml` — extended here to walk a
//! `<testsuites>` root's children as well as a bare `<testsuite>` root.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::runner::RunResult;

fn get_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| String::from_utf8(a.value.to_vec()).ok())
}

fn get_attr_f64(e: &BytesStart, name: &[u8]) -> f64 {
    get_attr(e, name).and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

/// Parses JUnit XML content. Returns `None` if the document has no
/// `<testcase>` elements at all (malformed or a different format entirely).
pub fn parse(xml: &str) -> Option<RunResult> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    let mut total_time = 0.0;

    let mut current_name = String::new();
    let mut current_failed = false;
    let mut current_skipped = false;
    let mut in_testcase = false;
    let mut saw_testcase = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                match e.name().as_ref() {
                    b"testcase" => {
                        saw_testcase = true;
                        in_testcase = true;
                        let classname = get_attr(&e, b"classname").unwrap_or_default();
                        let name = get_attr(&e, b"name").unwrap_or_default();
                        current_name = if classname.is_empty() {
                            name
                        } else {
                            format!("{classname}::{name}")
                        };
                        total_time += get_attr_f64(&e, b"time");
                        current_failed = false;
                        current_skipped = false;
                    }
                    b"failure" | b"error" if in_testcase => {
                        current_failed = true;
                    }
                    b"skipped" if in_testcase => {
                        current_skipped = true;
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"testcase" {
                    saw_testcase = true;
                    let classname = get_attr(&e, b"classname").unwrap_or_default();
                    let name = get_attr(&e, b"name").unwrap_or_default();
                    let full_name = if classname.is_empty() {
                        name
                    } else {
                        format!("{classname}::{name}")
                    };
                    total_time += get_attr_f64(&e, b"time");
                    passed.push(full_name);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"testcase" && in_testcase {
                    if current_failed {
                        failed.push(std::mem::take(&mut current_name));
                    } else if current_skipped {
                        skipped.push(std::mem::take(&mut current_name));
                    } else {
                        passed.push(std::mem::take(&mut current_name));
                    }
                    in_testcase = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    if !saw_testcase {
        return None;
    }

    Some(RunResult {
        passed,
        failed,
        skipped,
        duration_secs: total_time,
        raw_output: xml.to_string(),
        error: None,
        unstable_identifiers: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_testsuite_root() {
        let xml = r#"<testsuite name="s" tests="2" failures="1">
            <testcase classname="a.b" name="ok" time="0.1"/>
            <testcase classname="a.b" name="bad" time="0.2">
                <failure message="boom">trace</failure>
            </testcase>
        </testsuite>"#;
        let result = parse(xml).unwrap();
        assert_eq!(result.passed, vec!["a.b::ok"]);
        assert_eq!(result.failed, vec!["a.b::bad"]);
        assert!((result.duration_secs - 0.3).abs() < 1e-9);
    }

    #[test]
    fn parses_testsuites_wrapper_root() {
        let xml = r#"<testsuites>
            <testsuite name="s1">
                <testcase classname="x" name="one" time="0.0"/>
            </testsuite>
            <testsuite name="s2">
                <testcase classname="y" name="two" time="0.0">
                    <skipped/>
                </testcase>
            </testsuite>
        </testsuites>"#;
        let result = parse(xml).unwrap();
        assert_eq!(result.passed, vec!["x::one"]);
        assert_eq!(result.skipped, vec!["y::two"]);
    }

    #[test]
    fn non_junit_input_returns_none() {
        assert!(parse("<html><body>not junit</body></html>").is_none());
    }
}
