//! .NET TRX (Visual Studio Test Results) format parsing.
//!
//! Grounded on `examples/original_source/parsers.py`'s `parse_dotnet_trx`,
//! re-expressed as a `quick_xml` streaming parse per this crate's JUnit
//! parser idiom rather than a DOM tree.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::runner::RunResult;

fn get_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| String::from_utf8(a.value.to_vec()).ok())
}

fn parse_hms(duration: &str) -> f64 {
    let parts: Vec<&str> = duration.split(':').collect();
    if parts.len() != 3 {
        return 0.0;
    }
    let hours: f64 = parts[0].parse().unwrap_or(0.0);
    let minutes: f64 = parts[1].parse().unwrap_or(0.0);
    let seconds: f64 = parts[2].parse().unwrap_or(0.0);
    hours * 3600.0 + minutes * 60.0 + seconds
}

pub fn parse(xml: &str) -> Option<RunResult> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    let mut total_time = 0.0;
    let mut saw_result = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                // quick-xml strips namespace prefixes from local_name()
                if e.local_name().as_ref() == b"UnitTestResult" {
                    saw_result = true;
                    let name = get_attr(&e, b"testName").unwrap_or_default();
                    let outcome = get_attr(&e, b"outcome").unwrap_or_default();
                    let duration = get_attr(&e, b"duration").unwrap_or_default();
                    total_time += parse_hms(&duration);
                    match outcome.as_str() {
                        "Passed" => passed.push(name),
                        "Failed" => failed.push(name),
                        "NotExecuted" | "Inconclusive" => skipped.push(name),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    if !saw_result {
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
    fn parses_trx_results() {
        let xml = r#"<TestRun xmlns="http://microsoft.com/schemas/VisualStudio/TeamTest/2010">
            <Results>
                <UnitTestResult testName="Namespace.Class.TestOne" outcome="Passed" duration="00:00:01.500"/>
                <UnitTestResult testName="Namespace.Class.TestTwo" outcome="Failed" duration="00:00:00.250"/>
            </Results>
        </TestRun>"#;
        let result = parse(xml).unwrap();
        assert_eq!(result.passed, vec!["Namespace.Class.TestOne"]);
        assert_eq!(result.failed, vec!["Namespace.Class.TestTwo"]);
        assert!((result.duration_secs - 1.75).abs() < 1e-9);
    }
}
