//! Console summary output.
//!
//! Grounded on the teacher's `ConsoleReporter::on_run_complete` (colored
//! `console::style` summary layout), reduced from a streaming per-test
//! `Reporter` trait to a single-shot summary: a three-stage analysis has
//! nothing to stream per-test, only one final classification to print.

use crate::orchestrator::{AnalysisResult, Verdict};

/// Prints the human-readable summary of one analysis to stdout.
pub fn print_summary(result: &AnalysisResult) {
    println!();
    println!("PR #{}: {}", result.pr_number, result.pr_title);
    println!("  {} -> {}", short_sha(&result.base_sha), short_sha(&result.head_sha));
    println!();

    if let Some(err) = &result.error {
        println!("{}", console::style("Analysis could not complete.").red().bold());
        println!("  {}", console::style(err).dim());
        if let Some(code) = result.error_code {
            println!("  error_code: {}", console::style(code.to_string()).red());
        }
        return;
    }

    println!("  Fail-to-Pass: {}", console::style(result.f2p_tests.len()).green());
    for t in &result.f2p_tests {
        println!("    + {t}");
    }
    println!("  Pass-to-Pass: {}", console::style(result.p2p_tests.len()).green());
    for t in &result.p2p_tests {
        println!("    = {t}");
    }
    if !result.f2f_tests.is_empty() {
        println!("  Fail-to-Fail: {}", console::style(result.f2f_tests.len()).yellow());
    }
    if !result.p2f_tests.is_empty() {
        println!("  Pass-to-Fail: {}", console::style(result.p2f_tests.len()).red());
    }

    println!();
    let verdict = result.verdict();
    match verdict {
        Verdict::Valid => println!("{}", console::style("VALID").green().bold()),
        Verdict::Rejected(_) => println!("{}", console::style(verdict.to_string()).red().bold()),
        _ => println!("{}", console::style(verdict.to_string()).yellow().bold()),
    }
}

fn short_sha(sha: &str) -> &str {
    if sha.len() > 10 { &sha[..10] } else { sha }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sha_truncates_long_hashes() {
        assert_eq!(short_sha("abcdef0123456789"), "abcdef0123");
        assert_eq!(short_sha("abc"), "abc");
    }
}
