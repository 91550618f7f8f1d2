//! patchcheck CLI - F2P/P2P test verification for pull requests.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use patchcheck::config;
use patchcheck::orchestrator::{Orchestrator, PrRequest};
use patchcheck::registry;

#[derive(Parser)]
#[command(name = "patchcheck")]
#[command(about = "F2P/P2P test verification for pull requests", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "patchcheck.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full F2P/P2P analysis on a PR's base/head commits
    Run {
        /// Base commit SHA (before the PR)
        #[arg(long)]
        base: String,

        /// Head commit SHA (the PR's tip)
        #[arg(long)]
        head: String,

        /// PR number, for display and output only
        #[arg(long, default_value_t = 0)]
        pr: i64,

        /// PR title, for display and output only
        #[arg(long, default_value = "")]
        title: String,

        /// Per-stage test timeout override, in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Override runner auto-detection with a language name
        #[arg(long)]
        language: Option<String>,

        /// Print the serialized AnalysisResult instead of a summary
        #[arg(long)]
        json: bool,

        /// Repository path
        #[arg(default_value = ".")]
        repo_path: PathBuf,
    },

    /// Check whether a repository can be analyzed at all
    Preflight {
        /// Override runner auto-detection with a language name
        #[arg(long)]
        language: Option<String>,

        /// Print the serialized PreflightReport instead of text
        #[arg(long)]
        json: bool,

        /// Repository path
        #[arg(default_value = ".")]
        repo_path: PathBuf,
    },

    /// Show every runner that detects against a repository
    Detect {
        /// Override runner auto-detection with a language name
        #[arg(long)]
        language: Option<String>,

        /// Repository path
        #[arg(default_value = ".")]
        repo_path: PathBuf,
    },

    /// List every registered runner, detected or not
    ListRunners,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let exit_code = match cli.command {
        Commands::Run {
            base,
            head,
            pr,
            title,
            timeout,
            language,
            json,
            repo_path,
        } => run_analysis(&cli.config, &repo_path, base, head, pr, title, timeout, language, json).await?,
        Commands::Preflight { language, json, repo_path } => run_preflight(&repo_path, language.as_deref(), json).await?,
        Commands::Detect { language, repo_path } => run_detect(&repo_path, language.as_deref())?,
        Commands::ListRunners => run_list_runners()?,
    };

    std::process::exit(exit_code);
}

#[allow(clippy::too_many_arguments)]
async fn run_analysis(
    config_path: &Path,
    repo_path: &Path,
    base: String,
    head: String,
    pr: i64,
    title: String,
    timeout: Option<u64>,
    language: Option<String>,
    json: bool,
) -> Result<i32> {
    let mut cfg = load_config_or_default(config_path)?;
    if let Some(t) = timeout {
        cfg.analysis.test_timeout_secs = t;
    }
    if language.is_some() {
        cfg.analysis.language_hint = language;
    }

    let orchestrator = Orchestrator::new(repo_path, cfg.analysis);
    let result = orchestrator
        .analyze(PrRequest {
            pr_number: pr,
            pr_title: title,
            base_sha: base,
            head_sha: head,
            pr_files: None,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        patchcheck::report::print_summary(&result);
    }

    let ok = result.success && !result.f2p_tests.is_empty() && !result.p2p_tests.is_empty();
    Ok(if ok { 0 } else { 1 })
}

async fn run_preflight(repo_path: &Path, language_hint: Option<&str>, json: bool) -> Result<i32> {
    let report = patchcheck::preflight::check(repo_path, language_hint).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("can_run: {}", report.can_run);
        if let Some(f) = &report.detected.framework {
            println!(
                "detected: {} ({}, confidence {})",
                f,
                report.detected.language.as_deref().unwrap_or("?"),
                report.detected.confidence.unwrap_or(0)
            );
        }
        for b in &report.blockers {
            println!("BLOCKER [{}]: {}", b.code, b.message);
            if let Some(hint) = &b.install_hint {
                println!("  hint: {hint}");
            }
        }
        for w in &report.warnings {
            println!("WARNING [{}]: {}", w.code, w.message);
        }
    }

    Ok(if report.can_run { 0 } else { 1 })
}

fn run_detect(repo_path: &Path, language_hint: Option<&str>) -> Result<i32> {
    let _ = language_hint;
    let candidates = registry::get_all_detected_runners(repo_path);
    if candidates.is_empty() {
        println!("No runners detected for {}", repo_path.display());
        return Ok(1);
    }
    for (runner, score) in &candidates {
        println!("{:>3}  {:<12} {}", score, runner.name(), runner.language());
    }
    Ok(0)
}

fn run_list_runners() -> Result<i32> {
    for info in registry::list_available_runners() {
        println!("{:<12} {}", info.name, info.language);
    }
    Ok(0)
}

fn load_config_or_default(path: &Path) -> Result<config::Config> {
    if path.exists() {
        config::load_config(path).with_context(|| format!("Failed to load config from {}", path.display()))
    } else {
        Ok(config::Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["patchcheck", "run", "--base", "abc", "--head", "def", "."]);
        match cli.command {
            Commands::Run { base, head, .. } => {
                assert_eq!(base, "abc");
                assert_eq!(head, "def");
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn cli_parses_list_runners() {
        let cli = Cli::parse_from(["patchcheck", "list-runners"]);
        assert!(matches!(cli.command, Commands::ListRunners));
    }
}
