//! .NET test runner (`dotnet test`).
//!
//! Grounded on `examples/original_source/dotnet.py` in full. Overrides
//! [`Runner::versions_compatible`] as "current major version is at least
//! the required one", matching jvm.py's Maven/Gradle policy rather than the
//! trait default.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::trx;
use crate::runner::exec::{read_to_string_lossy, run_command};
use crate::runner::{Runner, RunnerError, RunnerResult, RunResult};

static TARGET_FRAMEWORK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<TargetFramework>net(\d+)").unwrap());
static DOTNET_VERSION_OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());
static DOTNET_SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Failed:\s*(\d+),\s*Passed:\s*(\d+),\s*Skipped:\s*(\d+)").unwrap());

fn walk_files_with_ext(dir: &Path, ext: &str) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&d) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some(ext) {
                out.push(path);
            }
        }
    }
    out
}

fn get_required_dotnet_version(repo_path: &Path) -> Option<String> {
    if let Some(content) = read_to_string_lossy(&repo_path.join("global.json"))
        && let Ok(json) = serde_json::from_str::<serde_json::Value>(&content)
        && let Some(sdk_version) = json.get("sdk").and_then(|s| s.get("version")).and_then(|v| v.as_str())
    {
        let leading_digits: String = sdk_version.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !leading_digits.is_empty() {
            return Some(leading_digits);
        }
    }

    for csproj in walk_files_with_ext(repo_path, "csproj") {
        if let Some(content) = read_to_string_lossy(&csproj)
            && let Some(caps) = TARGET_FRAMEWORK_RE.captures(&content)
        {
            return Some(caps[1].to_string());
        }
    }
    None
}

pub struct DotNetRunner;

#[async_trait]
impl Runner for DotNetRunner {
    fn name(&self) -> &'static str {
        "dotnet"
    }

    fn language(&self) -> &'static str {
        "C#"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;

        let has_sln = std::fs::read_dir(repo_path)
            .map(|entries| entries.flatten().any(|e| e.path().extension().and_then(|x| x.to_str()) == Some("sln")))
            .unwrap_or(false);
        if has_sln {
            score += 40;
        }

        let csproj_files = walk_files_with_ext(repo_path, "csproj");
        if !csproj_files.is_empty() {
            score += 40;
            let has_test_refs = csproj_files.iter().any(|p| {
                read_to_string_lossy(p).is_some_and(|content| {
                    let lower = content.to_lowercase();
                    ["xunit", "nunit", "mstest", "test"].iter().any(|fw| lower.contains(fw))
                })
            });
            if has_test_refs {
                score += 20;
            }
        }

        if !walk_files_with_ext(repo_path, "fsproj").is_empty() {
            score += 30;
        }

        if repo_path.join("global.json").exists() {
            score += 10;
        }

        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        let out = run_command("dotnet", &["--version"], Path::new("."), Duration::from_secs(10)).await;
        match out {
            Ok(o) if o.success() => (true, format!(".NET SDK {}", o.stdout.trim())),
            Ok(o) => (false, o.stderr),
            Err(e) => (false, e.to_string()),
        }
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        get_required_dotnet_version(repo_path)
    }

    fn versions_compatible(&self, required: &str, current: &str) -> bool {
        match (required.parse::<i64>(), current.parse::<i64>()) {
            (Ok(r), Ok(c)) => c >= r,
            _ => true,
        }
    }

    async fn check_version_compatible(&self, repo_path: &Path) -> (bool, Option<String>) {
        let Some(required) = self.required_version(repo_path) else {
            return (true, None);
        };
        let out = run_command("dotnet", &["--version"], Path::new("."), Duration::from_secs(10)).await;
        let Ok(out) = out else {
            return (false, Some(".NET SDK not installed".to_string()));
        };
        let Some(current) = DOTNET_VERSION_OUTPUT_RE.captures(&out.stdout).map(|c| c[1].to_string()) else {
            return (true, None);
        };
        if !self.versions_compatible(&required, &current) {
            return (
                false,
                Some(format!("repo requires .NET {required}, but {current} is installed")),
            );
        }
        (true, None)
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        let restore = run_command("dotnet", &["restore"], repo_path, timeout).await?;
        if !restore.success() {
            return Err(RunnerError::InstallFailed(format!("dotnet restore failed: {}", restore.stderr)));
        }
        let build = run_command("dotnet", &["build", "--no-restore"], repo_path, timeout).await?;
        if build.success() {
            Ok(())
        } else {
            Err(RunnerError::InstallFailed(format!("dotnet build failed: {}", build.stderr)))
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let trx_path = std::env::temp_dir().join(format!("patchcheck-dotnet-{}", std::process::id())).join("results.trx");
        if let Some(parent) = trx_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let logger_arg = format!("trx;LogFileName={}", trx_path.display());

        let result = run_command(
            "dotnet",
            &["test", "--no-build", "--logger", &logger_arg, "--verbosity", "normal"],
            repo_path,
            timeout,
        )
        .await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        if let Some(xml) = read_to_string_lossy(&trx_path) {
            let _ = std::fs::remove_file(&trx_path);
            if let Some(mut parsed) = trx::parse(&xml) {
                parsed.raw_output = combined;
                return parsed;
            }
        }

        for trx_file in walk_files_with_ext(repo_path, "trx") {
            if let Some(xml) = read_to_string_lossy(&trx_file)
                && let Some(mut parsed) = trx::parse(&xml)
                && parsed.total_tests() > 0
            {
                parsed.raw_output = combined;
                return parsed;
            }
        }

        let mut passed = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        if let Some(caps) = DOTNET_SUMMARY_RE.captures(&combined) {
            let fail_count: i64 = caps[1].parse().unwrap_or(0);
            let pass_count: i64 = caps[2].parse().unwrap_or(0);
            let skip_count: i64 = caps[3].parse().unwrap_or(0);
            passed = (0..pass_count).map(|i| format!("test_{i}")).collect();
            failed = (0..fail_count).map(|i| format!("failed_test_{i}")).collect();
            skipped = (0..skip_count).map(|i| format!("skipped_test_{i}")).collect();
        }

        let total = passed.len() + failed.len() + skipped.len();
        let error = if total == 0 {
            if combined.to_lowercase().contains("no test") {
                Some("No tests found".to_string())
            } else if !output.success() {
                Some(format!("dotnet test failed with exit code {}", output.status))
            } else {
                None
            }
        } else {
            None
        };

        RunResult {
            passed,
            failed,
            skipped,
            duration_secs: 0.0,
            raw_output: combined,
            error,
            unstable_identifiers: total > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dotnet_project_with_test_refs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("App.sln"), "").unwrap();
        std::fs::write(dir.path().join("App.csproj"), "<Project><ItemGroup><PackageReference Include=\"xunit\"/></ItemGroup></Project>").unwrap();
        let runner = DotNetRunner;
        assert_eq!(runner.detect(dir.path()), 100);
    }

    #[test]
    fn dotnet_version_policy_is_at_least() {
        let runner = DotNetRunner;
        assert!(runner.versions_compatible("6", "8"));
        assert!(!runner.versions_compatible("8", "6"));
    }
}
