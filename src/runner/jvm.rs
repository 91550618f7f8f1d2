//! JVM test runners: Maven, Gradle, sbt (Java/Kotlin/Scala).
//!
//! Grounded on `examples/original_source/jvm.py` in full. Maven and Gradle
//! override [`Runner::versions_compatible`] as "current major version is at
//! least the required one" (`int(current) >= int(required)`), distinct from
//! both the trait default (exact major.minor match) and the JS runners'
//! major-or-higher comparison — sbt takes neither override and falls back to
//! the trait default, since the original's `SbtRunner` never defines
//! `_versions_compatible`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::junit;
use crate::runner::exec::{read_to_string_lossy, run_command};
use crate::runner::{Runner, RunnerError, RunnerResult, RunResult};

static POM_SOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<maven\.compiler\.source>(\d+)</maven\.compiler\.source>").unwrap());
static POM_JAVA_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<java\.version>(\d+)</java\.version>").unwrap());
static GRADLE_SOURCE_COMPAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sourceCompatibility\s*=\s*["']?(\d+)"#).unwrap());
static GRADLE_JAVA_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"JavaVersion\.VERSION_(\d+)").unwrap());
static JAVA_VERSION_OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"version\s*"?(\d+)"#).unwrap());
static SCALA_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"scalaVersion\s*:=\s*["'](\d+\.\d+)"#).unwrap());
static SUREFIRE_SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Tests run:\s*(\d+),\s*Failures:\s*(\d+),\s*Errors:\s*(\d+),\s*Skipped:\s*(\d+)").unwrap());
static GRADLE_SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+tests?\s+completed,?\s+(\d+)\s+failed").unwrap());
static SBT_INFO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[info\]\s*[+-]\s*(.+)").unwrap());
static SBT_ERROR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[error\]\s*(.+)").unwrap());

fn get_required_java_version(repo_path: &Path) -> Option<String> {
    if let Some(content) = read_to_string_lossy(&repo_path.join("pom.xml")) {
        if let Some(c) = POM_SOURCE_RE.captures(&content) {
            return Some(c[1].to_string());
        }
        if let Some(c) = POM_JAVA_VERSION_RE.captures(&content) {
            return Some(c[1].to_string());
        }
    }
    for gradle_file in ["build.gradle", "build.gradle.kts"] {
        if let Some(content) = read_to_string_lossy(&repo_path.join(gradle_file)) {
            if let Some(c) = GRADLE_SOURCE_COMPAT_RE.captures(&content) {
                return Some(c[1].to_string());
            }
            if let Some(c) = GRADLE_JAVA_VERSION_RE.captures(&content) {
                return Some(c[1].to_string());
            }
        }
    }
    None
}

async fn check_java_runtime() -> (bool, String) {
    let out = run_command("java", &["-version"], Path::new("."), Duration::from_secs(10)).await;
    match out {
        Ok(o) => {
            let combined = o.combined();
            (true, combined.lines().next().unwrap_or_default().to_string())
        }
        Err(_) => (false, "Java not found".to_string()),
    }
}

async fn current_java_major() -> Option<String> {
    let out = run_command("java", &["-version"], Path::new("."), Duration::from_secs(10)).await.ok()?;
    JAVA_VERSION_OUTPUT_RE.captures(&out.combined()).map(|c| c[1].to_string())
}

fn java_versions_compatible(required: &str, current: &str) -> bool {
    match (required.parse::<i64>(), current.parse::<i64>()) {
        (Ok(r), Ok(c)) => c >= r,
        _ => true,
    }
}

fn parse_xml_reports_dir(dir: &Path, glob_prefix: &str) -> Option<RunResult> {
    if !dir.exists() {
        return None;
    }
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    let mut total_time = 0.0;
    let mut any = false;

    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.starts_with(glob_prefix) || !file_name.ends_with(".xml") {
            continue;
        }
        let Some(content) = read_to_string_lossy(&path) else {
            continue;
        };
        if let Some(result) = junit::parse(&content) {
            any = true;
            passed.extend(result.passed);
            failed.extend(result.failed);
            skipped.extend(result.skipped);
            total_time += result.duration_secs;
        }
    }

    if !any || (passed.is_empty() && failed.is_empty() && skipped.is_empty()) {
        return None;
    }

    Some(RunResult {
        passed,
        failed,
        skipped,
        duration_secs: total_time,
        raw_output: String::new(),
        error: None,
        unstable_identifiers: false,
    })
}

pub struct MavenRunner;

impl MavenRunner {
    fn mvn_cmd(repo_path: &Path) -> &'static str {
        if repo_path.join("mvnw").exists() {
            "./mvnw"
        } else {
            "mvn"
        }
    }
}

#[async_trait]
impl Runner for MavenRunner {
    fn name(&self) -> &'static str {
        "maven"
    }

    fn language(&self) -> &'static str {
        "Java"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;
        if repo_path.join("pom.xml").exists() {
            score += 70;
        }
        if repo_path.join("mvnw").exists() {
            score += 20;
        }
        if repo_path.join("src/main/java").exists() {
            score += 10;
        }
        if repo_path.join("src/test/java").exists() {
            score += 10;
        }
        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        check_java_runtime().await
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        get_required_java_version(repo_path)
    }

    fn versions_compatible(&self, required: &str, current: &str) -> bool {
        java_versions_compatible(required, current)
    }

    async fn check_version_compatible(&self, repo_path: &Path) -> (bool, Option<String>) {
        let Some(required) = self.required_version(repo_path) else {
            return (true, None);
        };
        let Some(current) = current_java_major().await else {
            return (false, Some("Java not installed".to_string()));
        };
        if !self.versions_compatible(&required, &current) {
            return (
                false,
                Some(format!("repo requires Java {required}, but {current} is installed")),
            );
        }
        (true, None)
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        let mvn = Self::mvn_cmd(repo_path);
        let out = run_command(mvn, &["dependency:resolve", "-DskipTests", "-q"], repo_path, timeout).await?;
        if out.success() {
            Ok(())
        } else {
            Err(RunnerError::InstallFailed(format!("mvn dependency:resolve failed: {}", out.stderr)))
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let mvn = Self::mvn_cmd(repo_path);
        let result = run_command(mvn, &["test", "-Dsurefire.useFile=false"], repo_path, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        if let Some(mut parsed) = parse_xml_reports_dir(&repo_path.join("target/surefire-reports"), "TEST-")
            && parsed.total_tests() > 0
        {
            parsed.raw_output = combined;
            return parsed;
        }

        let mut passed = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        if let Some(caps) = SUREFIRE_SUMMARY_RE.captures(&combined) {
            let total: i64 = caps[1].parse().unwrap_or(0);
            let failures: i64 = caps[2].parse().unwrap_or(0);
            let errors: i64 = caps[3].parse().unwrap_or(0);
            let skipped_count: i64 = caps[4].parse().unwrap_or(0);
            let passed_count = (total - failures - errors - skipped_count).max(0);
            passed = (0..passed_count).map(|i| format!("test_{i}")).collect();
            failed = (0..(failures + errors)).map(|i| format!("failed_test_{i}")).collect();
            skipped = (0..skipped_count).map(|i| format!("skipped_test_{i}")).collect();
        }

        let total = passed.len() + failed.len() + skipped.len();
        let error = if total == 0 && !output.success() {
            Some(format!("mvn test failed with exit code {}", output.status))
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

pub struct GradleRunner;

impl GradleRunner {
    fn gradle_cmd(repo_path: &Path) -> &'static str {
        if repo_path.join("gradlew").exists() {
            "./gradlew"
        } else {
            "gradle"
        }
    }
}

#[async_trait]
impl Runner for GradleRunner {
    fn name(&self) -> &'static str {
        "gradle"
    }

    fn language(&self) -> &'static str {
        "Java"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;
        if repo_path.join("build.gradle").exists() {
            score += 60;
        }
        if repo_path.join("build.gradle.kts").exists() {
            score += 60;
        }
        if repo_path.join("gradlew").exists() {
            score += 30;
        }
        if repo_path.join("settings.gradle").exists() || repo_path.join("settings.gradle.kts").exists() {
            score += 10;
        }
        if repo_path.join("src/main/java").exists() {
            score += 10;
        }
        if repo_path.join("src/main/kotlin").exists() {
            score += 10;
        }
        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        let out = run_command("gradle", &["--version"], Path::new("."), Duration::from_secs(30)).await;
        match out {
            Ok(o) if o.success() => (true, o.combined().lines().next().unwrap_or_default().to_string()),
            _ => check_java_runtime().await,
        }
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        get_required_java_version(repo_path)
    }

    fn versions_compatible(&self, required: &str, current: &str) -> bool {
        java_versions_compatible(required, current)
    }

    async fn check_version_compatible(&self, repo_path: &Path) -> (bool, Option<String>) {
        let Some(required) = self.required_version(repo_path) else {
            return (true, None);
        };
        let Some(current) = current_java_major().await else {
            return (false, Some("Java not installed".to_string()));
        };
        if !self.versions_compatible(&required, &current) {
            return (
                false,
                Some(format!("repo requires Java {required}, but {current} is installed")),
            );
        }
        (true, None)
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        let gradle = Self::gradle_cmd(repo_path);
        let out = run_command(gradle, &["dependencies", "--quiet"], repo_path, timeout).await?;
        if out.success() {
            return Ok(());
        }
        let fallback = run_command(gradle, &["build", "-x", "test", "--quiet"], repo_path, timeout).await?;
        if fallback.success() {
            Ok(())
        } else {
            Err(RunnerError::InstallFailed(format!("gradle dependencies failed: {}", out.stderr)))
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let gradle = Self::gradle_cmd(repo_path);
        let result = run_command(gradle, &["test"], repo_path, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        if let Some(mut parsed) = parse_xml_reports_dir(&repo_path.join("build/test-results/test"), "TEST-")
            && parsed.total_tests() > 0
        {
            parsed.raw_output = combined;
            return parsed;
        }

        let mut passed = Vec::new();
        let mut failed = Vec::new();
        if let Some(caps) = GRADLE_SUMMARY_RE.captures(&combined) {
            let total: i64 = caps[1].parse().unwrap_or(0);
            let fail_count: i64 = caps[2].parse().unwrap_or(0);
            let pass_count = (total - fail_count).max(0);
            passed = (0..pass_count).map(|i| format!("test_{i}")).collect();
            failed = (0..fail_count).map(|i| format!("failed_test_{i}")).collect();
        }

        let total = passed.len() + failed.len();
        let error = if total == 0 && !output.success() {
            Some(format!("gradle test failed with exit code {}", output.status))
        } else {
            None
        };

        RunResult {
            passed,
            failed,
            skipped: Vec::new(),
            duration_secs: 0.0,
            raw_output: combined,
            error,
            unstable_identifiers: total > 0,
        }
    }
}

pub struct SbtRunner;

#[async_trait]
impl Runner for SbtRunner {
    fn name(&self) -> &'static str {
        "sbt"
    }

    fn language(&self) -> &'static str {
        "Scala"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let mut score = 0;
        if repo_path.join("build.sbt").exists() {
            score += 70;
        }
        if repo_path.join("project").exists() {
            score += 20;
            if repo_path.join("project/build.properties").exists() {
                score += 10;
            }
        }
        if repo_path.join("src/main/scala").exists() {
            score += 10;
        }
        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        crate::runner::exec::probe_version("sbt", "--version").await
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        let content = read_to_string_lossy(&repo_path.join("build.sbt"))?;
        SCALA_VERSION_RE.captures(&content).map(|c| c[1].to_string())
    }

    // No override: sbt inherits the trait default (exact major.minor match),
    // mirroring the original's SbtRunner never defining `_versions_compatible`.

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        let out = run_command("sbt", &["update"], repo_path, timeout).await?;
        if out.success() {
            Ok(())
        } else {
            Err(RunnerError::InstallFailed(format!("sbt update failed: {}", out.stderr)))
        }
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let result = run_command("sbt", &["test"], repo_path, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        if let Some(mut parsed) = parse_xml_reports_dir(&repo_path.join("target/test-reports"), "")
            && parsed.total_tests() > 0
        {
            parsed.raw_output = combined;
            return parsed;
        }

        let mut passed = Vec::new();
        let mut failed = Vec::new();
        for line in combined.lines() {
            if line.contains("[info] +") || line.to_lowercase().contains("passed") {
                if let Some(caps) = SBT_INFO_RE.captures(line) {
                    passed.push(caps[1].trim().to_string());
                }
            } else if line.contains("[error]") && line.to_lowercase().contains("failed") {
                if let Some(caps) = SBT_ERROR_RE.captures(line) {
                    failed.push(caps[1].trim().to_string());
                }
            }
        }

        let total = passed.len() + failed.len();
        let error = if total == 0 && !output.success() {
            Some(format!("sbt test failed with exit code {}", output.status))
        } else {
            None
        };

        RunResult {
            passed,
            failed,
            skipped: Vec::new(),
            duration_secs: 0.0,
            raw_output: combined,
            error,
            unstable_identifiers: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_required_java_version_from_pom() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pom.xml"),
            "<project><properties><maven.compiler.source>17</maven.compiler.source></properties></project>",
        )
        .unwrap();
        assert_eq!(get_required_java_version(dir.path()), Some("17".to_string()));
    }

    #[test]
    fn java_version_policy_is_at_least() {
        assert!(java_versions_compatible("11", "17"));
        assert!(!java_versions_compatible("17", "11"));
    }

    #[test]
    fn detects_gradle_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("build.gradle"), "").unwrap();
        std::fs::write(dir.path().join("gradlew"), "").unwrap();
        let runner = GradleRunner;
        assert_eq!(runner.detect(dir.path()), 90);
    }
}
