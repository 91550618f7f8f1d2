//! JavaScript/TypeScript test runners: Jest, Vitest, Mocha, Node's built-in
//! test runner.
//!
//! Grounded on `examples/original_source/javascript.py` in full
//! (`detect_package_manager`, `find_js_project_root`,
//! `get_required_node_version`, and the four runner classes). Per this
//! crate's "no interior mutability" design note, project-root resolution
//! is a pure function recomputed on every call rather than cached on
//! `self` the way the original's `_project_root` instance attribute does.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::{Format, ParserChain};
use crate::runner::exec::{read_to_string_lossy, run_command};
use crate::runner::{Runner, RunnerError, RunnerResult, RunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    fn detect(project_root: &Path) -> Self {
        if project_root.join("pnpm-lock.yaml").exists() {
            PackageManager::Pnpm
        } else if project_root.join("yarn.lock").exists() {
            PackageManager::Yarn
        } else if project_root.join("bun.lockb").exists() {
            PackageManager::Bun
        } else {
            PackageManager::Npm
        }
    }

    fn install_cmd(self) -> (&'static str, &'static [&'static str]) {
        match self {
            PackageManager::Pnpm => ("pnpm", &["install"]),
            PackageManager::Yarn => ("yarn", &["install"]),
            PackageManager::Bun => ("bun", &["install"]),
            PackageManager::Npm => ("npm", &["install", "--legacy-peer-deps"]),
        }
    }

    /// `exec`-style prefix used to run a project-local binary (e.g. jest).
    fn exec_prefix(self) -> (&'static str, &'static [&'static str]) {
        match self {
            PackageManager::Pnpm => ("pnpm", &["exec"]),
            PackageManager::Yarn => ("yarn", &[]),
            PackageManager::Bun => ("bun", &[]),
            PackageManager::Npm => ("npm", &["exec", "--"]),
        }
    }

    fn name(self) -> &'static str {
        match self {
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
            PackageManager::Npm => "npm",
        }
    }
}

fn get_package_json(project_root: &Path) -> Option<serde_json::Value> {
    let content = read_to_string_lossy(&project_root.join("package.json"))?;
    serde_json::from_str(&content).ok()
}

fn all_deps(pkg: &serde_json::Value) -> Vec<String> {
    let mut out = Vec::new();
    for key in ["dependencies", "devDependencies"] {
        if let Some(map) = pkg.get(key).and_then(|v| v.as_object()) {
            out.extend(map.keys().cloned());
        }
    }
    out
}

fn test_script(pkg: &serde_json::Value) -> String {
    pkg.get("scripts")
        .and_then(|s| s.get("test"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

static VERSION_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());

fn get_required_node_version(project_root: &Path) -> Option<String> {
    for file in [".nvmrc", ".node-version"] {
        if let Some(content) = read_to_string_lossy(&project_root.join(file))
            && let Some(caps) = VERSION_NUM_RE.captures(content.trim())
        {
            return Some(caps[1].to_string());
        }
    }
    let pkg = get_package_json(project_root)?;
    let node_req = pkg.get("engines")?.get("node")?.as_str()?;
    VERSION_NUM_RE.captures(node_req).map(|c| c[1].to_string())
}

/// Resolves the JS project root, handling monorepos: prefers the repo
/// root if it already carries a test-framework dependency, otherwise
/// checks conventional monorepo subdirectories, otherwise any immediate
/// child directory with a matching dependency.
pub fn find_js_project_root(repo_path: &Path) -> PathBuf {
    if repo_path.join("package.json").exists()
        && let Some(pkg) = get_package_json(repo_path)
    {
        let deps = all_deps(&pkg);
        if ["jest", "vitest", "mocha", "@testing-library/react"]
            .iter()
            .any(|d| deps.iter().any(|dep| dep == d))
        {
            return repo_path.to_path_buf();
        }
    }

    const MONOREPO_DIRS: &[&str] = &["web", "app", "apps", "packages", "frontend", "client", "src"];
    for subdir in MONOREPO_DIRS {
        let sub_path = repo_path.join(subdir);
        if sub_path.join("package.json").exists() {
            return sub_path;
        }
    }

    if let Ok(entries) = std::fs::read_dir(repo_path) {
        for entry in entries.flatten() {
            let sub_path = entry.path();
            if !sub_path.is_dir() || !sub_path.join("package.json").exists() {
                continue;
            }
            if let Some(pkg) = get_package_json(&sub_path) {
                let deps = all_deps(&pkg);
                if ["jest", "vitest", "mocha"].iter().any(|d| deps.iter().any(|dep| dep == d)) {
                    return sub_path;
                }
            }
        }
    }

    repo_path.to_path_buf()
}

async fn check_node_runtime() -> (bool, String) {
    crate::runner::exec::probe_version("node", "--version").await
}

fn node_major(version: &str) -> Option<i64> {
    VERSION_NUM_RE.captures(version).and_then(|c| c[1].parse().ok())
}

fn js_versions_compatible(required: &str, current: &str) -> bool {
    match (required.parse::<i64>(), current.parse::<i64>()) {
        (Ok(r), Ok(c)) => r <= c,
        _ => true,
    }
}

async fn install_js_deps(repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
    let project_root = find_js_project_root(repo_path);
    let pm = PackageManager::detect(&project_root);
    let (program, args) = pm.install_cmd();
    let out = run_command(program, args, &project_root, timeout).await?;
    if out.success() {
        Ok(())
    } else {
        Err(RunnerError::InstallFailed(format!("{} install failed: {}", pm.name(), out.stderr)))
    }
}

pub struct JestRunner;

impl JestRunner {
    fn project_root(repo_path: &Path) -> PathBuf {
        if repo_path.join("package.json").exists() {
            repo_path.to_path_buf()
        } else {
            find_js_project_root(repo_path)
        }
    }

    fn jest_config_file(project_root: &Path) -> Option<&'static str> {
        const CONFIGS: &[&str] = &[
            "jest.config.js",
            "jest.config.ts",
            "jest.config.mjs",
            "jest.config.cjs",
            "jest.config.json",
        ];
        CONFIGS.iter().find(|c| project_root.join(c).exists()).copied()
    }
}

#[async_trait]
impl Runner for JestRunner {
    fn name(&self) -> &'static str {
        "jest"
    }

    fn language(&self) -> &'static str {
        "JavaScript"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let project_root = Self::project_root(repo_path);
        let mut score = 0;

        if Self::jest_config_file(&project_root).is_some() {
            score += 50;
        }

        if let Some(pkg) = get_package_json(&project_root) {
            let deps = all_deps(&pkg);
            if deps.iter().any(|d| d == "jest" || d == "@testing-library/jest-dom") {
                score += 30;
            }
            if pkg.get("jest").is_some() {
                score += 40;
            }
            if test_script(&pkg).contains("jest") {
                score += 20;
            }
        }

        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        check_node_runtime().await
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        get_required_node_version(&Self::project_root(repo_path))
    }

    fn versions_compatible(&self, required: &str, current: &str) -> bool {
        js_versions_compatible(required, &node_major(current).map(|m| m.to_string()).unwrap_or_default())
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        install_js_deps(repo_path, timeout).await
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let project_root = Self::project_root(repo_path);
        let pm = PackageManager::detect(&project_root);

        let pkg = get_package_json(&project_root);
        let script = pkg.as_ref().map(test_script).unwrap_or_default();
        let all_deps_list = pkg.as_ref().map(all_deps).unwrap_or_default();
        let is_cra = all_deps_list.iter().any(|d| d == "react-scripts") && script.contains("react-scripts test");
        let has_config_conflict =
            pkg.as_ref().is_some_and(|p| p.get("jest").is_some()) && Self::jest_config_file(&project_root).is_some();

        let json_path = std::env::temp_dir().join(format!("patchcheck-jest-{}.json", std::process::id()));
        let json_arg = format!("--outputFile={}", json_path.display());

        let mut args: Vec<String> = Vec::new();
        if is_cra {
            args.extend(["react-scripts", "test", "--json", &json_arg, "--watchAll=false", "--passWithNoTests"].map(String::from));
        } else if script.contains("jest") {
            args.extend(["test", "--", "--json", &json_arg, "--passWithNoTests", "--watchAll=false"].map(String::from));
        } else {
            let (prog, prefix) = pm.exec_prefix();
            args.push(prog.to_string());
            args.extend(prefix.iter().map(|s| s.to_string()));
            args.extend(["jest", "--json", &json_arg, "--passWithNoTests"].map(String::from));
            if has_config_conflict && let Some(cfg) = Self::jest_config_file(&project_root) {
                args.push(format!("--config={cfg}"));
            }
        }

        let (program, rest) = args.split_first().unwrap();
        let rest_refs: Vec<&str> = rest.iter().map(|s| s.as_str()).collect();
        let result = run_command(program, &rest_refs, &project_root, timeout).await;

        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        if let Some(json) = std::fs::read_to_string(&json_path).ok().filter(|s| !s.is_empty()) {
            let _ = std::fs::remove_file(&json_path);
            let chain = ParserChain::new(vec![Format::JestJson]);
            if let Some(mut parsed) = chain.parse(&json) {
                parsed.raw_output = combined;
                return parsed;
            }
        }
        let _ = std::fs::remove_file(&json_path);

        let chain = ParserChain::new(vec![Format::JestJson]);
        let mut parsed = chain.parse(&output.stdout).unwrap_or_default();
        if parsed.total_tests() == 0 {
            parsed.raw_output = combined;
            if !output.success() {
                parsed.error = Some(format!("Jest failed with exit code {}", output.status));
            }
        }
        parsed
    }
}

pub struct VitestRunner;

impl VitestRunner {
    fn project_root(repo_path: &Path) -> PathBuf {
        find_js_project_root(repo_path)
    }
}

#[async_trait]
impl Runner for VitestRunner {
    fn name(&self) -> &'static str {
        "vitest"
    }

    fn language(&self) -> &'static str {
        "JavaScript"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let project_root = Self::project_root(repo_path);
        let mut score = 0;

        const CONFIGS: &[&str] = &[
            "vitest.config.ts",
            "vitest.config.js",
            "vitest.config.mts",
            "vitest.config.mjs",
            "vitest.config.cts",
            "vitest.config.cjs",
        ];
        if CONFIGS.iter().any(|c| project_root.join(c).exists()) {
            score += 60;
        }

        if let Some(pkg) = get_package_json(&project_root) {
            let deps = all_deps(&pkg);
            if deps.iter().any(|d| d == "vitest" || d == "@vitejs/plugin-react") {
                score += 40;
            }
            if test_script(&pkg).contains("vitest") {
                score += 30;
            }
        }

        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        check_node_runtime().await
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        get_required_node_version(&Self::project_root(repo_path))
    }

    fn versions_compatible(&self, required: &str, current: &str) -> bool {
        js_versions_compatible(required, &node_major(current).map(|m| m.to_string()).unwrap_or_default())
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        install_js_deps(repo_path, timeout).await
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let project_root = Self::project_root(repo_path);
        let pm = PackageManager::detect(&project_root);
        let (prog, prefix) = pm.exec_prefix();

        let mut args: Vec<&str> = prefix.to_vec();
        args.extend(["vitest", "run", "--reporter=json"]);

        let result = run_command(prog, &args, &project_root, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        let chain = ParserChain::new(vec![Format::VitestJson]);
        let mut parsed = chain.parse(&output.stdout).unwrap_or_default();
        parsed.raw_output = combined;
        if parsed.total_tests() == 0 && !output.success() {
            parsed.error = Some(format!("Vitest failed with exit code {}", output.status));
        }
        parsed
    }
}

pub struct MochaRunner;

#[async_trait]
impl Runner for MochaRunner {
    fn name(&self) -> &'static str {
        "mocha"
    }

    fn language(&self) -> &'static str {
        "JavaScript"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let project_root = find_js_project_root(repo_path);
        let mut score = 0;

        const CONFIGS: &[&str] = &[".mocharc.js", ".mocharc.json", ".mocharc.yml", ".mocharc.yaml", "mocha.opts"];
        if CONFIGS.iter().any(|c| project_root.join(c).exists()) {
            score += 50;
        }

        if let Some(pkg) = get_package_json(&project_root) {
            let deps = all_deps(&pkg);
            if deps.iter().any(|d| d == "mocha") {
                score += 40;
            }
            if pkg.get("mocha").is_some() {
                score += 20;
            }
            if test_script(&pkg).contains("mocha") {
                score += 20;
            }
        }

        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        check_node_runtime().await
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        get_required_node_version(&find_js_project_root(repo_path))
    }

    fn versions_compatible(&self, required: &str, current: &str) -> bool {
        js_versions_compatible(required, &node_major(current).map(|m| m.to_string()).unwrap_or_default())
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        install_js_deps(repo_path, timeout).await
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let project_root = find_js_project_root(repo_path);
        let pm = PackageManager::detect(&project_root);
        let (prog, prefix) = pm.exec_prefix();

        let json_path = std::env::temp_dir().join(format!("patchcheck-mocha-{}.json", std::process::id()));
        let reporter_option = format!("output={}", json_path.display());

        let mut args: Vec<&str> = prefix.to_vec();
        args.extend(["mocha", "--reporter", "json", "--reporter-option", &reporter_option]);

        let result = run_command(prog, &args, &project_root, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        if let Some(json) = std::fs::read_to_string(&json_path).ok().filter(|s| !s.is_empty()) {
            let _ = std::fs::remove_file(&json_path);
            let chain = ParserChain::new(vec![Format::MochaJson]);
            if let Some(mut parsed) = chain.parse(&json) {
                parsed.raw_output = combined;
                return parsed;
            }
        }
        let _ = std::fs::remove_file(&json_path);

        let chain = ParserChain::new(vec![Format::MochaJson]);
        let mut parsed = chain.parse(&output.stdout).unwrap_or_default();
        parsed.raw_output = combined;
        if parsed.total_tests() == 0 && !output.success() {
            parsed.error = Some(format!("Mocha failed with exit code {}", output.status));
        }
        parsed
    }
}

pub struct NodeTestRunner;

static NODE_TAP_OK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ok \d+ - (.+)").unwrap());
static NODE_TAP_NOT_OK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^not ok \d+ - (.+)").unwrap());
static NODE_UNICODE_PASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\x{2714}\s+(.+?)(?:\s+\(\d+\.?\d*m?s\))?$").unwrap());
static NODE_UNICODE_FAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\x{2716}\s+(.+?)(?:\s+\(\d+\.?\d*m?s\))?$").unwrap());

#[async_trait]
impl Runner for NodeTestRunner {
    fn name(&self) -> &'static str {
        "node:test"
    }

    fn language(&self) -> &'static str {
        "JavaScript"
    }

    fn detect(&self, repo_path: &Path) -> i32 {
        let project_root = if repo_path.join("package.json").exists() {
            repo_path.to_path_buf()
        } else {
            find_js_project_root(repo_path)
        };

        let Some(pkg) = get_package_json(&project_root) else {
            return 0;
        };
        let script = test_script(&pkg);
        let deps = all_deps(&pkg);

        let mut score = 0;
        if script.contains("node --test") || (script.contains("node --import") && script.contains("--test")) {
            score += 60;
        }
        if deps.iter().any(|d| d == "tsx") && script.contains("--test") {
            score += 20;
        }
        if deps.iter().any(|d| d == "@types/node") {
            score += 10;
        }

        score.min(100)
    }

    async fn check_runtime(&self) -> (bool, String) {
        let (available, version) = check_node_runtime().await;
        if !available {
            return (false, version);
        }
        match node_major(&version) {
            Some(major) if major < 18 => (false, format!("Node.js 18+ required for --test (found {version})")),
            _ => (true, version),
        }
    }

    fn required_version(&self, repo_path: &Path) -> Option<String> {
        let project_root = if repo_path.join("package.json").exists() {
            repo_path.to_path_buf()
        } else {
            find_js_project_root(repo_path)
        };
        get_required_node_version(&project_root)
    }

    fn versions_compatible(&self, required: &str, current: &str) -> bool {
        js_versions_compatible(required, &node_major(current).map(|m| m.to_string()).unwrap_or_default())
    }

    async fn install(&self, repo_path: &Path, timeout: Duration) -> RunnerResult<()> {
        install_js_deps(repo_path, timeout).await
    }

    async fn run(&self, repo_path: &Path, timeout: Duration) -> RunResult {
        let project_root = if repo_path.join("package.json").exists() {
            repo_path.to_path_buf()
        } else {
            find_js_project_root(repo_path)
        };
        let pm = PackageManager::detect(&project_root);
        let (prog, _) = pm.exec_prefix();

        let result = run_command(prog, &["test"], &project_root, timeout).await;
        let output = match result {
            Ok(out) => out,
            Err(e) => return RunResult::with_error(e.to_string()),
        };
        let combined = output.combined();

        let mut passed = Vec::new();
        let mut failed = Vec::new();
        let skipped = Vec::new();

        for line in combined.lines() {
            let trimmed = line.trim();
            if let Some(caps) = NODE_UNICODE_PASS_RE.captures(trimmed) {
                passed.push(caps[1].trim().to_string());
            } else if let Some(caps) = NODE_UNICODE_FAIL_RE.captures(trimmed) {
                failed.push(caps[1].trim().to_string());
            } else if let Some(caps) = NODE_TAP_OK_RE.captures(trimmed) {
                passed.push(caps[1].trim().to_string());
            } else if let Some(caps) = NODE_TAP_NOT_OK_RE.captures(trimmed) {
                failed.push(caps[1].trim().to_string());
            }
        }

        let error = if !output.success() && failed.is_empty() {
            Some(format!("node --test failed with exit code {}", output.status))
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
            unstable_identifiers: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_package_manager_from_lockfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Pnpm);
    }

    #[test]
    fn finds_monorepo_root_via_web_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let web = dir.path().join("web");
        std::fs::create_dir(&web).unwrap();
        std::fs::write(web.join("package.json"), r#"{"devDependencies":{"jest":"1"}}"#).unwrap();
        assert_eq!(find_js_project_root(dir.path()), web);
    }

    #[test]
    fn js_version_policy_is_major_or_higher() {
        assert!(js_versions_compatible("16", "20"));
        assert!(!js_versions_compatible("20", "16"));
    }
}
