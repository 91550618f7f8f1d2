//! Preflight checks: can this repository even be analyzed, before spending
//! time on git checkouts and subprocess installs?
//!
//! Grounded on `examples/original_source/analyzer.py`'s `preflight_check`
//! and its `INSTALL_INSTRUCTIONS` table, preserved verbatim.

use std::path::Path;

use serde::Serialize;

use crate::registry;

fn install_hint(runner_name: &str, language: &str) -> String {
    match runner_name {
        "pytest" | "unittest" => "Install Python: https://python.org/downloads/ or 'sudo apt install python3' / 'brew install python'".to_string(),
        "jest" | "vitest" | "mocha" | "node:test" => {
            "Install Node.js: https://nodejs.org/ or 'sudo apt install nodejs' / 'brew install node'".to_string()
        }
        "go test" => "Install Go: https://go.dev/dl/ or 'sudo apt install golang' / 'brew install go'".to_string(),
        "cargo test" => "Install Rust: https://rustup.rs/ or 'curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh'".to_string(),
        "maven" => "Install Maven & Java: 'sudo apt install maven' / 'brew install maven'".to_string(),
        "gradle" => "Install Gradle & Java: 'sudo apt install gradle' / 'brew install gradle'".to_string(),
        "sbt" => "Install sbt: https://www.scala-sbt.org/download.html or 'brew install sbt'".to_string(),
        "rspec" | "minitest" => {
            "Install Ruby: https://www.ruby-lang.org/en/downloads/ or 'sudo apt install ruby' / 'brew install ruby'".to_string()
        }
        "cmake" | "googletest" => "Install CMake: https://cmake.org/download/ or 'sudo apt install cmake' / 'brew install cmake'".to_string(),
        "make" => "Install Make: 'sudo apt install build-essential' / 'xcode-select --install' (macOS)".to_string(),
        "dotnet test" => "Install .NET SDK: https://dotnet.microsoft.com/download or 'sudo apt install dotnet-sdk-8.0'".to_string(),
        _ => format!("Please install {language} runtime"),
    }
}

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Pipfile.lock",
    "poetry.lock",
    "Cargo.lock",
    "Gemfile.lock",
];

#[derive(Debug, Clone, Serialize)]
pub struct Blocker {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Detected {
    pub framework: Option<String>,
    pub language: Option<String>,
    pub confidence: Option<i32>,
    pub runtime: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub can_run: bool,
    pub blockers: Vec<Blocker>,
    pub warnings: Vec<Warning>,
    pub detected: Detected,
}

/// Runs the preflight contract: can `repo_path` be analyzed at all, and
/// what (if anything) is missing. Never touches the VCS state; purely
/// filesystem + runtime-detection based.
pub async fn check(repo_path: &Path, language_hint: Option<&str>) -> PreflightReport {
    if !repo_path.exists() {
        return PreflightReport {
            can_run: false,
            blockers: vec![Blocker {
                code: "REPO_NOT_FOUND",
                message: format!("Repository not found: {}", repo_path.display()),
                install_hint: None,
            }],
            warnings: Vec::new(),
            detected: Detected::default(),
        };
    }

    let mut blockers = Vec::new();
    let mut detected = Detected::default();

    let candidates = registry::get_all_detected_runners(repo_path);
    if candidates.is_empty() {
        blockers.push(Blocker {
            code: "NO_TEST_FRAMEWORK",
            message: "No test framework detected".to_string(),
            install_hint: None,
        });
    } else {
        let _ = language_hint;
        let (runner, score) = &candidates[0];
        detected.framework = Some(runner.name().to_string());
        detected.language = Some(runner.language().to_string());
        detected.confidence = Some(*score);

        let (runtime_ok, runtime_msg) = runner.check_runtime().await;
        if !runtime_ok {
            blockers.push(Blocker {
                code: "MISSING_RUNTIME",
                message: format!("{} runtime not found: {runtime_msg}", runner.language()),
                install_hint: Some(install_hint(runner.name(), runner.language())),
            });
        } else {
            detected.runtime = Some(runtime_msg);
        }
    }

    let mut warnings = Vec::new();
    if !LOCK_FILES.iter().any(|lf| repo_path.join(lf).exists()) {
        warnings.push(Warning {
            code: "NO_LOCK_FILE",
            message: "No lock file found".to_string(),
        });
    }
    if repo_path.join("docker-compose.yml").exists() || repo_path.join("docker-compose.yaml").exists() {
        warnings.push(Warning {
            code: "DOCKER_REQUIRED",
            message: "docker-compose.yml found".to_string(),
        });
    }
    if repo_path.join(".env.example").exists() || repo_path.join(".env.sample").exists() {
        warnings.push(Warning {
            code: "ENV_VARS_NEEDED",
            message: "Environment variables may be required".to_string(),
        });
    }

    PreflightReport {
        can_run: blockers.is_empty(),
        blockers,
        warnings,
        detected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_repo_is_a_blocker() {
        let report = check(Path::new("/nonexistent/repo/path/xyz"), None).await;
        assert!(!report.can_run);
        assert_eq!(report.blockers[0].code, "REPO_NOT_FOUND");
    }

    #[tokio::test]
    async fn detects_lock_file_warning() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "[project]\nname=\"x\"\n").unwrap();
        std::fs::write(dir.path().join("conftest.py"), "").unwrap();
        let report = check(dir.path(), None).await;
        assert!(report.warnings.iter().any(|w| w.code == "NO_LOCK_FILE"));
    }
}
