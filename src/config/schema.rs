//! Configuration schema definitions for patchcheck.
//!
//! This module defines the types deserialized from a TOML configuration
//! file. Every field defaults, so the tool runs with zero configuration.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! ├── AnalysisConfig   - per-stage subprocess timeouts, language hint, env overrides
//! └── ReportConfig     - output directory, JSON sidecar
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure for patchcheck.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Knobs controlling the three-stage orchestrator's subprocess behavior.
///
/// The distilled algorithm treats these as constants (§5); this is the
/// ambient-stack layer that makes them configurable per repository without
/// touching code.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// `git checkout` timeout. Default: 60s.
    #[serde(default = "default_checkout_timeout_secs")]
    pub checkout_timeout_secs: u64,

    /// `git fetch origin <sha>` timeout, used only when a commit isn't
    /// known locally. Default: 120s.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// `git diff`/`reset`/`clean`/`cat-file` timeout. Default: 30s.
    #[serde(default = "default_diff_timeout_secs")]
    pub diff_timeout_secs: u64,

    /// Dependency installation timeout, per stage per package. Default: 300s.
    #[serde(default = "default_install_timeout_secs")]
    pub install_timeout_secs: u64,

    /// Test execution timeout, per stage per package. Default: 600s.
    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,

    /// Overrides automatic runner detection when set (e.g. `"Python"`,
    /// `"JavaScript"`). Passed straight through to the registry.
    pub language_hint: Option<String>,

    /// Environment variables applied to every subprocess the orchestrator
    /// and runners spawn, merged over (and overriding) the inherited
    /// process environment. Supports `${VAR}` / `${VAR:-default}`
    /// expansion, resolved once at load time.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            checkout_timeout_secs: default_checkout_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            diff_timeout_secs: default_diff_timeout_secs(),
            install_timeout_secs: default_install_timeout_secs(),
            test_timeout_secs: default_test_timeout_secs(),
            language_hint: None,
            env: HashMap::new(),
        }
    }
}

fn default_checkout_timeout_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    120
}

fn default_diff_timeout_secs() -> u64 {
    30
}

fn default_install_timeout_secs() -> u64 {
    300
}

fn default_test_timeout_secs() -> u64 {
    600
}

/// Configuration for result reporting.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Directory where the JSON sidecar (when enabled) is written. Created
    /// automatically if it doesn't exist.
    ///
    /// Default: `"patchcheck-results"`
    #[serde(default = "default_report_dir")]
    pub output_dir: PathBuf,

    /// Also write the serialized `AnalysisResult` as a JSON file alongside
    /// the console summary.
    ///
    /// Default: `false`
    #[serde(default)]
    pub write_json: bool,
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("patchcheck-results")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_budgets() {
        let analysis = AnalysisConfig::default();
        assert_eq!(analysis.checkout_timeout_secs, 60);
        assert_eq!(analysis.fetch_timeout_secs, 120);
        assert_eq!(analysis.diff_timeout_secs, 30);
        assert_eq!(analysis.install_timeout_secs, 300);
        assert_eq!(analysis.test_timeout_secs, 600);
        assert!(analysis.language_hint.is_none());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml = r#"
            [analysis]
            language_hint = "Python"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.analysis.language_hint.as_deref(), Some("Python"));
        assert_eq!(config.analysis.test_timeout_secs, 600);
    }
}
