//! Project-marker detection and affected-package discovery for monorepos.
//!
//! Grounded on `examples/original_source/analyzer.py`'s `_is_project_dir`,
//! `_extract_package_from_path`, `_get_affected_packages`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Files whose presence marks a directory as an independently testable
/// project, in the order `analyzer.py`'s `PROJECT_MARKERS` lists them.
pub const PROJECT_MARKERS: &[&str] = &[
    "package.json",
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "Gemfile",
    "Cargo.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
];

/// Whether `path` contains one of [`PROJECT_MARKERS`].
pub fn is_project_dir(path: &Path) -> bool {
    PROJECT_MARKERS.iter().any(|marker| path.join(marker).exists())
}

/// If `file_path`'s first path segment is an existing project directory
/// under `repo_path`, returns it; otherwise `None`. A top-level file (no
/// `/` in its path) never resolves to a package.
fn extract_package_from_path(file_path: &str, repo_path: &Path) -> Option<PathBuf> {
    let mut parts = file_path.splitn(2, '/');
    let first = parts.next()?;
    parts.next()?;
    let candidate = repo_path.join(first);
    if candidate.is_dir() && is_project_dir(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

/// Discovers every package touched by `changed_files`. If none is
/// identified, falls back to the repo root itself (if it's a project dir)
/// or every immediate child project directory. Always sorted
/// lexicographically, matching `analyzer.py`'s `sorted(packages)`.
pub fn affected_packages(changed_files: &[String], repo_path: &Path) -> Vec<PathBuf> {
    let mut packages: BTreeSet<PathBuf> = BTreeSet::new();
    for f in changed_files {
        if let Some(pkg) = extract_package_from_path(f, repo_path) {
            packages.insert(pkg);
        }
    }
    if !packages.is_empty() {
        return packages.into_iter().collect();
    }

    if is_project_dir(repo_path) {
        return vec![repo_path.to_path_buf()];
    }

    let Ok(entries) = std::fs::read_dir(repo_path) else {
        return Vec::new();
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && is_project_dir(&path) {
            packages.insert(path);
        }
    }
    packages.into_iter().collect()
}

/// Package name as it should prefix test identifiers: `.` for the repo
/// root itself, else the path relative to `repo_path`.
pub fn package_label(pkg_path: &Path, repo_path: &Path) -> String {
    if pkg_path == repo_path {
        ".".to_string()
    } else {
        pkg_path
            .strip_prefix(repo_path)
            .unwrap_or(pkg_path)
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_package_from_changed_file() {
        let dir = tempfile::tempdir().unwrap();
        let web = dir.path().join("web");
        std::fs::create_dir(&web).unwrap();
        std::fs::write(web.join("package.json"), "{}").unwrap();

        let changed = vec!["web/src/index.test.js".to_string()];
        let packages = affected_packages(&changed, dir.path());
        assert_eq!(packages, vec![web]);
    }

    #[test]
    fn falls_back_to_repo_root_when_it_is_a_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname=\"x\"\n").unwrap();

        let changed = vec!["top_level_readme.md".to_string()];
        let packages = affected_packages(&changed, dir.path());
        assert_eq!(packages, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn falls_back_to_child_project_dirs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let api = dir.path().join("api");
        let web = dir.path().join("web");
        std::fs::create_dir(&api).unwrap();
        std::fs::create_dir(&web).unwrap();
        std::fs::write(api.join("go.mod"), "module api\n").unwrap();
        std::fs::write(web.join("package.json"), "{}").unwrap();

        let changed = vec!["README.md".to_string()];
        let packages = affected_packages(&changed, dir.path());
        assert_eq!(packages, vec![api, web]);
    }

    #[test]
    fn package_label_uses_dot_for_root() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(package_label(dir.path(), dir.path()), ".");
        assert_eq!(package_label(&dir.path().join("web"), dir.path()), "web");
    }
}
