//! Manifest discovery with gitignore-aware filtering
//!
//! Walks a directory tree and collects files matching glob patterns while
//! honoring `.gitignore`. Module manifests are found with
//! [`discover_manifests`].

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

/// File name suffix of a module manifest
pub const MANIFEST_PATTERN: &str = "**/*.module.json";

/// Discover files matching glob patterns under `root`
///
/// Patterns are matched against paths relative to `root`. Returns absolute
/// paths in sorted order; an unreadable root or an invalid pattern yields
/// no files.
///
/// # Example
/// ```no_run
/// use reflect_kit_core::discovery;
///
/// let files = discovery::discover_files(std::path::Path::new("modules"), &["**/*.module.json"]);
/// println!("Found {} manifests", files.len());
/// ```
pub fn discover_files(root: &Path, patterns: &[&str]) -> Vec<PathBuf> {
    let canonical_root = match root.canonicalize() {
        Ok(path) => path,
        Err(err) => {
            warn!(root = %root.display(), error = %err, "Cannot resolve discovery root");
            return Vec::new();
        }
    };

    let matcher = match build_glob_matcher(patterns) {
        Ok(matcher) => matcher,
        Err(err) => {
            warn!(error = %err, "Invalid discovery pattern");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for result in build_walker(&canonical_root) {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "Error walking directory");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let matched = entry
            .path()
            .strip_prefix(&canonical_root)
            .is_ok_and(|rel| matcher.is_match(rel));
        if matched {
            files.push(entry.into_path());
        }
    }

    files.sort();
    debug!(root = %canonical_root.display(), count = files.len(), "Discovered files");
    files
}

/// Discover module manifests (`*.module.json`) under `root`
pub fn discover_manifests(root: &Path) -> Vec<PathBuf> {
    discover_files(root, &[MANIFEST_PATTERN])
}

fn build_glob_matcher(patterns: &[&str]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

fn build_walker(root: &Path) -> ignore::Walk {
    let mut builder = WalkBuilder::new(root);
    builder
        .git_ignore(true)
        .git_exclude(true)
        .hidden(false)
        .parents(true);

    // Outside a git checkout the walker does not pick up .gitignore on its own
    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists() {
        if let Some(err) = builder.add_ignore(&gitignore_path) {
            warn!(path = %gitignore_path.display(), error = %err, "Cannot read .gitignore");
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap();
    }

    #[test]
    fn test_discover_manifests_basic() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        touch(&root.join("core.module.json"));
        touch(&root.join("util.module.json"));
        touch(&root.join("notes.json"));

        let files = discover_manifests(root);

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.is_absolute()));
        assert!(files.iter().any(|p| p.ends_with("core.module.json")));
        assert!(files.iter().any(|p| p.ends_with("util.module.json")));
    }

    #[test]
    fn test_respect_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let mut gitignore = File::create(root.join(".gitignore")).unwrap();
        gitignore.write_all(b"build/\n").unwrap();

        touch(&root.join("build/stale.module.json"));
        touch(&root.join("app.module.json"));

        let files = discover_manifests(root);

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("app.module.json"));
    }

    #[test]
    fn test_custom_patterns_are_relative_to_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        touch(&root.join("libs/a.module.json"));
        touch(&root.join("apps/b.module.json"));
        touch(&root.join("c.module.json"));

        let files = discover_files(root, &["libs/**/*.module.json"]);

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("libs/a.module.json"));
    }

    #[test]
    fn test_results_are_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        touch(&root.join("z.module.json"));
        touch(&root.join("a.module.json"));
        touch(&root.join("m/b.module.json"));

        let files = discover_manifests(root);
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[test]
    fn test_missing_root_and_bad_pattern() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does-not-exist");

        assert!(discover_manifests(&missing).is_empty());
        assert!(discover_files(temp_dir.path(), &["[unclosed"]).is_empty());
    }
}
