//! Version-control backends.
//!
//! The [`Vcs`] trait is the only thing extraction needs from version
//! control: "clone repository X at ref R into path P".
//!
//! # Testing
//!
//! Use [`MockVcs`] to serve clones from local fixture directories:
//!
//! ```
//! use sourcekit::backend::{MockVcs, Vcs};
//!
//! let fixture = tempfile::tempdir().unwrap();
//! std::fs::create_dir(fixture.path().join("m1")).unwrap();
//!
//! let mut vcs = MockVcs::new();
//! vcs.add_repo("https://example.com/a.git", fixture.path());
//!
//! let dest = tempfile::tempdir().unwrap();
//! let clone = dest.path().join("a");
//! vcs.clone_shallow("https://example.com/a.git", "17.0", &clone).unwrap();
//! assert!(clone.join("m1").is_dir());
//! ```

pub mod git;

use crate::error::{Error, Result};
use crate::fsops;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Backend trait for version control.
pub trait Vcs: Send + Sync {
    /// Shallow-clone `url` pinned to `git_ref` into `dest`.
    ///
    /// `dest` must not exist yet; the backend creates it.
    fn clone_shallow(&self, url: &str, git_ref: &str, dest: &Path) -> Result<()>;
}

/// A clone request recorded by [`MockVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneCall {
    pub url: String,
    pub git_ref: String,
    pub dest: PathBuf,
}

/// Mock VCS serving clones from local directories.
///
/// Every clone also gets an empty `.git` directory so callers can verify
/// that version-control metadata is discarded.
#[derive(Debug, Clone, Default)]
pub struct MockVcs {
    repos: Arc<Mutex<HashMap<String, PathBuf>>>,
    failures: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<CloneCall>>>,
}

impl MockVcs {
    /// Create a mock with no repositories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `url` from the contents of `fixture`.
    pub fn add_repo(&mut self, url: impl Into<String>, fixture: impl Into<PathBuf>) {
        let mut repos = self.repos.lock().unwrap();
        repos.insert(url.into(), fixture.into());
    }

    /// Make clones of `url` fail with `stderr`.
    pub fn fail_repo(&mut self, url: impl Into<String>, stderr: impl Into<String>) {
        let mut failures = self.failures.lock().unwrap();
        failures.insert(url.into(), stderr.into());
    }

    /// All clone requests seen so far.
    pub fn calls(&self) -> Vec<CloneCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Vcs for MockVcs {
    fn clone_shallow(&self, url: &str, git_ref: &str, dest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(CloneCall {
            url: url.to_string(),
            git_ref: git_ref.to_string(),
            dest: dest.to_path_buf(),
        });

        let clone_error = |stderr: String| Error::CloneFailed {
            source_name: url.to_string(),
            url: url.to_string(),
            git_ref: git_ref.to_string(),
            stderr,
        };

        if let Some(stderr) = self.failures.lock().unwrap().get(url) {
            return Err(clone_error(stderr.clone()));
        }

        let fixture = self
            .repos
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| clone_error(format!("repository '{url}' not found")))?;

        fsops::copy_dir(&fixture, dest)?;
        let git_dir = dest.join(".git");
        std::fs::create_dir_all(&git_dir).map_err(|e| Error::io(&git_dir, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_mock_vcs_clone_copies_fixture() {
        let fixture = tempfile::tempdir().unwrap();
        fs::create_dir(fixture.path().join("m1")).unwrap();
        fs::write(fixture.path().join("m1/__init__.py"), "").unwrap();

        let mut vcs = MockVcs::new();
        vcs.add_repo("https://example.com/a.git", fixture.path());

        let scratch = tempfile::tempdir().unwrap();
        let dest = scratch.path().join("clone");
        vcs.clone_shallow("https://example.com/a.git", "17.0", &dest)
            .unwrap();

        assert!(dest.join("m1/__init__.py").is_file());
        assert!(dest.join(".git").is_dir());
        assert_eq!(vcs.calls().len(), 1);
        assert_eq!(vcs.calls()[0].git_ref, "17.0");
    }

    #[test]
    fn test_mock_vcs_unknown_repo_fails() {
        let vcs = MockVcs::new();
        let scratch = tempfile::tempdir().unwrap();
        let result = vcs.clone_shallow("https://example.com/x.git", "17.0", scratch.path());
        assert!(matches!(result, Err(Error::CloneFailed { .. })));
    }

    #[test]
    fn test_mock_vcs_configured_failure() {
        let fixture = tempfile::tempdir().unwrap();
        let mut vcs = MockVcs::new();
        vcs.add_repo("https://example.com/a.git", fixture.path());
        vcs.fail_repo("https://example.com/a.git", "fatal: could not read Username");

        let scratch = tempfile::tempdir().unwrap();
        let err = vcs
            .clone_shallow("https://example.com/a.git", "17.0", &scratch.path().join("a"))
            .unwrap_err();
        assert!(err.to_string().contains("could not read Username"));
    }
}
