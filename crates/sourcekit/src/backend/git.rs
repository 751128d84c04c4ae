//! Real git backend using the `git` command.

use crate::backend::Vcs;
use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;

/// Backend that shells out to `git clone`.
pub struct GitCli {
    /// Path or name of the git executable
    git_path: String,
}

impl GitCli {
    /// Use `git` from `$PATH`.
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
        }
    }

    /// Use a specific git executable.
    pub fn with_program(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    /// Arguments for a shallow, single-branch clone pinned to `git_ref`.
    fn clone_args(url: &str, git_ref: &str, dest: &Path) -> Vec<String> {
        vec![
            "clone".to_string(),
            "--quiet".to_string(),
            "--depth".to_string(),
            "1".to_string(),
            "--single-branch".to_string(),
            "--branch".to_string(),
            git_ref.to_string(),
            url.to_string(),
            dest.display().to_string(),
        ]
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl Vcs for GitCli {
    fn clone_shallow(&self, url: &str, git_ref: &str, dest: &Path) -> Result<()> {
        let args = Self::clone_args(url, git_ref, dest);
        log::debug!("{} {}", self.git_path, args.join(" "));

        let output = Command::new(&self.git_path)
            .args(&args)
            // Never block on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| Error::ToolNotFound {
                tool: self.git_path.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CloneFailed {
                source_name: url.to_string(),
                url: url.to_string(),
                git_ref: git_ref.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}
