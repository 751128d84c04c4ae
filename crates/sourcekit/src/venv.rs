//! Isolated Python virtual environments.
//!
//! A [`VirtualEnv`] is "activated" the way a shell would do it: by putting
//! its `bin/` first on `PATH` and exporting `VIRTUAL_ENV` for every child
//! process started while the [`ActiveEnv`] guard is alive.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A Python virtual environment rooted at a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    root: PathBuf,
}

impl VirtualEnv {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the environment's executables.
    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.root.join("Scripts")
        } else {
            self.root.join("bin")
        }
    }

    /// The environment's Python interpreter.
    pub fn python(&self) -> PathBuf {
        if cfg!(windows) {
            self.bin_dir().join("python.exe")
        } else {
            self.bin_dir().join("python")
        }
    }

    pub fn exists(&self) -> bool {
        self.python().exists()
    }

    /// Variables a child process needs to run inside this environment.
    pub fn env_vars(&self) -> Vec<(OsString, OsString)> {
        let mut paths = vec![self.bin_dir()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        let path = std::env::join_paths(paths).unwrap_or_else(|_| self.bin_dir().into_os_string());

        vec![
            (OsString::from("VIRTUAL_ENV"), self.root.clone().into_os_string()),
            (OsString::from("PATH"), path),
        ]
    }

    /// Create the environment with `python -m venv`.
    ///
    /// An existing environment is reused unless `fresh` is set, in which case
    /// it is deleted and rebuilt.
    pub fn ensure(&self, base_python: &str, fresh: bool) -> Result<()> {
        if fresh && self.root.exists() {
            log::info!("Removing existing virtualenv {}", self.root.display());
            std::fs::remove_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        }

        if self.exists() {
            log::debug!("Reusing virtualenv {}", self.root.display());
            return Ok(());
        }

        log::info!("Creating virtualenv {}", self.root.display());
        let output = Command::new(base_python)
            .args(["-m", "venv"])
            .arg(&self.root)
            .output()
            .map_err(|e| Error::ToolNotFound {
                tool: base_python.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::VenvFailed {
                path: self.root.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Activate the environment for the lifetime of the returned guard.
    pub fn activate(&self) -> ActiveEnv<'_> {
        log::info!("Activated virtualenv {}", self.root.display());
        ActiveEnv { env: self }
    }
}

/// Guard for an activated [`VirtualEnv`].
///
/// Commands must be built through [`ActiveEnv::command`] to run inside the
/// environment. Dropping the guard deactivates it.
#[derive(Debug)]
pub struct ActiveEnv<'a> {
    env: &'a VirtualEnv,
}

impl ActiveEnv<'_> {
    pub fn env(&self) -> &VirtualEnv {
        self.env
    }

    /// A command that runs with the environment's variables applied.
    pub fn command(&self, program: impl AsRef<std::ffi::OsStr>) -> Command {
        let mut cmd = Command::new(program);
        cmd.envs(self.env.env_vars());
        cmd.env_remove("PYTHONHOME");
        cmd
    }
}

impl Drop for ActiveEnv<'_> {
    fn drop(&mut self) {
        log::info!("Deactivated virtualenv {}", self.env.root.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_paths() {
        let venv = VirtualEnv::new("/opt/host/venv");
        assert_eq!(venv.bin_dir(), PathBuf::from("/opt/host/venv/bin"));
        assert_eq!(venv.python(), PathBuf::from("/opt/host/venv/bin/python"));
    }

    #[test]
    fn test_env_vars_put_venv_first_on_path() {
        let venv = VirtualEnv::new("/opt/host/venv");
        let vars = venv.env_vars();

        let virtual_env = vars.iter().find(|(k, _)| k == "VIRTUAL_ENV").unwrap();
        assert_eq!(virtual_env.1, OsString::from("/opt/host/venv"));

        let path = vars.iter().find(|(k, _)| k == "PATH").unwrap();
        let first = std::env::split_paths(&path.1).next().unwrap();
        assert_eq!(first, venv.bin_dir());
    }

    #[test]
    fn test_missing_venv_does_not_exist() {
        let root = tempfile::tempdir().unwrap();
        let venv = VirtualEnv::new(root.path().join("venv"));
        assert!(!venv.exists());
    }

    #[test]
    fn test_ensure_with_missing_python_fails() {
        let root = tempfile::tempdir().unwrap();
        let venv = VirtualEnv::new(root.path().join("venv"));
        let err = venv.ensure("no-such-python-forklift", false).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }

    #[test]
    fn test_active_command_carries_env() {
        let venv = VirtualEnv::new("/opt/host/venv");
        let active = venv.activate();
        let cmd = active.command("pip");
        let has_virtual_env = cmd
            .get_envs()
            .any(|(k, v)| k == "VIRTUAL_ENV" && v == Some(std::ffi::OsStr::new("/opt/host/venv")));
        assert!(has_virtual_env);
    }
}
