//! Dependency installation pass.
//!
//! Walks the deployment directory for dependency manifests and installs each
//! one inside an activated virtual environment. Manifests are optional; the
//! first failed install aborts the pass.

use crate::error::{Error, Result};
use crate::venv::{ActiveEnv, VirtualEnv};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

/// Default dependency manifest file name.
pub const DEFAULT_MANIFEST: &str = "requirements.txt";

/// Find every file called `manifest_name` below `root`, sorted by path.
///
/// A missing `root` yields no manifests.
pub fn discover_manifests(root: &Path, manifest_name: &str) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut manifests = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == manifest_name {
            manifests.push(entry.into_path());
        }
    }
    manifests.sort();
    Ok(manifests)
}

/// Installs one dependency manifest inside an activated environment.
pub trait Installer: Send + Sync {
    fn install(&self, env: &ActiveEnv<'_>, manifest: &Path) -> Result<()>;
}

/// Installer backed by `python -m pip install -r`.
#[derive(Debug, Default)]
pub struct PipInstaller;

impl PipInstaller {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Installer for PipInstaller {
    fn install(&self, env: &ActiveEnv<'_>, manifest: &Path) -> Result<()> {
        let python = env.env().python();
        log::debug!(
            "{} -m pip install -r {}",
            python.display(),
            manifest.display()
        );

        let output = env
            .command(&python)
            .args(["-m", "pip", "install", "--disable-pip-version-check", "-r"])
            .arg(manifest)
            .output()
            .map_err(|e| Error::ToolNotFound {
                tool: python.display().to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::InstallFailed {
                manifest: manifest.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Installer that records manifests instead of installing them.
#[derive(Debug, Clone, Default)]
pub struct MockInstaller {
    installed: Arc<Mutex<Vec<PathBuf>>>,
    failing: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make installing `manifest` fail.
    pub fn fail_on(&mut self, manifest: impl Into<PathBuf>) {
        self.failing.lock().unwrap().push(manifest.into());
    }

    /// Manifests installed so far, in order.
    pub fn installed(&self) -> Vec<PathBuf> {
        self.installed.lock().unwrap().clone()
    }
}

impl Installer for MockInstaller {
    fn install(&self, _env: &ActiveEnv<'_>, manifest: &Path) -> Result<()> {
        if self.failing.lock().unwrap().iter().any(|m| m == manifest) {
            return Err(Error::InstallFailed {
                manifest: manifest.to_path_buf(),
                stderr: "mock install failure".to_string(),
            });
        }
        self.installed.lock().unwrap().push(manifest.to_path_buf());
        Ok(())
    }
}

/// Runs the dependency installation pass.
pub struct DependencyPass {
    installer: Box<dyn Installer>,
    manifest_name: String,
}

impl DependencyPass {
    pub fn new(installer: Box<dyn Installer>) -> Self {
        Self {
            installer,
            manifest_name: DEFAULT_MANIFEST.to_string(),
        }
    }

    /// Look for manifests with a different file name.
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Install every manifest under `deploy_dir` into `venv`.
    ///
    /// The environment is activated for the duration of the pass. `on_manifest`
    /// is called before each install. Returns the installed manifests.
    pub fn run(
        &self,
        deploy_dir: &Path,
        venv: &VirtualEnv,
        on_manifest: &mut dyn FnMut(&Path),
    ) -> Result<Vec<PathBuf>> {
        let manifests = discover_manifests(deploy_dir, &self.manifest_name)?;
        if manifests.is_empty() {
            log::info!("No {} found under {}", self.manifest_name, deploy_dir.display());
            return Ok(manifests);
        }

        let active = venv.activate();
        for manifest in &manifests {
            on_manifest(manifest);
            self.installer.install(&active, manifest)?;
        }
        drop(active);

        Ok(manifests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn deploy_with_manifests(components: &[(&str, bool)]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        for (name, has_manifest) in components {
            let dir = root.path().join(name);
            fs::create_dir_all(&dir).unwrap();
            if *has_manifest {
                fs::write(dir.join(DEFAULT_MANIFEST), "requests\n").unwrap();
            }
        }
        root
    }

    #[test]
    fn test_discover_manifests_sorted_and_nested() {
        let root = deploy_with_manifests(&[("m2", true), ("m1", true), ("m3", false)]);
        fs::create_dir_all(root.path().join("m3/tools")).unwrap();
        fs::write(root.path().join("m3/tools").join(DEFAULT_MANIFEST), "").unwrap();

        let manifests = discover_manifests(root.path(), DEFAULT_MANIFEST).unwrap();
        let relative: Vec<_> = manifests
            .iter()
            .map(|m| m.strip_prefix(root.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("m1/requirements.txt"),
                PathBuf::from("m2/requirements.txt"),
                PathBuf::from("m3/tools/requirements.txt"),
            ]
        );
    }

    #[test]
    fn test_discover_manifests_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let manifests = discover_manifests(&root.path().join("nope"), DEFAULT_MANIFEST).unwrap();
        assert!(manifests.is_empty());
    }

    #[test]
    fn test_zero_manifests_is_success() {
        let root = deploy_with_manifests(&[("m1", false)]);
        let installer = MockInstaller::new();
        let pass = DependencyPass::new(Box::new(installer.clone()));
        let venv = VirtualEnv::new(root.path().join("venv"));

        let installed = pass.run(root.path(), &venv, &mut |_| {}).unwrap();
        assert!(installed.is_empty());
        assert!(installer.installed().is_empty());
    }

    #[test]
    fn test_installs_every_manifest_once() {
        let root = deploy_with_manifests(&[("m1", true), ("m2", false), ("m3", true)]);
        let installer = MockInstaller::new();
        let pass = DependencyPass::new(Box::new(installer.clone()));
        let venv = VirtualEnv::new(root.path().join("venv"));

        let mut seen = Vec::new();
        pass.run(root.path(), &venv, &mut |m| seen.push(m.to_path_buf()))
            .unwrap();

        assert_eq!(installer.installed().len(), 2);
        assert_eq!(seen, installer.installed());
    }

    #[test]
    fn test_failure_aborts_pass() {
        let root = deploy_with_manifests(&[("m1", true), ("m2", true)]);
        let mut installer = MockInstaller::new();
        installer.fail_on(root.path().join("m1").join(DEFAULT_MANIFEST));
        let pass = DependencyPass::new(Box::new(installer.clone()));
        let venv = VirtualEnv::new(root.path().join("venv"));

        let err = pass.run(root.path(), &venv, &mut |_| {}).unwrap_err();

        assert!(matches!(err, Error::InstallFailed { .. }));
        assert!(installer.installed().is_empty());
    }

    #[test]
    fn test_custom_manifest_name() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("m1")).unwrap();
        fs::write(root.path().join("m1/deps.txt"), "").unwrap();
        fs::write(root.path().join("m1").join(DEFAULT_MANIFEST), "").unwrap();

        let installer = MockInstaller::new();
        let pass = DependencyPass::new(Box::new(installer.clone())).with_manifest_name("deps.txt");
        let venv = VirtualEnv::new(root.path().join("venv"));
        pass.run(root.path(), &venv, &mut |_| {}).unwrap();

        assert_eq!(installer.installed(), vec![root.path().join("m1/deps.txt")]);
    }
}
