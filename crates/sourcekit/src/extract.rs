//! Source resolution and extraction.
//!
//! For every [`SourceEntry`] the extractor makes a shallow clone in scratch
//! space, moves each selected subcomponent to the top level of the
//! deployment directory and throws the rest of the clone away.

use crate::backend::Vcs;
use crate::error::{Error, Result};
use crate::fsops;
use crate::types::{ClonePolicy, ExtractReport, FailedSource, MissingComponent, Ownership, SourceEntry};
use std::path::{Path, PathBuf};

/// Receives progress updates while sources are extracted.
pub trait ExtractProgress {
    /// A clone is about to start.
    fn on_source_start(&mut self, _source: &SourceEntry) {}
    /// A subcomponent landed in the deployment directory.
    fn on_component_extracted(&mut self, _source: &SourceEntry, _component: &str) {}
    /// A declared subcomponent does not exist in the clone.
    fn on_component_missing(&mut self, _missing: &MissingComponent) {}
    /// A clone failed and the source was skipped.
    fn on_source_failed(&mut self, _source: &SourceEntry, _error: &Error) {}
    /// The source has been processed and its scratch clone discarded.
    fn on_source_done(&mut self, _source: &SourceEntry) {}
}

/// Progress sink that ignores everything.
pub struct NoProgress;

impl ExtractProgress for NoProgress {}

/// Extraction options.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Owner applied to the deployment directory and extracted trees
    pub ownership: Ownership,
    /// Behaviour on clone failure
    pub clone_policy: ClonePolicy,
    /// Where scratch clones are made; defaults to the deployment
    /// directory's parent so moves stay on one filesystem
    pub scratch_root: Option<PathBuf>,
}

/// Materializes selected subcomponents into a deployment directory.
pub struct Extractor {
    vcs: Box<dyn Vcs>,
}

impl Extractor {
    /// Create an extractor on top of a VCS backend.
    pub fn new(vcs: Box<dyn Vcs>) -> Self {
        Self { vcs }
    }

    /// Extract every source into `deploy_dir`.
    pub fn extract(
        &self,
        sources: &[SourceEntry],
        deploy_dir: &Path,
        opts: &ExtractOptions,
        progress: &mut dyn ExtractProgress,
    ) -> Result<ExtractReport> {
        fsops::ensure_dir(deploy_dir, &opts.ownership)?;

        let scratch_root = opts
            .scratch_root
            .clone()
            .or_else(|| deploy_dir.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| deploy_dir.to_path_buf());

        let mut report = ExtractReport::default();

        for source in sources {
            progress.on_source_start(source);

            match self.extract_source(source, deploy_dir, &scratch_root, &mut report, progress) {
                Ok(()) => {}
                Err(err @ Error::CloneFailed { .. }) if opts.clone_policy == ClonePolicy::Skip => {
                    log::warn!("Skipping source {}: {err}", source.name);
                    progress.on_source_failed(source, &err);
                    report.failed_sources.push(FailedSource {
                        source: source.name.clone(),
                        error: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }

            progress.on_source_done(source);
        }

        for (_, path) in &report.extracted {
            fsops::apply_ownership(path, &opts.ownership, true)?;
        }

        Ok(report)
    }

    fn extract_source(
        &self,
        source: &SourceEntry,
        deploy_dir: &Path,
        scratch_root: &Path,
        report: &mut ExtractReport,
        progress: &mut dyn ExtractProgress,
    ) -> Result<()> {
        // Dropped at the end of this function whatever happens, taking the
        // clone and its .git with it.
        let scratch = tempfile::Builder::new()
            .prefix(".forklift-")
            .tempdir_in(scratch_root)
            .map_err(|e| Error::io(scratch_root, e))?;
        let clone_dir = scratch.path().join(&source.name);

        log::info!("Cloning {} ({} @ {})", source.name, source.url, source.git_ref);
        self.vcs
            .clone_shallow(&source.url, &source.git_ref, &clone_dir)
            .map_err(|err| match err {
                Error::CloneFailed {
                    url,
                    git_ref,
                    stderr,
                    ..
                } => Error::CloneFailed {
                    source_name: source.name.clone(),
                    url,
                    git_ref,
                    stderr,
                },
                other => other,
            })?;

        for component in &source.components {
            let from = clone_dir.join(component);
            if !from.is_dir() {
                let missing = MissingComponent {
                    source: source.name.clone(),
                    component: component.clone(),
                };
                log::warn!("Subcomponent {missing} not found in clone");
                progress.on_component_missing(&missing);
                report.missing.push(missing);
                continue;
            }

            let to = deploy_dir.join(component);
            fsops::move_dir(&from, &to)?;
            let stripped = fsops::strip_vcs_metadata(&to)?;
            if stripped > 0 {
                log::debug!("Removed {stripped} VCS metadata entries from {component}");
            }

            log::debug!("Extracted {}/{} -> {}", source.name, component, to.display());
            progress.on_component_extracted(source, component);
            report.extracted.push((component.clone(), to));
        }

        scratch.close().map_err(|e| Error::io(&clone_dir, e))?;
        Ok(())
    }
}
