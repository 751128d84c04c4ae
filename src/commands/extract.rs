//! Extract command - clone sources and lift the selected components

use anyhow::{Context, Result};
use colored::Colorize;
use sourcekit::backend::git::GitCli;
use sourcekit::extract::{ExtractOptions, ExtractProgress, Extractor};
use sourcekit::{Error as SourceError, ExtractReport, MissingComponent, SourceEntry};

use crate::Context as AppContext;
use crate::config::ForkliftConfig;
use crate::progress::Spinner;
use crate::ui;

pub fn run(ctx: &AppContext) -> Result<()> {
    let config = super::load_config(ctx)?;
    execute(ctx, &config)?;
    Ok(())
}

pub(crate) fn execute(ctx: &AppContext, config: &ForkliftConfig) -> Result<ExtractReport> {
    let sources = config.source_entries();
    let deploy_dir = config.deploy_dir();

    if sources.is_empty() {
        ui::info("No sources declared");
    }

    let opts = ExtractOptions {
        ownership: config.ownership(),
        clone_policy: config.clone_policy(),
        scratch_root: None,
    };

    let extractor = Extractor::new(Box::new(GitCli::new()));
    let mut progress = CliProgress::new(sources.len(), ctx.quiet);
    let report = extractor
        .extract(&sources, &deploy_dir, &opts, &mut progress)
        .inspect_err(super::hint)
        .with_context(|| format!("Extraction into {} failed", deploy_dir.display()))?;

    print_summary(&report, &deploy_dir.display().to_string());
    Ok(report)
}

fn print_summary(report: &ExtractReport, deploy_dir: &str) {
    println!();
    ui::success(&format!(
        "{} component(s) in {}",
        report.extracted.len().to_string().bold(),
        deploy_dir
    ));
    if report.is_complete() {
        return;
    }
    if !report.missing.is_empty() {
        let names: Vec<String> = report.missing.iter().map(ToString::to_string).collect();
        ui::warn(&format!("Missing: {}", names.join(", ")));
    }
    for failed in &report.failed_sources {
        ui::warn(&format!("Skipped {}: {}", failed.source, failed.error));
    }
}

/// Per-source spinner.
struct CliProgress {
    total: usize,
    index: usize,
    extracted: usize,
    quiet: bool,
    pb: Option<Spinner>,
}

impl CliProgress {
    fn new(total: usize, quiet: bool) -> Self {
        Self {
            total,
            index: 0,
            extracted: 0,
            quiet,
            pb: None,
        }
    }
}

impl ExtractProgress for CliProgress {
    fn on_source_start(&mut self, source: &SourceEntry) {
        self.index += 1;
        self.extracted = 0;
        let msg = format!(
            "[{}/{}] {} @ {}",
            self.index, self.total, source.name, source.git_ref
        );
        self.pb = Some(Spinner::start(&msg, self.quiet));
    }

    fn on_component_extracted(&mut self, _source: &SourceEntry, _component: &str) {
        self.extracted += 1;
    }

    fn on_component_missing(&mut self, missing: &MissingComponent) {
        let msg = format!("Component {missing} not found");
        match &self.pb {
            Some(pb) => pb.suspend(|| ui::warn(&msg)),
            None => ui::warn(&msg),
        }
    }

    fn on_source_failed(&mut self, source: &SourceEntry, error: &SourceError) {
        if let Some(pb) = self.pb.take() {
            pb.warn(&format!("{}: {}", source.name, error.category().description()));
        }
        super::hint(error);
    }

    fn on_source_done(&mut self, source: &SourceEntry) {
        if let Some(pb) = self.pb.take() {
            pb.success(&format!("{}: {} component(s)", source.name, self.extracted));
        }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        // Clone failure under the abort policy leaves a spinner running
        if let Some(pb) = self.pb.take() {
            pb.clear();
        }
    }
}
