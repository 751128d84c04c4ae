//! Deps command - install dependency manifests into the virtualenv

use anyhow::{Context, Result};
use sourcekit::VirtualEnv;
use sourcekit::deps::{DependencyPass, PipInstaller};
use std::path::PathBuf;

use crate::Context as AppContext;
use crate::config::ForkliftConfig;
use crate::progress::Spinner;
use crate::ui;

pub fn run(ctx: &AppContext, fresh_venv: bool) -> Result<()> {
    let config = super::load_config(ctx)?;
    execute(ctx, &config, fresh_venv)?;
    Ok(())
}

pub(crate) fn execute(ctx: &AppContext, config: &ForkliftConfig, fresh_venv: bool) -> Result<Vec<PathBuf>> {
    let venv = VirtualEnv::new(config.venv_dir());
    let deploy_dir = config.deploy_dir();

    let spinner = Spinner::start(&format!("Preparing virtualenv {}", venv.root().display()), ctx.quiet);
    if let Err(e) = venv.ensure(&config.settings.python, fresh_venv) {
        spinner.error("Virtualenv setup failed");
        super::hint(&e);
        return Err(e).context("Could not prepare the virtualenv");
    }
    spinner.success(&format!("Virtualenv {}", venv.root().display()));

    let pass = DependencyPass::new(Box::new(PipInstaller::new()))
        .with_manifest_name(&config.settings.manifest_name);

    let mut count = 0;
    let installed = pass
        .run(&deploy_dir, &venv, &mut |manifest| {
            count += 1;
            let rel = manifest.strip_prefix(&deploy_dir).unwrap_or(manifest);
            if !ctx.quiet {
                ui::dim(&format!(
                    "[{count}] pip install -r {}",
                    ui::truncate_path(&rel.display().to_string(), 60)
                ));
            }
        })
        .inspect_err(super::hint)
        .context("Dependency installation failed")?;

    if installed.is_empty() {
        ui::info(&format!(
            "No {} found, nothing to install",
            config.settings.manifest_name
        ));
    } else {
        ui::success(&format!("Installed {} manifest(s)", installed.len()));
    }
    Ok(installed)
}
