//! Bootstrap command - schema update, then component activation

use anyhow::{Context, Result};
use hostkit::bootstrap::{BootstrapProgress, Bootstrapper};
use hostkit::cli::process::ProcessHostCli;
use hostkit::{Activation, BootstrapOutcome, BootstrapRequest, Stage};
use sourcekit::VirtualEnv;

use crate::Context as AppContext;
use crate::config::ForkliftConfig;
use crate::progress::Spinner;
use crate::ui;

pub fn run(ctx: &AppContext) -> Result<()> {
    let config = super::load_config(ctx)?;
    execute(ctx, &config)?;
    Ok(())
}

pub(crate) fn execute(ctx: &AppContext, config: &ForkliftConfig) -> Result<BootstrapOutcome> {
    let request = config.bootstrap_request();
    let venv = VirtualEnv::new(config.venv_dir());

    let mut host = ProcessHostCli::new(config.host_bin());
    let active = if venv.exists() {
        let active = venv.activate();
        host = host
            .with_interpreter(venv.python())
            .with_envs(venv.env_vars());
        Some(active)
    } else {
        ui::warn(&format!(
            "No virtualenv at {}, running the host with the system environment",
            venv.root().display()
        ));
        None
    };

    let mut progress = CliProgress {
        quiet: ctx.quiet,
        pb: None,
    };
    let outcome = Bootstrapper::new(Box::new(host))
        .run(&request, &mut progress)
        .with_context(|| format!("Bootstrap of database '{}' failed", request.database))?;
    drop(active);

    match &outcome.activation {
        Activation::Activated(components) => {
            ui::success(&format!("Activated {} component(s)", components.len()));
        }
        Activation::NothingToInstall => ui::info("No components to install"),
    }
    Ok(outcome)
}

struct CliProgress {
    quiet: bool,
    pb: Option<Spinner>,
}

impl BootstrapProgress for CliProgress {
    fn on_stage_start(&mut self, stage: Stage, request: &BootstrapRequest) {
        let msg = match stage {
            Stage::SchemaUpdate => format!("Updating schema of '{}'", request.database),
            Stage::ComponentActivation => format!("Activating {}", request.component_string()),
        };
        self.pb = Some(Spinner::start(&msg, self.quiet));
    }

    fn on_stage_complete(&mut self, stage: Stage) {
        if let Some(pb) = self.pb.take() {
            pb.success(&format!("{stage} done"));
        }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.pb.take() {
            pb.clear();
        }
    }
}
