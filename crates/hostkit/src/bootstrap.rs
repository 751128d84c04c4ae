//! Bootstrap sequencer.
//!
//! Entry -> SchemaUpdate -> ComponentActivation -> Done. A non-zero exit in
//! either stage aborts the sequence; nothing already applied is rolled back.
//! The sequencer does no idempotence checks of its own: re-running it against
//! a provisioned database relies on the host treating "activate an active
//! component" as a no-op.

use crate::cli::HostCli;
use crate::error::Result;
use crate::types::{Activation, BootstrapOutcome, BootstrapRequest, Stage};

/// Receives stage transitions.
pub trait BootstrapProgress {
    fn on_stage_start(&mut self, _stage: Stage, _request: &BootstrapRequest) {}
    fn on_stage_complete(&mut self, _stage: Stage) {}
    fn on_nothing_to_install(&mut self) {}
}

pub struct NoProgress;

impl BootstrapProgress for NoProgress {}

/// Drives a [`HostCli`] through the two bootstrap stages.
pub struct Bootstrapper {
    host: Box<dyn HostCli>,
}

impl Bootstrapper {
    pub fn new(host: Box<dyn HostCli>) -> Self {
        Self { host }
    }

    /// Run both stages for `request`.
    pub fn run(
        &self,
        request: &BootstrapRequest,
        progress: &mut dyn BootstrapProgress,
    ) -> Result<BootstrapOutcome> {
        progress.on_stage_start(Stage::SchemaUpdate, request);
        log::info!("Updating base schema of '{}'", request.database);
        self.host
            .update_schema(&request.config_path, &request.database)?;
        progress.on_stage_complete(Stage::SchemaUpdate);

        if !request.has_components() {
            log::info!("No components to install");
            progress.on_nothing_to_install();
            return Ok(BootstrapOutcome {
                schema_updated: true,
                activation: Activation::NothingToInstall,
            });
        }

        progress.on_stage_start(Stage::ComponentActivation, request);
        log::info!(
            "Activating {} on '{}'",
            request.component_string(),
            request.database
        );
        self.host.activate_components(
            &request.config_path,
            &request.database,
            request.components(),
        )?;
        progress.on_stage_complete(Stage::ComponentActivation);

        Ok(BootstrapOutcome {
            schema_updated: true,
            activation: Activation::Activated(request.components().to_vec()),
        })
    }
}
