// Pipeline stages
pub mod bootstrap;
pub mod deps;
pub mod extract;
pub mod run;

// Post-install
pub mod configure;

// Inspection
pub mod plan;
pub mod validate;

use anyhow::Result;

use crate::Context;
use crate::config::ForkliftConfig;
use crate::paths;
use crate::ui;

/// Load the config selected by `--config` (or the default location).
pub(crate) fn load_config(ctx: &Context) -> Result<ForkliftConfig> {
    let path = paths::config_file(ctx.config_path.as_deref())?;
    ForkliftConfig::load(&path)
}

/// Print what usually fixes a failed extraction or install.
pub(crate) fn hint(err: &sourcekit::Error) {
    ui::dim(&format!("Hint: {}", err.category().advice()));
}
