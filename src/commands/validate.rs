//! Validate command - load the config and report problems

use anyhow::Result;

use crate::Context as AppContext;
use crate::paths;
use crate::ui;

pub fn run(ctx: &AppContext) -> Result<()> {
    let path = paths::config_file(ctx.config_path.as_deref())?;
    let config = super::load_config(ctx)?;

    let components: usize = config.sources.iter().map(|s| s.components.names().len()).sum();
    ui::success(&format!("{} is valid", path.display()));
    ui::kv("Sources", &config.sources.len().to_string());
    ui::kv("Components", &components.to_string());

    if config.configure.password.is_some() {
        ui::warn("configure.password is stored in the config file; prefer FORKLIFT_ADMIN_PASSWORD");
    }
    for source in config.sources.iter().filter(|s| s.components.names().is_empty()) {
        ui::warn(&format!("Source '{}' declares no components", source.name));
    }
    Ok(())
}
