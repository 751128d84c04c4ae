//! Plan command - show what a run would do

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::Context as AppContext;
use crate::config::ForkliftConfig;
use crate::ui;

#[derive(Debug, Serialize)]
struct PlanView {
    deploy_dir: String,
    venv_dir: String,
    host_bin: String,
    host_config: String,
    database: String,
    sources: Vec<SourceView>,
    components: Vec<String>,
    restart_service: Option<String>,
}

#[derive(Debug, Serialize)]
struct SourceView {
    name: String,
    url: String,
    git_ref: String,
    components: Vec<String>,
}

impl PlanView {
    fn from_config(config: &ForkliftConfig) -> Self {
        let request = config.bootstrap_request();
        Self {
            deploy_dir: config.deploy_dir().display().to_string(),
            venv_dir: config.venv_dir().display().to_string(),
            host_bin: config.host_bin().display().to_string(),
            host_config: request.config_path.display().to_string(),
            database: request.database.clone(),
            sources: config
                .source_entries()
                .into_iter()
                .map(|s| SourceView {
                    name: s.name,
                    url: s.url,
                    git_ref: s.git_ref,
                    components: s.components,
                })
                .collect(),
            components: request.components().to_vec(),
            restart_service: config
                .settings
                .restart_service
                .then(|| config.settings.service_name.clone()),
        }
    }
}

pub fn run(ctx: &AppContext, json: bool) -> Result<()> {
    let config = super::load_config(ctx)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&PlanView::from_config(&config))?);
        return Ok(());
    }
    print_plan(&config);
    Ok(())
}

pub(crate) fn print_plan(config: &ForkliftConfig) {
    let view = PlanView::from_config(config);

    ui::section("Sources");
    if view.sources.is_empty() {
        ui::dim("none");
    }
    for source in &view.sources {
        println!("  {} {} @ {}", source.name.bold(), source.url.dimmed(), source.git_ref);
        if source.components.is_empty() {
            ui::dim("  (no components)");
        } else {
            ui::dim(&format!("  {}", source.components.join(" ")));
        }
    }

    ui::section("Bootstrap");
    ui::kv("Host", &view.host_bin);
    ui::kv("Config", &view.host_config);
    ui::kv("Database", &view.database);
    if view.components.is_empty() {
        ui::kv("Install", "(no components to install)");
    } else {
        ui::kv("Install", &view.components.join(","));
    }
    ui::kv(
        "Restart",
        view.restart_service.as_deref().unwrap_or("disabled"),
    );
}
