//! Configure command - post-install configuration of a running instance

use anyhow::{Context, Result};
use colored::Colorize;
use hostkit::admin::jsonrpc::JsonRpcAdmin;
use hostkit::configure::{ConfigureReport, Configurator, ItemReport, Outcome};

use crate::Context as AppContext;
use crate::ui;

pub fn run(ctx: &AppContext, dry_run: bool) -> Result<()> {
    let config = super::load_config(ctx)?;
    let c = &config.configure;
    let database = config.admin_database();

    ui::header("Post-install configuration");
    ui::kv("Instance", &c.url);
    ui::kv("Database", database);
    if dry_run {
        ui::kv("Mode", "dry run");
    }
    println!();

    let password = config.admin_password()?;
    let admin = JsonRpcAdmin::connect(&c.url, database, &c.login, &password)
        .with_context(|| format!("Could not connect to {} as '{}'", c.url, c.login))?;

    let report = Configurator::new(&admin)
        .dry_run(dry_run)
        .run(&config.configure_plan(), &mut print_item);

    summarize(&report)
}

fn print_item(item: &ItemReport) {
    let marker = match &item.outcome {
        Outcome::Applied => "✓".green(),
        Outcome::NoChange => "·".dimmed(),
        Outcome::WouldApply => "~".cyan(),
        Outcome::Skipped(_) => "-".yellow(),
        Outcome::NotFound(_) | Outcome::Failed(_) => "✗".red(),
    };
    println!("{marker} {:<40} {}", item.description, item.outcome.to_string().dimmed());
}

fn summarize(report: &ConfigureReport) -> Result<()> {
    println!();
    let applied = report.count(&Outcome::Applied);
    let unchanged = report.count(&Outcome::NoChange);
    let errors = report.errors().count();

    if errors > 0 {
        ui::error(&format!(
            "{errors} item(s) failed, {applied} applied, {unchanged} unchanged"
        ));
        anyhow::bail!("Configuration finished with {errors} error(s)");
    }
    ui::success(&format!("{applied} applied, {unchanged} unchanged"));
    Ok(())
}
