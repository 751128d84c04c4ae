//! Run command - the full provisioning pipeline
//!
//! extract → deps → bootstrap → restart. Each stage runs to completion before
//! the next one starts; a fatal error stops the pipeline where it is.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::Context as AppContext;
use crate::cli::RunArgs;
use crate::config::ForkliftConfig;
use crate::runner;
use crate::ui;

/// Pipeline stages, in execution order
const STAGES: &[(&str, &str)] = &[
    ("extract", "Clone sources and extract the selected components"),
    ("deps", "Install dependency manifests into the virtualenv"),
    ("bootstrap", "Update the schema and activate components"),
    ("restart", "Restart the host service (settings.restart_service)"),
];

pub fn run(ctx: &AppContext, args: RunArgs) -> Result<()> {
    if args.list_stages {
        list_stages();
        return Ok(());
    }

    let config = super::load_config(ctx)?;
    let stages = determine_stages(&args)?;

    if !config.settings.restart_service && stages.contains(&"restart") && args.only.is_some() {
        ui::warn("settings.restart_service is off; the restart stage will do nothing");
    }

    ui::header("Provisioning");
    ui::kv("Deploy dir", &config.deploy_dir().display().to_string());
    ui::kv("Database", &config.settings.database);
    ui::kv("Stages", &stages.join(", "));

    if args.dry_run {
        super::plan::print_plan(&config);
        println!();
        ui::info("Dry run - nothing was changed");
        return Ok(());
    }

    if !args.yes && !confirm(&config)? {
        ui::info("Aborted");
        return Ok(());
    }

    let total = stages.len();
    for (i, stage) in stages.iter().enumerate() {
        println!();
        ui::step(i + 1, total, &stage_title(stage));
        run_stage(ctx, &config, stage, args.fresh_venv)
            .with_context(|| format!("Stage '{stage}' failed"))?;
    }

    println!();
    ui::success("Provisioning complete");
    Ok(())
}

fn run_stage(ctx: &AppContext, config: &ForkliftConfig, stage: &str, fresh_venv: bool) -> Result<()> {
    match stage {
        "extract" => super::extract::execute(ctx, config).map(|_| ()),
        "deps" => super::deps::execute(ctx, config, fresh_venv).map(|_| ()),
        "bootstrap" => super::bootstrap::execute(ctx, config).map(|_| ()),
        "restart" => restart(config),
        other => anyhow::bail!("Unknown stage '{other}'"),
    }
}

fn restart(config: &ForkliftConfig) -> Result<()> {
    if !config.settings.restart_service {
        ui::dim("Service restart disabled");
        return Ok(());
    }
    let name = &config.settings.service_name;
    runner::restart_service(name)?;
    ui::success(&format!("Restarted {name}"));
    Ok(())
}

fn confirm(config: &ForkliftConfig) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(format!(
            "Provision database '{}' from {} source(s)?",
            config.settings.database,
            config.sources.len()
        ))
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

fn stage_title(stage: &str) -> String {
    STAGES
        .iter()
        .find(|(name, _)| *name == stage)
        .map_or_else(|| stage.to_string(), |(_, desc)| (*desc).to_string())
}

fn parse_stage_list(list: &str) -> Result<Vec<&'static str>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            STAGES
                .iter()
                .map(|(name, _)| *name)
                .find(|name| *name == s)
                .with_context(|| format!("Unknown stage '{s}' (see --list-stages)"))
        })
        .collect()
}

fn determine_stages(args: &RunArgs) -> Result<Vec<&'static str>> {
    let all = STAGES.iter().map(|(name, _)| *name);

    if let Some(ref only) = args.only {
        let only_set = parse_stage_list(only)?;
        return Ok(all.filter(|s| only_set.contains(s)).collect());
    }

    if let Some(ref skip) = args.skip {
        let skip_set = parse_stage_list(skip)?;
        return Ok(all.filter(|s| !skip_set.contains(s)).collect());
    }

    Ok(all.collect())
}

fn list_stages() {
    ui::header("Available Stages");
    println!();
    for (name, desc) in STAGES {
        println!("  {:<12} {}", name.bold(), desc.dimmed());
    }
    println!();
    ui::section("Usage Examples");
    println!();
    println!("  {} Run every stage", "forklift run".bold());
    println!("  {} Skip the restart", "forklift run --skip=restart".bold());
    println!("  {} Re-extract only", "forklift run --only=extract".bold());
    println!("  {} Preview without changes", "forklift run --dry-run".bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(only: Option<&str>, skip: Option<&str>) -> RunArgs {
        RunArgs {
            skip: skip.map(String::from),
            only: only.map(String::from),
            list_stages: false,
            dry_run: false,
            yes: true,
            fresh_venv: false,
        }
    }

    #[test]
    fn test_all_stages_in_order() {
        assert_eq!(
            determine_stages(&args(None, None)).unwrap(),
            vec!["extract", "deps", "bootstrap", "restart"]
        );
    }

    #[test]
    fn test_only_keeps_pipeline_order() {
        assert_eq!(
            determine_stages(&args(Some("bootstrap, extract"), None)).unwrap(),
            vec!["extract", "bootstrap"]
        );
    }

    #[test]
    fn test_skip() {
        assert_eq!(
            determine_stages(&args(None, Some("restart,deps"))).unwrap(),
            vec!["extract", "bootstrap"]
        );
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let err = determine_stages(&args(Some("deploy"), None)).unwrap_err();
        assert!(err.to_string().contains("Unknown stage 'deploy'"));
    }

    #[test]
    fn test_stage_title() {
        assert_eq!(stage_title("deps"), "Install dependency manifests into the virtualenv");
    }
}
