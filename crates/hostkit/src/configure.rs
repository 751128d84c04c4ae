//! Post-install configuration against a running instance.
//!
//! Each mutation is a [`Step`]: it looks up the current state, compares it to
//! what it wants, and applies a change only when something is missing. The
//! [`Configurator`] runs the steps in a fixed order and collects one
//! [`ItemReport`] per item. Item failures do not stop independent items;
//! a missing user stops everything that depends on it.

use crate::admin::AdminApi;
use crate::error::{Error, Result};
use std::fmt;

/// What a step found when it looked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    /// Already as wanted
    Satisfied,
    /// Needs a change
    Pending,
    /// Cannot be applied right now, with the reason
    Blocked(String),
}

/// Outcome of one configuration item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The change was made
    Applied,
    /// Nothing to do
    NoChange,
    /// Dry run: the change would be made
    WouldApply,
    /// A record the item needs does not exist
    NotFound(String),
    /// The item was not attempted
    Skipped(String),
    /// The item failed
    Failed(String),
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Failed(_))
    }

    fn from_error(err: &Error) -> Self {
        match err {
            Error::NotFound { .. } => Self::NotFound(err.to_string()),
            other => Self::Failed(other.to_string()),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::NoChange => write!(f, "no change"),
            Self::WouldApply => write!(f, "would apply"),
            Self::NotFound(msg) | Self::Failed(msg) => write!(f, "{msg}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// An idempotent configuration command.
pub trait Step {
    /// Stable identifier, e.g. `module:account`
    fn id(&self) -> String;

    fn description(&self) -> String;

    /// Look up the current state on the instance.
    fn current_state(&self, api: &dyn AdminApi) -> Result<StepState>;

    /// Make the change. Only called when the state is [`StepState::Pending`].
    fn converge(&self, api: &dyn AdminApi) -> Result<()>;

    /// Lookup, compare, and apply if needed.
    fn apply(&self, api: &dyn AdminApi, dry_run: bool) -> Outcome {
        match self.current_state(api) {
            Err(e) => Outcome::from_error(&e),
            Ok(StepState::Satisfied) => Outcome::NoChange,
            Ok(StepState::Blocked(reason)) => Outcome::Skipped(reason),
            Ok(StepState::Pending) if dry_run => Outcome::WouldApply,
            Ok(StepState::Pending) => match self.converge(api) {
                Ok(()) => Outcome::Applied,
                Err(e) => Outcome::from_error(&e),
            },
        }
    }
}

// ============================================================================
// Steps
// ============================================================================

/// A module is installed.
#[derive(Debug, Clone)]
pub struct ModuleActive {
    pub name: String,
}

impl ModuleActive {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Step for ModuleActive {
    fn id(&self) -> String {
        format!("module:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Install module {}", self.name)
    }

    fn current_state(&self, api: &dyn AdminApi) -> Result<StepState> {
        match api.find_module(&self.name)? {
            None => Err(Error::NotFound {
                kind: "module",
                name: self.name.clone(),
            }),
            Some(module) if module.state.is_active() => Ok(StepState::Satisfied),
            Some(_) => Ok(StepState::Pending),
        }
    }

    fn converge(&self, api: &dyn AdminApi) -> Result<()> {
        let module = api.find_module(&self.name)?.ok_or_else(|| Error::NotFound {
            kind: "module",
            name: self.name.clone(),
        })?;
        log::info!("Installing module {}", self.name);
        api.install_module(&module)
    }
}

/// A user holds a permission group.
#[derive(Debug, Clone)]
pub struct GroupMembership {
    pub login: String,
    pub group: String,
}

impl GroupMembership {
    pub fn new(login: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            group: group.into(),
        }
    }

    fn resolve(&self, api: &dyn AdminApi) -> Result<(i64, i64, bool)> {
        let group_id = api.resolve_group(&self.group)?.ok_or_else(|| Error::NotFound {
            kind: "group",
            name: self.group.clone(),
        })?;
        let user = api.find_user(&self.login)?.ok_or_else(|| Error::NotFound {
            kind: "user",
            name: self.login.clone(),
        })?;
        Ok((user.id, group_id, user.has_group(group_id)))
    }
}

impl Step for GroupMembership {
    fn id(&self) -> String {
        format!("group:{}", self.group)
    }

    fn description(&self) -> String {
        format!("Add {} to {}", self.login, self.group)
    }

    fn current_state(&self, api: &dyn AdminApi) -> Result<StepState> {
        let (_, _, held) = self.resolve(api)?;
        Ok(if held {
            StepState::Satisfied
        } else {
            StepState::Pending
        })
    }

    fn converge(&self, api: &dyn AdminApi) -> Result<()> {
        let (user_id, group_id, held) = self.resolve(api)?;
        if held {
            return Ok(());
        }
        log::info!("Adding {} to {}", self.login, self.group);
        api.add_user_group(user_id, group_id)
    }
}

/// Boolean settings set to true.
///
/// The host exposes no cheap way to read them back, so they are always
/// re-applied.
#[derive(Debug, Clone)]
pub struct FeatureFlags {
    pub flags: Vec<String>,
}

impl FeatureFlags {
    pub fn new(flags: Vec<String>) -> Self {
        Self { flags }
    }
}

impl Step for FeatureFlags {
    fn id(&self) -> String {
        format!("settings:{}", self.flags.join(","))
    }

    fn description(&self) -> String {
        format!("Enable {}", self.flags.join(", "))
    }

    fn current_state(&self, _api: &dyn AdminApi) -> Result<StepState> {
        Ok(if self.flags.is_empty() {
            StepState::Satisfied
        } else {
            StepState::Pending
        })
    }

    fn converge(&self, api: &dyn AdminApi) -> Result<()> {
        let settings: Vec<(String, bool)> = self.flags.iter().map(|f| (f.clone(), true)).collect();
        log::info!("Applying settings {}", self.flags.join(", "));
        api.apply_settings(&settings)
    }
}

/// A configuration template is bound to the company and loaded.
///
/// Requires the localization module to be active.
#[derive(Debug, Clone)]
pub struct ChartTemplateLoaded {
    pub module: String,
    pub template: String,
    pub company_id: Option<i64>,
}

impl ChartTemplateLoaded {
    fn lookup(&self, api: &dyn AdminApi) -> Result<std::result::Result<i64, String>> {
        let active = api
            .find_module(&self.module)?
            .is_some_and(|m| m.state.is_active());
        if !active {
            return Ok(Err(format!("module {} is not active", self.module)));
        }
        Ok(api
            .find_chart_template(&self.template)?
            .ok_or_else(|| format!("template not found: {}", self.template)))
    }
}

impl Step for ChartTemplateLoaded {
    fn id(&self) -> String {
        format!("template:{}", self.template)
    }

    fn description(&self) -> String {
        format!("Load template {}", self.template)
    }

    fn current_state(&self, api: &dyn AdminApi) -> Result<StepState> {
        Ok(match self.lookup(api)? {
            Ok(_) => StepState::Pending,
            Err(reason) => StepState::Blocked(reason),
        })
    }

    fn converge(&self, api: &dyn AdminApi) -> Result<()> {
        match self.lookup(api)? {
            Ok(template_id) => {
                log::info!("Loading template {}", self.template);
                api.load_chart_template(template_id, self.company_id)
            }
            Err(reason) => Err(Error::NotFound {
                kind: "template",
                name: reason,
            }),
        }
    }
}

// ============================================================================
// Configurator
// ============================================================================

/// What to configure.
#[derive(Debug, Clone, Default)]
pub struct ConfigurePlan {
    pub platform_modules: Vec<String>,
    pub localization_module: Option<String>,
    pub login: String,
    pub groups: Vec<String>,
    pub features: Vec<String>,
    pub chart_template: Option<String>,
}

/// One line of a [`ConfigureReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub id: String,
    pub description: String,
    pub outcome: Outcome,
}

/// Per-item outcomes of a configuration run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct ConfigureReport {
    pub items: Vec<ItemReport>,
}

impl ConfigureReport {
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.outcome.is_error())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.outcome.is_error())
    }

    pub fn count(&self, outcome: &Outcome) -> usize {
        self.items.iter().filter(|i| &i.outcome == outcome).count()
    }

    pub fn find(&self, id: &str) -> Option<&ItemReport> {
        self.items.iter().find(|i| i.id == id)
    }

    fn push(&mut self, item: ItemReport, on_item: &mut dyn FnMut(&ItemReport)) {
        on_item(&item);
        self.items.push(item);
    }
}

/// Runs configuration steps against an [`AdminApi`].
pub struct Configurator<'a> {
    api: &'a dyn AdminApi,
    dry_run: bool,
}

impl<'a> Configurator<'a> {
    pub fn new(api: &'a dyn AdminApi) -> Self {
        Self { api, dry_run: false }
    }

    /// Look up state without changing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the plan. `on_item` sees each report as it is produced.
    pub fn run(&self, plan: &ConfigurePlan, on_item: &mut dyn FnMut(&ItemReport)) -> ConfigureReport {
        let mut report = ConfigureReport::default();

        for module in plan.platform_modules.iter().chain(&plan.localization_module) {
            report.push(self.apply(&ModuleActive::new(module)), on_item);
        }

        let user = match self.api.find_user(&plan.login) {
            Ok(Some(user)) => user,
            Ok(None) => {
                let err = Error::NotFound {
                    kind: "user",
                    name: plan.login.clone(),
                };
                report.push(Self::user_lookup(plan, &err), on_item);
                return report;
            }
            Err(e) => {
                report.push(Self::user_lookup(plan, &e), on_item);
                return report;
            }
        };

        for group in &plan.groups {
            report.push(self.apply(&GroupMembership::new(&plan.login, group)), on_item);
        }

        if !plan.features.is_empty() {
            report.push(self.apply(&FeatureFlags::new(plan.features.clone())), on_item);
        }

        if !self.dry_run {
            if let Err(e) = self.api.commit() {
                report.push(
                    ItemReport {
                        id: "commit".to_string(),
                        description: "Commit changes".to_string(),
                        outcome: Outcome::from_error(&e),
                    },
                    on_item,
                );
            }
        }

        if let (Some(module), Some(template)) = (&plan.localization_module, &plan.chart_template) {
            let step = ChartTemplateLoaded {
                module: module.clone(),
                template: template.clone(),
                company_id: user.company_id,
            };
            report.push(self.apply(&step), on_item);
        }

        report
    }

    fn user_lookup(plan: &ConfigurePlan, err: &Error) -> ItemReport {
        log::warn!("{err}");
        ItemReport {
            id: format!("user:{}", plan.login),
            description: format!("Look up user {}", plan.login),
            outcome: Outcome::from_error(err),
        }
    }

    fn apply(&self, step: &dyn Step) -> ItemReport {
        log::debug!("{}: {}", step.id(), step.description());
        let outcome = step.apply(self.api, self.dry_run);
        if outcome.is_error() {
            log::warn!("{}: {outcome}", step.id());
        }
        ItemReport {
            id: step.id(),
            description: step.description(),
            outcome,
        }
    }
}
