//! Provisioning configuration (`config.toml`).
//!
//! ```toml
//! [settings]
//! target_root = "/opt/odoo"
//! deploy_dir = "custom-addons"
//! owner = "odoo"
//! group = "odoo"
//! git_ref = "17.0"
//! host_config = "/etc/odoo/odoo.conf"
//! database = "prod"
//!
//! [[sources]]
//! name = "web"
//! url = "https://github.com/OCA/web.git"
//! components = ["web_responsive", "web_dialog_size"]
//!
//! [configure]
//! url = "http://localhost:8069"
//! ```

use anyhow::{Context, Result, bail};
use hostkit::BootstrapRequest;
use hostkit::configure::ConfigurePlan;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sourcekit::{ClonePolicy, Ownership, SourceEntry};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::paths;

/// Environment variable holding the administrative password
pub const ENV_ADMIN_PASSWORD: &str = "FORKLIFT_ADMIN_PASSWORD";

/// Valid source and component names: no separators, no leading dot
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("valid regex"));

// ============================================================================
// Main Config Schema
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForkliftConfig {
    pub settings: Settings,

    /// Sources in declaration order
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub configure: ConfigureConfig,
}

impl ForkliftConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        log::debug!(
            "Loaded {} source(s) from {}",
            config.sources.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate TOML.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;

        let mut names = HashSet::new();
        // component -> owning source
        let mut owners: HashMap<&str, &str> = HashMap::new();

        for source in &self.sources {
            source
                .validate()
                .with_context(|| format!("Invalid source '{}'", source.name))?;

            if !names.insert(source.name.as_str()) {
                bail!("Duplicate source name '{}'", source.name);
            }

            for component in source.components.names() {
                if let Some(owner) = owners.insert(component, &source.name) {
                    if owner == source.name {
                        bail!(
                            "Component '{component}' is listed twice in source '{}'",
                            source.name
                        );
                    }
                    bail!(
                        "Component '{component}' is declared by both '{owner}' and '{}'",
                        source.name
                    );
                }
            }
        }

        Ok(())
    }

    /// Root everything relative is anchored at.
    pub fn target_root(&self) -> PathBuf {
        paths::expand(&self.settings.target_root)
    }

    pub fn deploy_dir(&self) -> PathBuf {
        paths::resolve(&self.target_root(), &self.settings.deploy_dir)
    }

    pub fn venv_dir(&self) -> PathBuf {
        paths::resolve(&self.target_root(), &self.settings.venv_dir)
    }

    pub fn host_bin(&self) -> PathBuf {
        paths::resolve(&self.target_root(), &self.settings.host_bin)
    }

    pub fn host_config(&self) -> PathBuf {
        paths::expand(&self.settings.host_config)
    }

    pub fn ownership(&self) -> Ownership {
        Ownership {
            user: self.settings.owner.clone(),
            group: self.settings.group.clone(),
        }
    }

    pub fn clone_policy(&self) -> ClonePolicy {
        self.settings.on_clone_failure.into()
    }

    /// Sources with the global ref filled in where none is pinned.
    pub fn source_entries(&self) -> Vec<SourceEntry> {
        self.sources
            .iter()
            .map(|s| {
                let git_ref = s.git_ref.as_deref().unwrap_or(&self.settings.git_ref);
                SourceEntry::new(&s.name, &s.url, git_ref).with_components(s.components.names())
            })
            .collect()
    }

    pub fn bootstrap_request(&self) -> BootstrapRequest {
        BootstrapRequest::new(
            self.host_config(),
            &self.settings.database,
            self.sources.iter().map(|s| s.components.names()),
        )
    }

    pub fn configure_plan(&self) -> ConfigurePlan {
        let c = &self.configure;
        ConfigurePlan {
            platform_modules: c.platform_modules.clone(),
            localization_module: c.localization_module.clone(),
            login: c.target_user.clone(),
            groups: c.groups.clone(),
            features: c.features.clone(),
            chart_template: c.chart_template.clone(),
        }
    }

    /// Database the configurator connects to.
    pub fn admin_database(&self) -> &str {
        self.configure
            .database
            .as_deref()
            .unwrap_or(&self.settings.database)
    }

    /// Administrative password, from the environment first.
    pub fn admin_password(&self) -> Result<String> {
        if let Ok(password) = std::env::var(ENV_ADMIN_PASSWORD) {
            return Ok(password);
        }
        self.configure.password.clone().with_context(|| {
            format!("No admin password: set {ENV_ADMIN_PASSWORD} or configure.password")
        })
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Installation root of the host application
    #[serde(default = "default_target_root")]
    pub target_root: String,

    /// Flat directory receiving the extracted components
    #[serde(default = "default_deploy_dir")]
    pub deploy_dir: String,

    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub group: Option<String>,

    /// Ref used by sources that don't pin their own
    pub git_ref: String,

    /// Host configuration file passed with `-c`
    pub host_config: String,

    pub database: String,

    #[serde(default = "default_host_bin")]
    pub host_bin: String,

    #[serde(default = "default_venv_dir")]
    pub venv_dir: String,

    /// Interpreter used to create the virtualenv
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    #[serde(default)]
    pub on_clone_failure: OnCloneFailure,

    /// Restart the host service after bootstrap
    #[serde(default)]
    pub restart_service: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("git_ref", &self.git_ref),
            ("host_config", &self.host_config),
            ("database", &self.database),
            ("deploy_dir", &self.deploy_dir),
            ("manifest_name", &self.manifest_name),
        ] {
            if value.trim().is_empty() {
                bail!("settings.{key} cannot be empty");
            }
        }
        if self.restart_service && self.service_name.trim().is_empty() {
            bail!("settings.service_name cannot be empty when restart_service is set");
        }
        Ok(())
    }
}

fn default_target_root() -> String {
    "/opt/odoo".to_string()
}

fn default_deploy_dir() -> String {
    "custom-addons".to_string()
}

fn default_host_bin() -> String {
    "odoo-bin".to_string()
}

fn default_venv_dir() -> String {
    "venv".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_manifest_name() -> String {
    sourcekit::deps::DEFAULT_MANIFEST.to_string()
}

fn default_service_name() -> String {
    "odoo".to_string()
}

/// `settings.on_clone_failure`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnCloneFailure {
    #[default]
    Abort,
    Skip,
}

impl From<OnCloneFailure> for ClonePolicy {
    fn from(value: OnCloneFailure) -> Self {
        match value {
            OnCloneFailure::Abort => ClonePolicy::Abort,
            OnCloneFailure::Skip => ClonePolicy::Skip,
        }
    }
}

// ============================================================================
// Sources
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,

    /// Overrides `settings.git_ref`
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,

    #[serde(default)]
    pub components: Components,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if !NAME_RE.is_match(&self.name) {
            bail!("Source name must match {}", NAME_RE.as_str());
        }
        if self.url.trim().is_empty() {
            bail!("Source URL cannot be empty");
        }
        if self.git_ref.as_ref().is_some_and(|r| r.trim().is_empty()) {
            bail!("Source ref cannot be empty");
        }
        for component in self.components.names() {
            if !NAME_RE.is_match(component) {
                bail!("Invalid component name '{component}'");
            }
        }
        Ok(())
    }
}

/// Component list: a TOML array, or one space-separated string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Components {
    List(Vec<String>),
    Spaced(String),
}

impl Default for Components {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl Components {
    /// Component names in order, without empty entries.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::List(list) => list
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect(),
            Self::Spaced(s) => s.split_whitespace().collect(),
        }
    }
}

// ============================================================================
// Configure
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigureConfig {
    /// Base URL of the running instance
    pub url: String,
    /// Defaults to `settings.database`
    pub database: Option<String>,
    /// Login used to authenticate
    pub login: String,
    /// Prefer FORKLIFT_ADMIN_PASSWORD over storing this in the file
    pub password: Option<String>,
    pub platform_modules: Vec<String>,
    pub localization_module: Option<String>,
    /// Account receiving the groups
    pub target_user: String,
    pub groups: Vec<String>,
    pub features: Vec<String>,
    pub chart_template: Option<String>,
}

impl Default for ConfigureConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8069".to_string(),
            database: None,
            login: "admin".to_string(),
            password: None,
            platform_modules: vec!["stock".to_string(), "account".to_string()],
            localization_module: Some("l10n_de_skr03".to_string()),
            target_user: "admin".to_string(),
            groups: vec![
                "stock.group_stock_manager".to_string(),
                "account.group_account_manager".to_string(),
                "base.group_multi_currency".to_string(),
            ],
            features: vec![
                "group_multi_currency".to_string(),
                "group_stock_multi_locations".to_string(),
                "group_uom".to_string(),
            ],
            chart_template: Some("Deutscher Kontenplan SKR03".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[settings]
target_root = "/opt/odoo"
git_ref = "17.0"
host_config = "/etc/odoo/odoo.conf"
database = "prod"
"#;

    fn with_sources(sources: &str) -> String {
        format!("{BASE}\n{sources}")
    }

    #[test]
    fn test_parse_example_config() {
        let config = ForkliftConfig::parse(&with_sources(
            r#"
[[sources]]
name = "A"
url = "https://example.com/a.git"
components = ["m1", "m2"]

[[sources]]
name = "B"
url = "https://example.com/b.git"
ref = "v2"
components = "m3"
"#,
        ))
        .unwrap();

        let entries = config.source_entries();
        assert_eq!(entries[0].git_ref, "17.0");
        assert_eq!(entries[1].git_ref, "v2");
        assert_eq!(entries[1].components, vec!["m3"]);
        assert_eq!(config.bootstrap_request().component_string(), "m1,m2,m3");
        assert_eq!(config.deploy_dir(), PathBuf::from("/opt/odoo/custom-addons"));
        assert_eq!(config.venv_dir(), PathBuf::from("/opt/odoo/venv"));
        assert_eq!(config.host_bin(), PathBuf::from("/opt/odoo/odoo-bin"));
        assert_eq!(config.clone_policy(), ClonePolicy::Abort);
        assert!(config.ownership().is_unchanged());
    }

    #[test]
    fn test_space_separated_components() {
        let config = ForkliftConfig::parse(&with_sources(
            r#"
[[sources]]
name = "A"
url = "https://example.com/a.git"
components = "m1  m2 "
"#,
        ))
        .unwrap();
        assert_eq!(config.sources[0].components.names(), vec!["m1", "m2"]);
    }

    #[test]
    fn test_no_components_gives_empty_request() {
        let config = ForkliftConfig::parse(&with_sources(
            r#"
[[sources]]
name = "A"
url = "https://example.com/a.git"
"#,
        ))
        .unwrap();
        assert!(!config.bootstrap_request().has_components());
    }

    #[test]
    fn test_collision_across_sources_rejected() {
        let err = ForkliftConfig::parse(&with_sources(
            r#"
[[sources]]
name = "A"
url = "https://example.com/a.git"
components = ["m1"]

[[sources]]
name = "B"
url = "https://example.com/b.git"
components = ["m1"]
"#,
        ))
        .unwrap_err();
        assert!(format!("{err:#}").contains("declared by both 'A' and 'B'"));
    }

    #[test]
    fn test_duplicate_source_name_rejected() {
        let err = ForkliftConfig::parse(&with_sources(
            r#"
[[sources]]
name = "A"
url = "https://example.com/a.git"

[[sources]]
name = "A"
url = "https://example.com/other.git"
"#,
        ))
        .unwrap_err();
        assert!(format!("{err:#}").contains("Duplicate source name 'A'"));
    }

    #[test]
    fn test_invalid_component_name_rejected() {
        for bad in ["../etc", ".hidden", "a/b"] {
            let toml = with_sources(&format!(
                r#"
[[sources]]
name = "A"
url = "https://example.com/a.git"
components = ["{bad}"]
"#
            ));
            assert!(ForkliftConfig::parse(&toml).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_missing_required_setting() {
        let err = ForkliftConfig::parse(
            r#"
[settings]
git_ref = "17.0"
host_config = "/etc/odoo/odoo.conf"
database = ""
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("settings.database cannot be empty"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let toml = format!("{BASE}\nunknown = 1\n");
        assert!(ForkliftConfig::parse(&toml).is_err());
    }

    #[test]
    fn test_skip_policy_and_ownership() {
        let config = ForkliftConfig::parse(
            r#"
[settings]
git_ref = "17.0"
host_config = "/etc/odoo/odoo.conf"
database = "prod"
owner = "odoo"
group = "odoo"
on_clone_failure = "skip"
"#,
        )
        .unwrap();
        assert_eq!(config.clone_policy(), ClonePolicy::Skip);
        assert_eq!(config.ownership().user.as_deref(), Some("odoo"));
    }

    #[test]
    fn test_configure_defaults() {
        let config = ForkliftConfig::parse(BASE).unwrap();
        let plan = config.configure_plan();
        assert_eq!(plan.platform_modules, vec!["stock", "account"]);
        assert_eq!(plan.localization_module.as_deref(), Some("l10n_de_skr03"));
        assert_eq!(plan.features.len(), 3);
        assert_eq!(config.admin_database(), "prod");
    }

    #[test]
    fn test_configure_overrides() {
        let toml = format!(
            r#"{BASE}
[configure]
database = "staging"
target_user = "ops"
groups = []
localization_module = "l10n_ch"
"#
        );
        let config = ForkliftConfig::parse(&toml).unwrap();
        let plan = config.configure_plan();
        assert_eq!(config.admin_database(), "staging");
        assert_eq!(plan.login, "ops");
        assert!(plan.groups.is_empty());
        assert_eq!(plan.localization_module.as_deref(), Some("l10n_ch"));
        // Unset keys keep their defaults
        assert_eq!(plan.platform_modules, vec!["stock", "account"]);
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not toml [").unwrap();

        let err = ForkliftConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }
}
