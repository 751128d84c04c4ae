//! Core types for bootstrap and post-install configuration.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Bootstrap
// ============================================================================

/// A host CLI bootstrap stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Refresh the base schema, then exit
    SchemaUpdate,
    /// Activate the selected components, then exit
    ComponentActivation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaUpdate => write!(f, "schema update"),
            Self::ComponentActivation => write!(f, "component activation"),
        }
    }
}

/// Everything the host CLI needs for one bootstrap run.
///
/// Component names keep their declaration order; duplicates and empty names
/// are dropped when the request is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapRequest {
    pub config_path: PathBuf,
    pub database: String,
    components: Vec<String>,
}

impl BootstrapRequest {
    /// Build a request from per-source component lists, flattened in order.
    pub fn new<I, L, S>(config_path: impl Into<PathBuf>, database: impl Into<String>, lists: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let components = lists
            .into_iter()
            .flatten()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect();

        Self {
            config_path: config_path.into(),
            database: database.into(),
            components,
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Comma-joined component list, empty when nothing is selected.
    pub fn component_string(&self) -> String {
        self.components.join(",")
    }

    pub fn has_components(&self) -> bool {
        !self.components.is_empty()
    }
}

/// What happened during component activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The host activated these components
    Activated(Vec<String>),
    /// Nothing was selected, so the stage did not run
    NothingToInstall,
}

/// Result of a successful bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOutcome {
    pub schema_updated: bool,
    pub activation: Activation,
}

// ============================================================================
// Administrative API records
// ============================================================================

/// Installation state of a host module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Installed,
    Uninstalled,
    Uninstallable,
    ToInstall,
    ToUpgrade,
    ToRemove,
}

impl ModuleState {
    /// Parse the host's state string; unknown strings are treated as
    /// uninstalled.
    pub fn parse(state: &str) -> Self {
        match state {
            "installed" => Self::Installed,
            "uninstallable" => Self::Uninstallable,
            "to install" => Self::ToInstall,
            "to upgrade" => Self::ToUpgrade,
            "to remove" => Self::ToRemove,
            _ => Self::Uninstalled,
        }
    }

    /// Whether the module counts as active.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Installed | Self::ToUpgrade)
    }
}

/// A module record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub id: i64,
    pub name: String,
    pub state: ModuleState,
}

/// A user record with its current group memberships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: i64,
    pub login: String,
    pub group_ids: Vec<i64>,
    pub company_id: Option<i64>,
}

impl UserInfo {
    pub fn has_group(&self, group_id: i64) -> bool {
        self.group_ids.contains(&group_id)
    }
}
