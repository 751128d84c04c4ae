//! Administrative API of a running host instance.
//!
//! The [`AdminApi`] trait covers the handful of record operations the
//! post-install configurator needs. [`jsonrpc::JsonRpcAdmin`] talks to a live
//! instance; [`MemoryAdmin`] is an in-memory stand-in for tests.

pub mod jsonrpc;

use crate::error::{Error, Result};
use crate::types::{ModuleInfo, ModuleState, UserInfo};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Record-level operations against a running host instance.
pub trait AdminApi {
    /// Look up a module by technical name.
    fn find_module(&self, name: &str) -> Result<Option<ModuleInfo>>;

    /// Install (activate) a module.
    fn install_module(&self, module: &ModuleInfo) -> Result<()>;

    /// Look up a user by login, including group memberships.
    fn find_user(&self, login: &str) -> Result<Option<UserInfo>>;

    /// Resolve a permission group by external identifier (`module.name`).
    fn resolve_group(&self, xml_id: &str) -> Result<Option<i64>>;

    /// Add `group_id` to the user's groups, keeping existing ones.
    fn add_user_group(&self, user_id: i64, group_id: i64) -> Result<()>;

    /// Create a settings record with these boolean fields and apply it.
    fn apply_settings(&self, settings: &[(String, bool)]) -> Result<()>;

    /// Commit pending changes.
    fn commit(&self) -> Result<()>;

    /// Look up a configuration template by exact name.
    fn find_chart_template(&self, name: &str) -> Result<Option<i64>>;

    /// Load a template into the company, binding it as the company's
    /// template. A company that already has one is left as it is.
    fn load_chart_template(&self, template_id: i64, company_id: Option<i64>) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    modules: HashMap<String, ModuleInfo>,
    users: HashMap<String, UserInfo>,
    groups: HashMap<String, i64>,
    templates: HashMap<String, i64>,
    pending_settings: BTreeMap<String, bool>,
    settings: BTreeMap<String, bool>,
    company_templates: HashMap<i64, i64>,
    loaded_template: Option<(i64, Option<i64>)>,
    calls: Vec<String>,
}

impl MemoryState {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory administrative API.
#[derive(Debug, Default)]
pub struct MemoryAdmin {
    state: Mutex<MemoryState>,
}

impl MemoryAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, name: &str, state: ModuleState) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            let id = s.alloc_id();
            s.modules.insert(
                name.to_string(),
                ModuleInfo {
                    id,
                    name: name.to_string(),
                    state,
                },
            );
        }
        self
    }

    pub fn with_user(self, login: &str) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            let id = s.alloc_id();
            s.users.insert(
                login.to_string(),
                UserInfo {
                    id,
                    login: login.to_string(),
                    group_ids: Vec::new(),
                    company_id: Some(1),
                },
            );
        }
        self
    }

    pub fn with_group(self, xml_id: &str) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            let id = s.alloc_id();
            s.groups.insert(xml_id.to_string(), id);
        }
        self
    }

    pub fn with_template(self, name: &str) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            let id = s.alloc_id();
            s.templates.insert(name.to_string(), id);
        }
        self
    }

    /// Bind `template` to `company_id` as if it had been loaded before.
    pub fn with_company_template(self, company_id: i64, template: &str) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            let id = match s.templates.get(template) {
                Some(id) => *id,
                None => {
                    let id = s.alloc_id();
                    s.templates.insert(template.to_string(), id);
                    id
                }
            };
            s.company_templates.insert(company_id, id);
        }
        self
    }

    pub fn company_template(&self, company_id: i64) -> Option<i64> {
        self.state.lock().unwrap().company_templates.get(&company_id).copied()
    }

    pub fn module_state(&self, name: &str) -> Option<ModuleState> {
        self.state.lock().unwrap().modules.get(name).map(|m| m.state)
    }

    /// Group identifiers held by `login`.
    pub fn user_groups(&self, login: &str) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(login)
            .map(|u| u.group_ids.clone())
            .unwrap_or_default()
    }

    pub fn group_id(&self, xml_id: &str) -> Option<i64> {
        self.state.lock().unwrap().groups.get(xml_id).copied()
    }

    /// Settings visible after the last commit.
    pub fn committed_settings(&self) -> BTreeMap<String, bool> {
        self.state.lock().unwrap().settings.clone()
    }

    pub fn loaded_template(&self) -> Option<(i64, Option<i64>)> {
        self.state.lock().unwrap().loaded_template
    }

    /// Names of the API methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: impl Into<String>) -> std::sync::MutexGuard<'_, MemoryState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.into());
        state
    }
}

impl AdminApi for MemoryAdmin {
    fn find_module(&self, name: &str) -> Result<Option<ModuleInfo>> {
        let state = self.record("find_module");
        Ok(state.modules.get(name).cloned())
    }

    fn install_module(&self, module: &ModuleInfo) -> Result<()> {
        let mut state = self.record("install_module");
        let entry = state
            .modules
            .get_mut(&module.name)
            .ok_or_else(|| Error::NotFound {
                kind: "module",
                name: module.name.clone(),
            })?;
        entry.state = ModuleState::Installed;
        Ok(())
    }

    fn find_user(&self, login: &str) -> Result<Option<UserInfo>> {
        let state = self.record("find_user");
        Ok(state.users.get(login).cloned())
    }

    fn resolve_group(&self, xml_id: &str) -> Result<Option<i64>> {
        let state = self.record("resolve_group");
        Ok(state.groups.get(xml_id).copied())
    }

    fn add_user_group(&self, user_id: i64, group_id: i64) -> Result<()> {
        let mut state = self.record("add_user_group");
        let user = state
            .users
            .values_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| Error::NotFound {
                kind: "user",
                name: user_id.to_string(),
            })?;
        if !user.group_ids.contains(&group_id) {
            user.group_ids.push(group_id);
        }
        Ok(())
    }

    fn apply_settings(&self, settings: &[(String, bool)]) -> Result<()> {
        let mut state = self.record("apply_settings");
        for (name, value) in settings {
            state.pending_settings.insert(name.clone(), *value);
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut state = self.record("commit");
        let pending = std::mem::take(&mut state.pending_settings);
        state.settings.extend(pending);
        Ok(())
    }

    fn find_chart_template(&self, name: &str) -> Result<Option<i64>> {
        let state = self.record("find_chart_template");
        Ok(state.templates.get(name).copied())
    }

    fn load_chart_template(&self, template_id: i64, company_id: Option<i64>) -> Result<()> {
        let mut state = self.record("load_chart_template");
        if let Some(company) = company_id {
            if state.company_templates.contains_key(&company) {
                log::debug!("Company {company} already has a template, not loading");
                return Ok(());
            }
            state.company_templates.insert(company, template_id);
        }
        state.loaded_template = Some((template_id, company_id));
        Ok(())
    }
}
