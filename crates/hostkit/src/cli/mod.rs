//! Host application CLI backends.
//!
//! The [`HostCli`] trait has one method per bootstrap stage. Both stages are
//! expected to run the host to completion and exit; no server is left
//! running behind a call.

pub mod process;

use crate::error::{Error, Result};
use crate::types::Stage;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Backend trait for the host application's command line.
pub trait HostCli: Send + Sync {
    /// Refresh the base schema against `database`, then exit.
    fn update_schema(&self, config: &Path, database: &str) -> Result<()>;

    /// Activate `components` against `database`, then exit.
    fn activate_components(&self, config: &Path, database: &str, components: &[String]) -> Result<()>;
}

/// A call recorded by [`MockHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    UpdateSchema {
        config: PathBuf,
        database: String,
    },
    Activate {
        config: PathBuf,
        database: String,
        components: Vec<String>,
    },
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<HostCall>,
    active: BTreeSet<String>,
    schema_version: u32,
    failures: Vec<(Stage, i32)>,
}

/// In-memory host that behaves like a real one: activating an already
/// active component is a no-op.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<MockState>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `stage` exit with `code`.
    pub fn fail_stage(&mut self, stage: Stage, code: i32) {
        self.state.lock().unwrap().failures.push((stage, code));
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Active components, sorted.
    pub fn active_components(&self) -> Vec<String> {
        self.state.lock().unwrap().active.iter().cloned().collect()
    }

    /// Number of successful schema updates.
    pub fn schema_updates(&self) -> u32 {
        self.state.lock().unwrap().schema_version
    }

    fn check_failure(state: &MockState, stage: Stage) -> Result<()> {
        match state.failures.iter().find(|(s, _)| *s == stage) {
            Some((_, code)) => Err(Error::StageFailed {
                stage,
                code: Some(*code),
                stderr: format!("mock {stage} failure"),
            }),
            None => Ok(()),
        }
    }
}

impl HostCli for MockHost {
    fn update_schema(&self, config: &Path, database: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(HostCall::UpdateSchema {
            config: config.to_path_buf(),
            database: database.to_string(),
        });
        Self::check_failure(&state, Stage::SchemaUpdate)?;
        state.schema_version += 1;
        Ok(())
    }

    fn activate_components(&self, config: &Path, database: &str, components: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(HostCall::Activate {
            config: config.to_path_buf(),
            database: database.to_string(),
            components: components.to_vec(),
        });
        Self::check_failure(&state, Stage::ComponentActivation)?;
        state.active.extend(components.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_host_activation_is_idempotent() {
        let host = MockHost::new();
        let components = vec!["m1".to_string(), "m2".to_string()];
        host.activate_components(Path::new("/etc/host.conf"), "db", &components)
            .unwrap();
        host.activate_components(Path::new("/etc/host.conf"), "db", &components)
            .unwrap();

        assert_eq!(host.active_components(), vec!["m1", "m2"]);
        assert_eq!(host.calls().len(), 2);
    }

    #[test]
    fn test_mock_host_failure() {
        let mut host = MockHost::new();
        host.fail_stage(Stage::SchemaUpdate, 255);
        let err = host
            .update_schema(Path::new("/etc/host.conf"), "db")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::StageFailed {
                stage: Stage::SchemaUpdate,
                code: Some(255),
                ..
            }
        ));
        assert_eq!(host.schema_updates(), 0);
    }
}
