//! Real host CLI backend running the host executable as a subprocess.

use crate::cli::HostCli;
use crate::error::{Error, Result};
use crate::types::Stage;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Lines of the host's stderr kept in a [`Error::StageFailed`].
const STDERR_TAIL_LINES: usize = 20;

/// Backend that runs `<interpreter> <host_bin> -c <config> -d <db> ...`.
#[derive(Debug, Clone)]
pub struct ProcessHostCli {
    /// Interpreter used to start the host, if any
    interpreter: Option<PathBuf>,
    /// Host executable or entry script
    host_bin: PathBuf,
    /// Extra environment (virtualenv activation)
    envs: Vec<(OsString, OsString)>,
}

impl ProcessHostCli {
    /// Run `host_bin` directly.
    pub fn new(host_bin: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: None,
            host_bin: host_bin.into(),
            envs: Vec::new(),
        }
    }

    /// Start the host through an interpreter (e.g. a virtualenv's python).
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    /// Environment applied to every invocation.
    pub fn with_envs(mut self, envs: Vec<(OsString, OsString)>) -> Self {
        self.envs = envs;
        self
    }

    fn base_args(config: &Path, database: &str) -> Vec<OsString> {
        vec![
            "-c".into(),
            config.as_os_str().to_owned(),
            "-d".into(),
            database.into(),
        ]
    }

    /// Arguments for the schema update stage.
    pub fn schema_args(config: &Path, database: &str) -> Vec<OsString> {
        let mut args = Self::base_args(config, database);
        args.extend(["-u".into(), "base".into(), "--stop-after-init".into()]);
        args
    }

    /// Arguments for the component activation stage.
    pub fn activation_args(config: &Path, database: &str, components: &[String]) -> Vec<OsString> {
        let mut args = Self::base_args(config, database);
        args.extend([
            "-i".into(),
            components.join(",").into(),
            "--stop-after-init".into(),
        ]);
        args
    }

    fn command(&self, args: &[OsString]) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&self.host_bin);
                cmd
            }
            None => Command::new(&self.host_bin),
        };
        cmd.args(args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k, v)));
        cmd
    }

    fn run_stage(&self, stage: Stage, args: &[OsString]) -> Result<()> {
        let mut cmd = self.command(args);
        log::debug!("{stage}: {cmd:?}");

        let output = cmd.output().map_err(|e| Error::Spawn {
            program: cmd.get_program().to_string_lossy().into_owned(),
            message: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            log::trace!("{line}");
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::StageFailed {
            stage,
            code: output.status.code(),
            stderr: tail(&stderr, STDERR_TAIL_LINES),
        })
    }
}

impl HostCli for ProcessHostCli {
    fn update_schema(&self, config: &Path, database: &str) -> Result<()> {
        self.run_stage(Stage::SchemaUpdate, &Self::schema_args(config, database))
    }

    fn activate_components(&self, config: &Path, database: &str, components: &[String]) -> Result<()> {
        self.run_stage(
            Stage::ComponentActivation,
            &Self::activation_args(config, database, components),
        )
    }
}

/// Last `n` lines of `text`, trimmed.
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_schema_args() {
        let args = ProcessHostCli::schema_args(Path::new("/etc/host.conf"), "prod");
        assert_eq!(
            strings(&args),
            vec!["-c", "/etc/host.conf", "-d", "prod", "-u", "base", "--stop-after-init"]
        );
    }

    #[test]
    fn test_activation_args() {
        let components = vec!["m1".to_string(), "m2".to_string(), "m3".to_string()];
        let args = ProcessHostCli::activation_args(Path::new("/etc/host.conf"), "prod", &components);
        assert_eq!(
            strings(&args),
            vec!["-c", "/etc/host.conf", "-d", "prod", "-i", "m1,m2,m3", "--stop-after-init"]
        );
    }

    #[test]
    fn test_interpreter_prefixes_host_bin() {
        let cli = ProcessHostCli::new("/opt/host/odoo-bin").with_interpreter("/opt/host/venv/bin/python");
        let cmd = cli.command(&ProcessHostCli::schema_args(Path::new("/etc/host.conf"), "prod"));
        assert_eq!(cmd.get_program(), "/opt/host/venv/bin/python");
        assert_eq!(cmd.get_args().next().unwrap(), "/opt/host/odoo-bin");
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let cli = ProcessHostCli::new("/nonexistent/forklift-host-bin");
        let err = cli
            .update_schema(Path::new("/etc/host.conf"), "prod")
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_stage_failure() {
        let cli = ProcessHostCli::new("/bin/sh").with_envs(Vec::new());
        // sh treats "-c" as "run the next argument", which is the config path
        let err = cli
            .update_schema(Path::new("echo boom >&2; exit 3"), "prod")
            .unwrap_err();
        match err {
            Error::StageFailed { stage, code, stderr } => {
                assert_eq!(stage, Stage::SchemaUpdate);
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("only", 5), "only");
        assert_eq!(tail("", 5), "");
    }
}
