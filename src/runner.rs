use anyhow::{Context, Result};
use std::process::{Command, Stdio};

/// Run a command and capture output
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Restart a system service through systemd.
pub fn restart_service(name: &str) -> Result<()> {
    if !command_exists("systemctl") {
        anyhow::bail!("systemctl not found; restart '{name}' manually");
    }
    run_capture("systemctl", &["restart", name])
        .with_context(|| format!("Failed to restart service '{name}'"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_run_capture_success() {
        assert_eq!(run_capture("echo", &["hello"]).unwrap(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_capture_failure_carries_stderr() {
        let err = run_capture("sh", &["-c", "echo nope >&2; exit 1"]).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_missing_command() {
        assert!(!command_exists("forklift-definitely-not-a-command"));
    }
}
