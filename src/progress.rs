//! Spinners for long blocking steps.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A spinner plus the status line printed when it finishes.
///
/// indicatif hides a bar whose stderr is not a terminal, so whether the
/// status line is printed depends on `quiet` alone.
pub struct Spinner {
    pb: ProgressBar,
    quiet: bool,
}

impl Spinner {
    /// Start a spinner with `msg`. Hidden when `quiet`.
    pub fn start(msg: &str, quiet: bool) -> Self {
        if quiet {
            return Self {
                pb: ProgressBar::hidden(),
                quiet,
            };
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb, quiet }
    }

    /// Run `f` with the spinner temporarily cleared from the terminal.
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.pb.suspend(f)
    }

    fn prints_success(&self) -> bool {
        !self.quiet
    }

    pub fn success(self, msg: &str) {
        self.pb.finish_and_clear();
        if self.prints_success() {
            println!("{} {}", "✓".green(), msg);
        }
    }

    pub fn warn(self, msg: &str) {
        self.pb.finish_and_clear();
        println!("{} {}", "⚠".yellow(), msg);
    }

    pub fn error(self, msg: &str) {
        self.pb.finish_and_clear();
        eprintln!("{} {}", "✗".red(), msg);
    }

    /// Stop without a status line.
    pub fn clear(self) {
        self.pb.finish_and_clear();
    }
}
