//! # sourcekit
//!
//! Materialize selected subcomponents from git sources into one flat
//! deployment directory, then install their declared dependencies.
//!
//! This crate provides functionality for:
//! - Shallow, ref-pinned clones through a pluggable [`backend::Vcs`]
//! - Lifting only the selected subcomponent directories out of each clone
//! - Discovering dependency manifests and installing them into a virtualenv
//!
//! ## Example
//!
//! ```no_run
//! use sourcekit::backend::git::GitCli;
//! use sourcekit::extract::{ExtractOptions, Extractor, NoProgress};
//! use sourcekit::SourceEntry;
//! use std::path::Path;
//!
//! let sources = vec![
//!     SourceEntry::new("web", "https://github.com/OCA/web.git", "17.0")
//!         .with_components(["web_responsive"]),
//! ];
//!
//! let extractor = Extractor::new(Box::new(GitCli::new()));
//! let report = extractor
//!     .extract(&sources, Path::new("/opt/host/addons"), &ExtractOptions::default(), &mut NoProgress)
//!     .expect("extraction failed");
//!
//! for missing in &report.missing {
//!     println!("missing: {missing}");
//! }
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod deps;
pub mod error;
pub mod extract;
pub mod fsops;
pub mod types;
pub mod venv;

pub use error::{Error, ErrorCategory, Result};
pub use types::{ClonePolicy, ExtractReport, FailedSource, MissingComponent, Ownership, SourceEntry};
pub use venv::{ActiveEnv, VirtualEnv};
