//! # hostkit
//!
//! Drive a host application after its components are on disk: the two-stage
//! CLI bootstrap, then post-install configuration through the instance's
//! administrative API.
//!
//! ## Example
//!
//! ```no_run
//! use hostkit::bootstrap::{Bootstrapper, NoProgress};
//! use hostkit::cli::process::ProcessHostCli;
//! use hostkit::BootstrapRequest;
//!
//! let request = BootstrapRequest::new(
//!     "/etc/odoo/odoo.conf",
//!     "prod",
//!     vec![vec!["web_responsive"], vec!["account_banking"]],
//! );
//! let host = ProcessHostCli::new("/opt/odoo/odoo-bin");
//! let outcome = Bootstrapper::new(Box::new(host))
//!     .run(&request, &mut NoProgress)
//!     .expect("bootstrap failed");
//! println!("{:?}", outcome.activation);
//! ```

#![warn(clippy::all)]

pub mod admin;
pub mod bootstrap;
pub mod cli;
pub mod configure;
pub mod error;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{Activation, BootstrapOutcome, BootstrapRequest, ModuleInfo, ModuleState, Stage, UserInfo};
