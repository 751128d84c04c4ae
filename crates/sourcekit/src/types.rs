//! Core types for source extraction.

use std::fmt;
use std::path::PathBuf;

/// A declared external repository and the subcomponents to keep from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Unique name of the source
    pub name: String,
    /// Clone URL
    pub url: String,
    /// Branch or tag to pin the shallow clone to
    pub git_ref: String,
    /// Subcomponent directories to lift out of the clone, in order
    pub components: Vec<String>,
}

impl SourceEntry {
    /// Create a source entry.
    pub fn new(name: impl Into<String>, url: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            git_ref: git_ref.into(),
            components: Vec::new(),
        }
    }

    /// Add selected subcomponents (builder style).
    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components.extend(components.into_iter().map(Into::into));
        self
    }
}

/// What to do when cloning a source fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClonePolicy {
    /// Abort the whole run on the first clone failure
    #[default]
    Abort,
    /// Record the failure and continue with the next source
    Skip,
}

/// Owner and group applied to the deployment directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ownership {
    pub user: Option<String>,
    pub group: Option<String>,
}

impl Ownership {
    /// Ownership that leaves files as created by the current process.
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn is_unchanged(&self) -> bool {
        self.user.is_none() && self.group.is_none()
    }
}

/// A declared subcomponent that did not exist in its cloned source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingComponent {
    pub source: String,
    pub component: String,
}

impl fmt::Display for MissingComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.component)
    }
}

/// A source that could not be cloned under [`ClonePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSource {
    pub source: String,
    pub error: String,
}

/// Outcome of an extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Extracted subcomponents with their final location
    pub extracted: Vec<(String, PathBuf)>,
    /// Declared subcomponents absent from their source
    pub missing: Vec<MissingComponent>,
    /// Sources skipped because the clone failed
    pub failed_sources: Vec<FailedSource>,
}

impl ExtractReport {
    /// Names of extracted subcomponents, in extraction order.
    pub fn extracted_names(&self) -> Vec<&str> {
        self.extracted.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Whether every declared subcomponent of every source was extracted.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.failed_sources.is_empty()
    }
}
