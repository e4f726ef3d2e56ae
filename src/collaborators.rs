//! Interfaces to the world outside a run.
//!
//! Every collaborator is shared by reference between concurrent runs, hence the
//! `Send + Sync` bounds.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use crate::{
    index::Embedder,
    source::{has_extension, ChangeRecord, SourceSnapshot},
};

/// Identifies the pull request a run is about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentifiers {
    /// `owner/name` of the repository, or a local path.
    pub repository: String,
    pub pr_number: u64,
    pub pr_url: String,
    pub base_branch: String,
}

pub trait SourceControl: Send + Sync {
    /// Lists the files changed by a pull request with their hunk-only patches.
    fn list_changed_files(&self, repository: &str, pr_number: u64) -> Result<Vec<ChangeRecord>>;

    /// Revision the listed patches were taken against, when it is not the tip of the
    /// base branch. The repository is loaded at that revision instead.
    fn base_revision(&self, _repository: &str, _pr_number: u64) -> Result<Option<String>> {
        Ok(None)
    }
}

pub trait RepositoryLoader: Send + Sync {
    /// Loads every file of `branch` accepted by `predicate`. `branch` may also be any
    /// revision returned by [`SourceControl::base_revision`].
    fn load_files(
        &self,
        repository: &str,
        branch: &str,
        predicate: &LoadPredicate,
    ) -> Result<Vec<SourceSnapshot>>;
}

pub trait ReportGenerator: Send + Sync {
    /// Turns the impact text into the final report.
    fn generate(&self, impact_text: &str, pr_url: &str) -> Result<String>;
}

pub trait NotificationSink: Send + Sync {
    /// Delivers a finished report. Failures never fail the run.
    fn deliver(&self, identifiers: &RunIdentifiers, report: &str) -> Result<()>;
}

/// Everything a pipeline talks to.
pub struct Collaborators<'a> {
    pub source_control: &'a dyn SourceControl,
    pub loader: &'a dyn RepositoryLoader,
    pub embedder: &'a dyn Embedder,
    pub report_generator: &'a dyn ReportGenerator,
    pub sink: Option<&'a dyn NotificationSink>,
}

/// Decides which repository files are worth loading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadPredicate {
    pub extensions: Vec<String>,
    /// Directory names skipped wherever they appear in a path.
    pub excluded_dirs: Vec<String>,
}

impl LoadPredicate {
    pub fn new(extensions: &[&str], excluded_dirs: &[String]) -> Self {
        LoadPredicate {
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
            excluded_dirs: excluded_dirs.to_vec(),
        }
    }

    /// true iff the file has an accepted extension outside every excluded directory.
    pub fn accepts(&self, path: &Path) -> bool {
        let extensions: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
        has_extension(path, &extensions) && !self.is_excluded(path)
    }

    /// true iff one of the directories of `path` is excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        parent.components().any(|component| match component {
            Component::Normal(name) => name
                .to_str()
                .is_some_and(|name| self.excluded_dirs.iter().any(|dir| dir == name)),
            _ => false,
        })
    }
}
