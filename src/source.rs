use pr_impact_derive::TestBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Content of one repository file at the base of the change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceSnapshot {
    pub path: PathBuf,
    pub text: String,
    pub line_count: usize,
}

impl SourceSnapshot {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_count = crate::text::split_lines(&text).len();
        SourceSnapshot {
            path: path.into(),
            text,
            line_count,
        }
    }

    pub fn has_extension(&self, extensions: &[&str]) -> bool {
        has_extension(&self.path, extensions)
    }
}

/// One file changed by the pull request, with its hunk-only patch text.
///
/// `patch_text` is empty when the hosting side omitted the diff (binary files,
/// oversized diffs).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TestBuilder)]
pub struct ChangeRecord {
    #[builder(into)]
    pub path: PathBuf,
    #[builder(into)]
    pub patch_text: String,
}

impl ChangeRecord {
    pub fn new(path: impl Into<PathBuf>, patch_text: impl Into<String>) -> Self {
        ChangeRecord {
            path: path.into(),
            patch_text: patch_text.into(),
        }
    }
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}
