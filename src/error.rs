use std::path::PathBuf;
use thiserror::Error;

/// Structural errors raised while parsing or replaying a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("malformed hunk header: '{header}'")]
    MalformedHunkHeader { header: String },
    #[error("context mismatch at line {line}: expected '{expected}', found '{found}'")]
    ContextMismatch {
        /// 1-based line of the source text.
        line: usize,
        expected: String,
        found: String,
    },
    #[error("hunk '{header}' starts before the end of the previous hunk")]
    HunkOrderError { header: String },
    #[error("hunk '{header}' needs source line {line} but the source has {available} lines")]
    TruncatedHunk {
        header: String,
        /// 1-based line the hunk tried to read.
        line: usize,
        available: usize,
    },
    #[error("hunk '{header}' ended early: {missing_old} old and {missing_new} new lines missing")]
    IncompleteHunk {
        header: String,
        missing_old: usize,
        missing_new: usize,
    },
    #[error("unexpected line in hunk '{header}': '{line}'")]
    UnexpectedHunkLine { header: String, line: String },
}

/// Error that ends a pipeline run. Its `Display` is stored verbatim on the context.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{collaborator} unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        message: String,
    },
    #[error("failed to apply patch for `{}`: {source}", path.display())]
    Patch {
        path: PathBuf,
        #[source]
        source: PatchError,
    },
    #[error("failed to extract symbols from `{}`: {message}", path.display())]
    Extraction { path: PathBuf, message: String },
    #[error("failed to build semantic index: {message}")]
    Index { message: String },
}

impl StageError {
    /// Wraps a collaborator failure, keeping the whole `anyhow` context chain.
    pub fn collaborator(collaborator: &'static str, error: &anyhow::Error) -> Self {
        StageError::CollaboratorUnavailable {
            collaborator,
            message: format!("{error:#}"),
        }
    }
}

/// Raised when a run is requested while another run holds the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("another run is already in progress for this slot")]
pub struct SlotBusy;
