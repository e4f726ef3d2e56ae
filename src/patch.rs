//! Unified-diff hunks: parsing and replay against known source text.
//!
//! Only the subset produced by standard hunk headers is supported: no renames,
//! no binary hunks, no fuzzy offset matching.

mod apply;
mod hunk;

pub use apply::{apply, apply_hunks};
pub use hunk::{parse_hunks, DiffHunk, HunkHeader, HunkLine};
