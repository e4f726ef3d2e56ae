use anyhow::Result;
use std::path::Path;

use crate::unit::StructuralUnit;

/// Trait for a symbol extraction strategy.
pub trait StructuralExtractor {
    /// Extracts every class-like and method-like unit of a file.
    ///
    /// Units may nest: a method inside a class yields both. The result is sorted by
    /// position and identical for identical input.
    ///
    /// ## Parameters:
    /// * `path` (`&std::path::Path`): Repository-relative path recorded on each unit,
    /// * `source` (`&str`): Content of the file.
    ///
    /// ## Returns:
    /// * (`Result<Vec<StructuralUnit>>`): Extracted units, or the reason parsing failed.
    fn extract(&self, path: &Path, source: &str) -> Result<Vec<StructuralUnit>>;
}
