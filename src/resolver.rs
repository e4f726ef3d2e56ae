use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{line_map::ChangedLines, unit::StructuralUnit};

/// Which units a changed line touches when several units contain it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TouchPolicy {
    /// Only the innermost unit containing the line.
    #[default]
    Innermost,
    /// Every unit containing the line, enclosing classes included.
    AllEnclosing,
}

/// Gets the names of the units touched by a set of changed lines.
///
/// ## Parameters:
/// * `units` (`&[StructuralUnit]`): Units extracted from the text the lines refer to,
/// * `changed_lines` (`&BTreeSet<usize>`): 0-indexed lines in that same text,
/// * `policy` (`TouchPolicy`): How nested units are handled.
///
/// ## Returns:
/// * (`BTreeSet<String>`): Names of the touched units.
pub fn resolve(
    units: &[StructuralUnit],
    changed_lines: &BTreeSet<usize>,
    policy: TouchPolicy,
) -> BTreeSet<String> {
    let mut touched = BTreeSet::new();
    for &line in changed_lines {
        let containing = units.iter().filter(|unit| unit.contains(line));
        match policy {
            TouchPolicy::AllEnclosing => {
                touched.extend(containing.map(|unit| unit.symbol_name.clone()));
            }
            TouchPolicy::Innermost => {
                let innermost = containing.min_by(|a, b| {
                    a.span()
                        .cmp(&b.span())
                        .then(b.start_line.cmp(&a.start_line))
                        .then(b.kind.cmp(&a.kind))
                });
                if let Some(unit) = innermost {
                    touched.insert(unit.symbol_name.clone());
                }
            }
        }
    }
    touched
}

/// Resolves one file's change on both sides of the patch.
///
/// Deleted lines only exist in the pre-patch text and added lines only in the
/// post-patch text, so each set is matched against the units of its own side.
///
/// ## Parameters:
/// * `pre_units` (`&[StructuralUnit]`): Units of the file before the patch,
/// * `post_units` (`&[StructuralUnit]`): Units of the file after the patch,
/// * `changed` (`&ChangedLines`): Lines mapped from the patch,
/// * `policy` (`TouchPolicy`): How nested units are handled.
///
/// ## Returns:
/// * (`BTreeSet<String>`): Union of the symbols touched on either side.
pub fn resolve_change(
    pre_units: &[StructuralUnit],
    post_units: &[StructuralUnit],
    changed: &ChangedLines,
    policy: TouchPolicy,
) -> BTreeSet<String> {
    let mut touched = resolve(pre_units, &changed.deleted, policy);
    touched.extend(resolve(post_units, &changed.added, policy));
    touched
}
