use serde::Serialize;
use std::collections::BTreeSet;

use crate::patch::HunkHeader;
use crate::text::split_lines;

/// Lines touched by a patch, 0-indexed.
///
/// `added` is expressed in new-file coordinates and `deleted` in old-file
/// coordinates; the two spaces are never mixed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChangedLines {
    pub added: BTreeSet<usize>,
    pub deleted: BTreeSet<usize>,
}

impl ChangedLines {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Maps the hunks of a patch onto added/deleted line numbers.
///
/// Tolerant by construction: a malformed header or a `diff` section start only
/// suspends recording until the next valid header, and counts in headers are never
/// checked against the body. Works on patches the patch engine refuses to apply.
///
/// ## Parameters:
/// * `patch` (`&str`): Patch text of one file.
///
/// ## Returns:
/// * (`ChangedLines`): Added lines in the new file, deleted lines in the old file.
pub fn map_changed_lines(patch: &str) -> ChangedLines {
    let mut changed = ChangedLines::default();
    let mut counters: Option<(usize, usize)> = None;

    for line in split_lines(patch) {
        if line.starts_with("@@") {
            counters = HunkHeader::parse(line).ok().map(|header| {
                (
                    header.old_start.saturating_sub(1),
                    header.new_start.saturating_sub(1),
                )
            });
            continue;
        }
        if line.starts_with("diff ") {
            counters = None;
            continue;
        }
        let Some((old, new)) = counters.as_mut() else {
            continue;
        };
        match line.as_bytes().first() {
            Some(b'-') => {
                changed.deleted.insert(*old);
                *old += 1;
            }
            Some(b'+') => {
                changed.added.insert(*new);
                *new += 1;
            }
            Some(b' ') | None => {
                *old += 1;
                *new += 1;
            }
            _ => {}
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(lines: &[usize]) -> BTreeSet<usize> {
        lines.iter().copied().collect()
    }

    #[test]
    fn additions_and_deletions_use_their_own_coordinates() {
        let changed = map_changed_lines("@@ -1,3 +1,4 @@\n line1\n-old\n+new1\n+new2\n line3");
        assert_eq!(changed.deleted, set(&[1]));
        assert_eq!(changed.added, set(&[1, 2]));
    }

    #[test]
    fn counters_restart_at_each_header() {
        let patch = "@@ -2,2 +2,2 @@\n a\n-b\n+B\n@@ -20,1 +20,2 @@\n c\n+d\n";
        let changed = map_changed_lines(patch);
        assert_eq!(changed.deleted, set(&[2]));
        assert_eq!(changed.added, set(&[2, 20]));
    }

    #[test]
    fn shifted_hunks_keep_old_and_new_apart() {
        // Three lines were inserted earlier in the file, so new-file numbers run ahead.
        let changed = map_changed_lines("@@ -10,2 +13,2 @@\n-x\n+y\n z\n");
        assert_eq!(changed.deleted, set(&[9]));
        assert_eq!(changed.added, set(&[12]));
    }

    #[test]
    fn context_only_hunk_changes_nothing() {
        assert!(map_changed_lines("@@ -1,2 +1,2 @@\n a\n b\n").is_empty());
    }

    #[test]
    fn survives_patches_the_engine_rejects() {
        // Header counts do not match the body and the second header is malformed.
        let patch = "@@ -1,9 +1,9 @@\n-a\n+b\n@@ nonsense @@\n+ignored\n@@ -30 +30 @@\n+c\n";
        let changed = map_changed_lines(patch);
        assert_eq!(changed.deleted, set(&[0]));
        assert_eq!(changed.added, set(&[0, 29]));
    }

    #[test]
    fn newline_markers_and_preamble_are_ignored() {
        let patch = "--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b\n";
        let changed = map_changed_lines(patch);
        assert_eq!(changed.deleted, set(&[0]));
        assert_eq!(changed.added, set(&[0]));
    }
}
