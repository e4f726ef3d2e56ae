use crate::error::PatchError;
use crate::text::split_lines;

use super::hunk::{parse_hunks, DiffHunk, HunkLine};

/// Replays a unified diff against the text it was produced from.
///
/// ## Parameters:
/// * `source` (`&str`): Pre-image of the file,
/// * `patch` (`&str`): Hunks describing the change.
///
/// ## Returns:
/// * (`Result<String, PatchError>`): Post-image. Its trailing newline follows `source`.
pub fn apply(source: &str, patch: &str) -> Result<String, PatchError> {
    let hunks = parse_hunks(patch)?;
    apply_hunks(source, &hunks)
}

/// Replays already parsed hunks; see [`apply`].
pub fn apply_hunks(source: &str, hunks: &[DiffHunk]) -> Result<String, PatchError> {
    let lines = split_lines(source);
    let mut output: Vec<&str> = Vec::with_capacity(lines.len());
    let mut cursor = 0usize;
    let mut previous_start: Option<usize> = None;

    for hunk in hunks {
        let anchor = hunk.anchor();
        if anchor < cursor || previous_start.is_some_and(|start| hunk.old_start <= start) {
            return Err(PatchError::HunkOrderError {
                header: hunk.header.clone(),
            });
        }
        if anchor > lines.len() {
            return Err(PatchError::TruncatedHunk {
                header: hunk.header.clone(),
                line: hunk.old_start.max(1),
                available: lines.len(),
            });
        }
        output.extend_from_slice(&lines[cursor..anchor]);
        cursor = anchor;

        for line in &hunk.lines {
            match line {
                HunkLine::Add(text) => output.push(text),
                HunkLine::Context(expected) | HunkLine::Delete(expected) => {
                    let Some(&found) = lines.get(cursor) else {
                        return Err(PatchError::TruncatedHunk {
                            header: hunk.header.clone(),
                            line: cursor + 1,
                            available: lines.len(),
                        });
                    };
                    if found != expected.as_str() {
                        return Err(PatchError::ContextMismatch {
                            line: cursor + 1,
                            expected: expected.clone(),
                            found: found.to_string(),
                        });
                    }
                    if matches!(line, HunkLine::Context(_)) {
                        output.push(found);
                    }
                    cursor += 1;
                }
            }
        }
        previous_start = Some(hunk.old_start);
    }
    output.extend_from_slice(&lines[cursor..]);

    let mut patched = output.join("\n");
    if source.ends_with('\n') && !output.is_empty() {
        patched.push('\n');
    }
    Ok(patched)
}
