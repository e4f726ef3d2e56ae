use serde::Serialize;

use crate::error::PatchError;
use crate::text::split_lines;

/// Parsed `@@ -old_start[,old_count] +new_start[,new_count] @@` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HunkHeader {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

impl HunkHeader {
    /// Parses a hunk header line. Omitted counts default to 1, anything after the
    /// closing `@@` (the section heading) is ignored.
    ///
    /// ## Parameters:
    /// * `line` (`&str`): Line starting with `@@`.
    ///
    /// ## Returns:
    /// * (`Result<HunkHeader, PatchError>`): Parsed header, or `MalformedHunkHeader`.
    pub fn parse(line: &str) -> Result<Self, PatchError> {
        let malformed = || PatchError::MalformedHunkHeader {
            header: line.to_string(),
        };
        let rest = line.strip_prefix("@@ -").ok_or_else(malformed)?;
        let (ranges, _section) = rest.split_once(" @@").ok_or_else(malformed)?;
        let (old, new) = ranges.split_once(" +").ok_or_else(malformed)?;
        let (old_start, old_count) = parse_range(old).ok_or_else(malformed)?;
        let (new_start, new_count) = parse_range(new).ok_or_else(malformed)?;
        if (old_start == 0 && old_count > 0) || (new_start == 0 && new_count > 0) {
            return Err(malformed());
        }
        Ok(HunkHeader {
            old_start,
            old_count,
            new_start,
            new_count,
        })
    }
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    let (start, count) = match range.split_once(',') {
        Some((start, count)) => (start, Some(count)),
        None => (range, None),
    };
    let start = parse_number(start)?;
    let count = match count {
        Some(count) => parse_number(count)?,
        None => 1,
    };
    Some((start, count))
}

fn parse_number(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum HunkLine {
    Context(String),
    Delete(String),
    Add(String),
}

/// One contiguous block of a unified diff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiffHunk {
    /// Raw header line, kept for error messages.
    pub header: String,
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<HunkLine>,
}

impl DiffHunk {
    fn new(header: &str, parsed: HunkHeader) -> Self {
        DiffHunk {
            header: header.to_string(),
            old_start: parsed.old_start,
            old_count: parsed.old_count,
            new_start: parsed.new_start,
            new_count: parsed.new_count,
            lines: Vec::new(),
        }
    }

    /// Number of untouched old-file lines preceding this hunk.
    ///
    /// A zero `old_count` means "insert after line `old_start`".
    pub fn anchor(&self) -> usize {
        if self.old_count == 0 {
            self.old_start
        } else {
            self.old_start - 1
        }
    }
}

/// Parses every hunk of a single-file patch.
///
/// Body lines are consumed as long as the header counts ask for more, so every
/// returned hunk holds exactly `old_count` context+delete lines and `new_count`
/// context+add lines. Git preamble lines (`diff`, `index`, `---`, `+++`) before a
/// header are skipped, as are `\ No newline at end of file` markers.
///
/// ## Parameters:
/// * `patch` (`&str`): Patch text as emitted by the source-control API.
///
/// ## Returns:
/// * (`Result<Vec<DiffHunk>, PatchError>`): Hunks in patch order.
pub fn parse_hunks(patch: &str) -> Result<Vec<DiffHunk>, PatchError> {
    let mut hunks = Vec::new();
    let mut lines = split_lines(patch).into_iter();
    let mut in_preamble = true;

    while let Some(line) = lines.next() {
        if !line.starts_with("@@") {
            if line.starts_with("diff ") {
                in_preamble = true;
            } else if !in_preamble && matches!(line.as_bytes().first(), Some(b' ' | b'+' | b'-')) {
                let header = hunks
                    .last()
                    .map(|hunk: &DiffHunk| hunk.header.clone())
                    .unwrap_or_default();
                return Err(PatchError::UnexpectedHunkLine {
                    header,
                    line: line.to_string(),
                });
            }
            continue;
        }
        in_preamble = false;

        let mut hunk = DiffHunk::new(line, HunkHeader::parse(line)?);
        let mut old_left = hunk.old_count;
        let mut new_left = hunk.new_count;
        while old_left > 0 || new_left > 0 {
            let incomplete = || PatchError::IncompleteHunk {
                header: line.to_string(),
                missing_old: old_left,
                missing_new: new_left,
            };
            let Some(body) = lines.next() else {
                return Err(incomplete());
            };
            if body.starts_with("@@") {
                return Err(incomplete());
            }
            let unexpected = || PatchError::UnexpectedHunkLine {
                header: line.to_string(),
                line: body.to_string(),
            };
            let text = body.get(1..).unwrap_or_default().to_string();
            match body.as_bytes().first() {
                // An empty line is a context line whose leading space was stripped.
                Some(b' ') | None => {
                    if old_left == 0 || new_left == 0 {
                        return Err(unexpected());
                    }
                    old_left -= 1;
                    new_left -= 1;
                    hunk.lines.push(HunkLine::Context(text));
                }
                Some(b'-') => {
                    if old_left == 0 {
                        return Err(unexpected());
                    }
                    old_left -= 1;
                    hunk.lines.push(HunkLine::Delete(text));
                }
                Some(b'+') => {
                    if new_left == 0 {
                        return Err(unexpected());
                    }
                    new_left -= 1;
                    hunk.lines.push(HunkLine::Add(text));
                }
                Some(b'\\') => {}
                _ => return Err(unexpected()),
            }
        }
        hunks.push(hunk);
    }
    Ok(hunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_counts_default_to_one() {
        let header = HunkHeader::parse("@@ -3 +4 @@ fn main() {").expect("valid header");
        assert_eq!(
            header,
            HunkHeader {
                old_start: 3,
                old_count: 1,
                new_start: 4,
                new_count: 1,
            }
        );
    }

    #[test]
    fn header_accepts_pure_insertion() {
        let header = HunkHeader::parse("@@ -5,0 +5,2 @@").expect("valid header");
        assert_eq!(header.old_count, 0);
        assert_eq!(header.new_count, 2);
    }

    #[test]
    fn header_rejects_garbage() {
        for line in [
            "@@ -a,1 +1 @@",
            "@@ 1,1 +1 @@",
            "@@ -1,1 +1",
            "@@ -+1 +1 @@",
            "@@ -0,2 +1,2 @@",
        ] {
            assert!(
                matches!(
                    HunkHeader::parse(line),
                    Err(PatchError::MalformedHunkHeader { .. })
                ),
                "{line} should be rejected"
            );
        }
    }

    #[test]
    fn parse_hunks_skips_git_preamble_and_newline_markers() {
        let patch = "diff --git a/x.py b/x.py\nindex 1..2 100644\n--- a/x.py\n+++ b/x.py\n@@ -1,2 +1,2 @@\n a\n-b\n\\ No newline at end of file\n+c\n\\ No newline at end of file\n";
        let hunks = parse_hunks(patch).expect("valid patch");
        assert_eq!(hunks.len(), 1);
        assert_eq!(
            hunks[0].lines,
            vec![
                HunkLine::Context("a".to_string()),
                HunkLine::Delete("b".to_string()),
                HunkLine::Add("c".to_string()),
            ]
        );
    }

    #[test]
    fn parse_hunks_reports_short_bodies() {
        let error = parse_hunks("@@ -1,3 +1,3 @@\n a\n b\n").expect_err("body is short");
        assert_eq!(
            error,
            PatchError::IncompleteHunk {
                header: "@@ -1,3 +1,3 @@".to_string(),
                missing_old: 1,
                missing_new: 1,
            }
        );
    }

    #[test]
    fn parse_hunks_rejects_lines_beyond_the_header_counts() {
        let error = parse_hunks("@@ -1 +1 @@\n-a\n+b\n+c\n").expect_err("one addition too many");
        assert!(matches!(error, PatchError::UnexpectedHunkLine { line, .. } if line == "+c"));
    }

    #[test]
    fn empty_body_line_counts_as_context() {
        let hunks = parse_hunks("@@ -1,2 +1,2 @@\n\n-x\n+y\n").expect("valid patch");
        assert_eq!(hunks[0].lines[0], HunkLine::Context(String::new()));
    }
}
