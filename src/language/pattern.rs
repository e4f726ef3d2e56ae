//! Indentation-based extraction for Python sources.

use anyhow::Result;
use regex::Regex;
use std::path::Path;

use super::{extractor::StructuralExtractor, sort_units};
use crate::{
    text::split_lines,
    unit::{StructuralUnit, UnitKind},
};

const TAB_WIDTH: usize = 8;

pub struct PatternExtractor {
    declaration: Regex,
}

impl PatternExtractor {
    pub fn new() -> Result<Self> {
        Ok(PatternExtractor {
            declaration: Regex::new(
                r"^[ \t]*(?:async[ \t]+)?(class|def)[ \t]+([A-Za-z_][A-Za-z0-9_]*)",
            )?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineClass {
    Blank,
    Comment,
    /// Inside an open bracket or a triple-quoted string started on an earlier line.
    Continuation,
    /// Code starting at the given indentation width.
    Code(usize),
}

impl StructuralExtractor for PatternExtractor {
    fn extract(&self, path: &Path, source: &str) -> Result<Vec<StructuralUnit>> {
        let lines = split_lines(source);
        let classes = classify(&lines);
        let mut units = Vec::new();

        for (start, line) in lines.iter().enumerate() {
            let LineClass::Code(indent) = classes[start] else {
                continue;
            };
            let Some(captures) = self.declaration.captures(line) else {
                continue;
            };
            let (Some(keyword), Some(name)) = (captures.get(1), captures.get(2)) else {
                continue;
            };
            let kind = if keyword.as_str() == "class" {
                UnitKind::Class
            } else {
                UnitKind::Method
            };
            let end = block_end(&classes, start, indent);
            units.push(StructuralUnit {
                symbol_name: name.as_str().to_string(),
                kind,
                start_line: start,
                end_line: end,
                body_text: lines[start..=end].join("\n"),
                source_path: path.to_path_buf(),
            });
        }
        sort_units(&mut units);
        Ok(units)
    }
}

/// Last line of the block opened at `start`: the last code or continuation line
/// before the first code line indented at most `indent`.
fn block_end(classes: &[LineClass], start: usize, indent: usize) -> usize {
    let mut end = start;
    for (index, class) in classes.iter().enumerate().skip(start + 1) {
        match class {
            LineClass::Code(level) if *level <= indent => break,
            LineClass::Code(_) | LineClass::Continuation => end = index,
            LineClass::Blank | LineClass::Comment => {}
        }
    }
    end
}

fn classify(lines: &[&str]) -> Vec<LineClass> {
    let mut classes = Vec::with_capacity(lines.len());
    let mut depth = 0usize;
    let mut open_string: Option<&'static str> = None;

    for line in lines {
        let trimmed = line.trim();
        let class = if depth > 0 || open_string.is_some() {
            LineClass::Continuation
        } else if trimmed.is_empty() {
            LineClass::Blank
        } else if trimmed.starts_with('#') {
            LineClass::Comment
        } else {
            LineClass::Code(indentation(line))
        };
        classes.push(class);
        scan(line, &mut depth, &mut open_string);
    }
    classes
}

fn indentation(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH - width % TAB_WIDTH,
            _ => break,
        }
    }
    width
}

/// Tracks bracket depth and triple-quoted strings across one line.
fn scan(line: &str, depth: &mut usize, open_string: &mut Option<&'static str>) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if let Some(delimiter) = *open_string {
            match line.get(i..).and_then(|rest| rest.find(delimiter)) {
                Some(offset) => {
                    i += offset + delimiter.len();
                    *open_string = None;
                    continue;
                }
                None => return,
            }
        }
        match bytes[i] {
            b'#' => return,
            quote @ (b'"' | b'\'') => {
                let triple = if quote == b'"' { "\"\"\"" } else { "'''" };
                if line.get(i..).is_some_and(|rest| rest.starts_with(triple)) {
                    *open_string = Some(triple);
                    i += triple.len();
                    continue;
                }
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'(' | b'[' | b'{' => {
                *depth += 1;
                i += 1;
            }
            b')' | b']' | b'}' => {
                *depth = depth.saturating_sub(1);
                i += 1;
            }
            _ => i += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"import os

class Repository:
    """Stores users.

def not_a_method(): this line is inside the docstring
    """

    def __init__(self, path):
        self.path = path

    # helper comment
    async def load(self,
        name):
        return name


def main():
    repo = Repository(".")
    print(repo.load("x"))
"#;

    fn extract(source: &str) -> Vec<StructuralUnit> {
        PatternExtractor::new()
            .expect("regex compiles")
            .extract(Path::new("repo.py"), source)
            .expect("extraction succeeds")
    }

    fn summary(units: &[StructuralUnit]) -> Vec<(&str, UnitKind, usize, usize)> {
        units
            .iter()
            .map(|unit| (unit.symbol_name.as_str(), unit.kind, unit.start_line, unit.end_line))
            .collect()
    }

    #[test]
    fn finds_classes_methods_and_functions() {
        let units = extract(SOURCE);
        assert_eq!(
            summary(&units),
            vec![
                ("Repository", UnitKind::Class, 2, 14),
                ("__init__", UnitKind::Method, 8, 9),
                ("load", UnitKind::Method, 12, 14),
                ("main", UnitKind::Method, 17, 19),
            ]
        );
    }

    #[test]
    fn nested_ranges_stay_inside_their_class() {
        let units = extract(SOURCE);
        let class = &units[0];
        for method in &units[1..3] {
            assert!(class.start_line <= method.start_line && method.end_line <= class.end_line);
        }
        let line_count = split_lines(SOURCE).len();
        assert!(units.iter().all(|unit| unit.end_line < line_count));
    }

    #[test]
    fn body_is_the_exact_source_slice() {
        let units = extract(SOURCE);
        assert_eq!(
            units[1].body_text,
            "    def __init__(self, path):\n        self.path = path"
        );
        assert_eq!(units[1].source_path, Path::new("repo.py"));
    }

    #[test]
    fn extraction_is_idempotent() {
        assert_eq!(extract(SOURCE), extract(SOURCE));
    }

    #[test]
    fn one_line_definitions_span_one_line() {
        let units = extract("def f(): return 1\nx = f()\n");
        assert_eq!(summary(&units), vec![("f", UnitKind::Method, 0, 0)]);
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let units = extract("def f():\n    s = \"(\"\n    return s\ndef g():\n    pass\n");
        assert_eq!(
            summary(&units),
            vec![("f", UnitKind::Method, 0, 2), ("g", UnitKind::Method, 3, 4)]
        );
    }

    #[test]
    fn tabs_indent_to_the_next_stop() {
        assert_eq!(indentation("\tx"), 8);
        assert_eq!(indentation("  \tx"), 8);
        assert_eq!(indentation("    x"), 4);
    }
}
