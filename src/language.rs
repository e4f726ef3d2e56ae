use anyhow::Result;
use grammar::{GrammarExtractor, GrammarRules};
use pattern::PatternExtractor;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    path::Path,
};

use crate::{source::has_extension, unit::StructuralUnit};

pub mod extractor;
mod grammar;
mod pattern;

use extractor::StructuralExtractor;

/// Languages the engine can resolve symbols for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    Rust,
}

/// How units are extracted for a language.
#[derive(Debug)]
pub enum Strategy {
    /// Line and indentation heuristics, for loosely structured languages.
    Pattern,
    /// tree-sitter queries over a formal grammar.
    Grammar(&'static GrammarRules),
}

/// Static description of what the engine knows about one language.
#[derive(Debug)]
pub struct Capability {
    pub extensions: &'static [&'static str],
    /// Info string used when fencing code of this language in markdown.
    pub fence: &'static str,
    pub strategy: Strategy,
}

static PYTHON: Capability = Capability {
    extensions: &["py"],
    fence: "python",
    strategy: Strategy::Pattern,
};

static JAVA: Capability = Capability {
    extensions: &["java"],
    fence: "java",
    strategy: Strategy::Grammar(&grammar::JAVA),
};

static RUST: Capability = Capability {
    extensions: &["rs"],
    fence: "rust",
    strategy: Strategy::Grammar(&grammar::RUST),
};

impl Language {
    pub fn capability(self) -> &'static Capability {
        match self {
            Language::Python => &PYTHON,
            Language::Java => &JAVA,
            Language::Rust => &RUST,
        }
    }

    /// true iff `path` has one of the extensions of the language.
    pub fn owns(self, path: &Path) -> bool {
        has_extension(path, self.capability().extensions)
    }

    /// Builds the extractor bound to the language in the capability table.
    pub fn extractor(self) -> Result<Extractors> {
        match self.capability().strategy {
            Strategy::Pattern => Ok(Extractors::Pattern(PatternExtractor::new()?)),
            Strategy::Grammar(rules) => Ok(Extractors::Grammar(GrammarExtractor::new(rules)?)),
        }
    }
}

impl Display for Language {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Rust => "rust",
        };
        write!(formatter, "{name}")
    }
}

pub enum Extractors {
    Pattern(PatternExtractor),
    Grammar(GrammarExtractor),
}

impl StructuralExtractor for Extractors {
    fn extract(&self, path: &Path, source: &str) -> Result<Vec<StructuralUnit>> {
        match &self {
            Extractors::Pattern(extractor) => extractor.extract(path, source),
            Extractors::Grammar(extractor) => extractor.extract(path, source),
        }
    }
}

/// Orders units by position, enclosing units before the units they contain.
fn sort_units(units: &mut [StructuralUnit]) {
    units.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then(b.end_line.cmp(&a.end_line))
            .then(a.kind.cmp(&b.kind))
            .then(a.symbol_name.cmp(&b.symbol_name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table_binds_strategies() {
        assert!(matches!(Language::Python.capability().strategy, Strategy::Pattern));
        assert!(matches!(Language::Java.capability().strategy, Strategy::Grammar(_)));
        assert!(matches!(Language::Rust.capability().strategy, Strategy::Grammar(_)));
    }

    #[test]
    fn ownership_follows_extensions() {
        assert!(Language::Java.owns(Path::new("src/main/java/App.java")));
        assert!(!Language::Java.owns(Path::new("app.py")));
        assert!(Language::Python.owns(Path::new("app.py")));
        assert!(Language::Rust.owns(Path::new("src/lib.rs")));
    }

    #[test]
    fn every_language_builds_its_extractor() {
        for language in [Language::Python, Language::Java, Language::Rust] {
            assert!(language.extractor().is_ok(), "{language} extractor failed");
        }
    }
}
