use pr_impact_derive::TestBuilder;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
    slice::Iter,
};

/// Kind of structural unit. Functions outside of classes are methods too.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Class,
    #[default]
    Method,
}

impl UnitKind {
    pub fn iter() -> Iter<'static, UnitKind> {
        [UnitKind::Class, UnitKind::Method].iter()
    }
}

impl Display for UnitKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitKind::Class => write!(formatter, "class"),
            UnitKind::Method => write!(formatter, "method"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TestBuilder)]
/// Class or method extracted from a source file.
///
/// ## Properties:
/// * `symbol_name` (`String`): Declared name of the unit,
/// * `kind` (`UnitKind`): Class-like or method-like,
/// * `start_line` (`usize`): First line of the declaration, 0-indexed,
/// * `end_line` (`usize`): Last line of the declaration, 0-indexed and inclusive,
/// * `body_text` (`String`): Exact source slice of the declaration,
/// * `source_path` (`std::path::PathBuf`): Repository-relative file declaring the unit.
pub struct StructuralUnit {
    #[builder(into)]
    pub symbol_name: String,
    pub kind: UnitKind,
    pub start_line: usize,
    pub end_line: usize,
    #[builder(into)]
    pub body_text: String,
    #[builder(into)]
    #[builder(default = PathBuf::from("src/lib.py"))]
    pub source_path: PathBuf,
}

impl StructuralUnit {
    /// true iff `line` falls within the inclusive range of the unit.
    pub fn contains(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Number of lines spanned, minus one.
    pub fn span(&self) -> usize {
        self.end_line - self.start_line
    }

    pub fn identity(&self) -> UnitIdentity {
        UnitIdentity {
            source_path: self.source_path.clone(),
            symbol_name: self.symbol_name.clone(),
        }
    }

    /// Whether this unit is the definition identified by `identity`.
    pub fn is(&self, identity: &UnitIdentity) -> bool {
        self.source_path == identity.source_path && self.symbol_name == identity.symbol_name
    }
}

impl Display for StructuralUnit {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{} {} ({}:{}-{})",
            self.kind,
            self.symbol_name,
            self.source_path.display(),
            self.start_line + 1,
            self.end_line + 1,
        )
    }
}

/// Identity of a definition: the file declaring it and its exact name.
///
/// Compared by equality, so `getUser` never matches `getUserName`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnitIdentity {
    pub source_path: PathBuf,
    pub symbol_name: String,
}

impl UnitIdentity {
    pub fn new(source_path: impl Into<PathBuf>, symbol_name: impl Into<String>) -> Self {
        UnitIdentity {
            source_path: source_path.into(),
            symbol_name: symbol_name.into(),
        }
    }
}
