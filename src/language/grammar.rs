use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tree_sitter::{Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

use super::{extractor::StructuralExtractor, sort_units};
use crate::unit::{StructuralUnit, UnitKind};

/// Queries and naming rules of a grammar-aware language.
#[derive(Debug)]
pub struct GrammarRules {
    pub grammar: fn() -> tree_sitter::Language,
    /// Query capturing class-like declarations.
    pub class_query: &'static str,
    /// Query capturing method-like declarations.
    pub method_query: &'static str,
    /// Fields tried in order to find the declared name of a captured node.
    pub name_fields: &'static [&'static str],
}

fn java_grammar() -> tree_sitter::Language {
    tree_sitter_java::LANGUAGE.into()
}

fn rust_grammar() -> tree_sitter::Language {
    tree_sitter_rust::LANGUAGE.into()
}

pub static JAVA: GrammarRules = GrammarRules {
    grammar: java_grammar,
    class_query: "[(class_declaration) (interface_declaration) (enum_declaration) (record_declaration)] @unit",
    method_query: "[(method_declaration) (constructor_declaration)] @unit",
    name_fields: &["name"],
};

// `impl` blocks have no name; they are named after the implemented type.
pub static RUST: GrammarRules = GrammarRules {
    grammar: rust_grammar,
    class_query: "[(struct_item) (enum_item) (trait_item) (impl_item)] @unit",
    method_query: "(function_item) @unit",
    name_fields: &["name", "type"],
};

pub struct GrammarExtractor {
    grammar: tree_sitter::Language,
    queries: Vec<(UnitKind, Query)>,
    name_fields: &'static [&'static str],
}

impl GrammarExtractor {
    pub fn new(rules: &'static GrammarRules) -> Result<Self> {
        let grammar = (rules.grammar)();
        let mut queries = Vec::new();
        for kind in UnitKind::iter() {
            let source = match kind {
                UnitKind::Class => rules.class_query,
                UnitKind::Method => rules.method_query,
            };
            let query = Query::new(&grammar, source)
                .with_context(|| format!("failed to compile the {kind} query"))?;
            queries.push((*kind, query));
        }
        Ok(GrammarExtractor {
            grammar,
            queries,
            name_fields: rules.name_fields,
        })
    }

    fn parse(&self, source: &str) -> Result<Tree> {
        let mut parser = Parser::new();
        parser.set_language(&self.grammar)?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("Parse failed"))?;
        Ok(tree)
    }

    fn name_of<'a>(&self, node: Node<'a>, source: &'a str) -> Option<&'a str> {
        self.name_fields
            .iter()
            .find_map(|field| node.child_by_field_name(*field))
            .and_then(|name_node| name_node.utf8_text(source.as_bytes()).ok())
            .filter(|name| !name.is_empty())
    }
}

impl StructuralExtractor for GrammarExtractor {
    fn extract(&self, path: &Path, source: &str) -> Result<Vec<StructuralUnit>> {
        let tree = self.parse(source)?;
        let mut units = Vec::new();

        for (kind, query) in &self.queries {
            let mut cursor = QueryCursor::new();
            let mut matches = cursor.matches(query, tree.root_node(), source.as_bytes());
            while let Some(found) = matches.next() {
                for capture in found.captures {
                    let node = capture.node;
                    let Some(name) = self.name_of(node, source) else {
                        continue;
                    };
                    let start_line = node.start_position().row;
                    let end = node.end_position();
                    // A node ending right after a newline belongs to the previous row.
                    let end_line = if end.column == 0 && end.row > start_line {
                        end.row - 1
                    } else {
                        end.row
                    };
                    units.push(StructuralUnit {
                        symbol_name: name.to_string(),
                        kind: *kind,
                        start_line,
                        end_line,
                        body_text: node.utf8_text(source.as_bytes()).unwrap_or_default().to_string(),
                        source_path: path.to_path_buf(),
                    });
                }
            }
        }
        sort_units(&mut units);
        Ok(units)
    }
}
