use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{
    index::{Embedder, SemanticIndex},
    unit::UnitIdentity,
};

/// Unit that may use a changed symbol.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UsageSnippet {
    pub source_path: PathBuf,
    pub symbol_name: String,
    /// 0-indexed, rendered 1-based.
    pub start_line: usize,
    pub body_text: String,
    pub score: f32,
}

/// Evidence gathered for one changed symbol.
///
/// ## Properties:
/// * `path` (`std::path::PathBuf`): File of the change record defining the symbol,
/// * `patch_text` (`String`): Patch of that change record,
/// * `symbol_name` (`String`): Name of the changed symbol,
/// * `usages` (`Vec<UsageSnippet>`): Possible usages, best first. May be empty.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImpactContext {
    pub path: PathBuf,
    pub patch_text: String,
    pub symbol_name: String,
    pub usages: Vec<UsageSnippet>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOptions {
    /// Maximum number of usages kept per symbol.
    pub top_k: usize,
    /// Results scoring at or below this value are dropped.
    pub min_score: f32,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        RetrievalOptions {
            top_k: 4,
            min_score: 0.0,
        }
    }
}

/// Finds the units most similar to a changed symbol, its own definition excluded.
///
/// The definition is recognised by identity only: a unit declared in the same file
/// under the same name. Units whose body merely mentions the name stay in.
///
/// ## Parameters:
/// * `identity` (`&UnitIdentity`): Changed symbol, queried by its bare name,
/// * `index` (`&SemanticIndex`): Index of the snapshot,
/// * `embedder` (`&dyn Embedder`): Embedder the index was built with,
/// * `options` (`RetrievalOptions`): Result count and score threshold.
///
/// ## Returns:
/// * (`Result<Vec<UsageSnippet>>`): At most `options.top_k` usages, best first.
pub fn retrieve(
    identity: &UnitIdentity,
    index: &SemanticIndex,
    embedder: &dyn Embedder,
    options: RetrievalOptions,
) -> Result<Vec<UsageSnippet>> {
    let ranked = index.query(&identity.symbol_name, index.len(), embedder)?;
    Ok(ranked
        .into_iter()
        .filter(|scored| !scored.unit.is(identity))
        .filter(|scored| scored.score > options.min_score)
        .take(options.top_k)
        .map(|scored| UsageSnippet {
            source_path: scored.unit.source_path.clone(),
            symbol_name: scored.unit.symbol_name.clone(),
            start_line: scored.unit.start_line,
            body_text: scored.unit.body_text.clone(),
            score: scored.score,
        })
        .collect())
}

/// Renders the impact text handed to the report generator.
///
/// ## Parameters:
/// * `contexts` (`&[ImpactContext]`): One entry per changed symbol,
/// * `fence` (`&str`): Markdown info string for the usage snippets.
///
/// ## Returns:
/// * (`String`): Contexts separated by horizontal rules, empty without contexts.
pub fn render_impact(contexts: &[ImpactContext], fence: &str) -> String {
    contexts
        .iter()
        .map(|context| render_context(context, fence))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn render_context(context: &ImpactContext, fence: &str) -> String {
    let usages = if context.usages.is_empty() {
        "No usages found.".to_string()
    } else {
        context
            .usages
            .iter()
            .map(|usage| {
                format!(
                    "- Usage in `{}` (Line {}):\n```{fence}\n{}\n```",
                    usage.source_path.display(),
                    usage.start_line + 1,
                    usage.body_text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Change in `{}` related to symbol `{}`:\n**Diff:**\n```diff\n{}\n```\n**Potential Usages:**\n{usages}",
        context.path.display(),
        context.symbol_name,
        context.patch_text.trim_end_matches('\n'),
    )
}
