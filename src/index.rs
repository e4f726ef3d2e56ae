//! Similarity search over the structural units of one repository snapshot.

use anyhow::{bail, Result};
use regex::Regex;

use crate::unit::StructuralUnit;

/// Turns texts into fixed-size vectors.
pub trait Embedder: Send + Sync {
    /// Embeds every text, in order.
    ///
    /// ## Parameters:
    /// * `texts` (`&[&str]`): Texts to embed.
    ///
    /// ## Returns:
    /// * (`Result<Vec<Vec<f32>>>`): One vector of `dimensions()` values per text.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;
}

/// Offline embedder hashing identifiers into a fixed number of buckets.
///
/// Each identifier counts once under its lower-cased form, and its camelCase or
/// snake_case sub-words count half. Vectors are L2-normalised.
pub struct HashingEmbedder {
    dimensions: usize,
    identifier: Regex,
}

pub const DEFAULT_DIMENSIONS: usize = 512;

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            bail!("embedding dimensions must be at least 1");
        }
        Ok(HashingEmbedder {
            dimensions,
            identifier: Regex::new(r"[A-Za-z_][A-Za-z0-9_]*")?,
        })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for found in self.identifier.find_iter(text) {
            let identifier = found.as_str();
            self.add(&mut vector, &identifier.to_lowercase(), 1.0);
            let parts = sub_words(identifier);
            if parts.len() > 1 {
                for part in parts {
                    self.add(&mut vector, &part, 0.5);
                }
            }
        }
        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }
        vector
    }

    fn add(&self, vector: &mut [f32], token: &str, weight: f32) {
        let bucket = (seahash::hash(token.as_bytes()) % self.dimensions as u64) as usize;
        vector[bucket] += weight;
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Lower-cased snake_case and camelCase pieces of an identifier.
fn sub_words(identifier: &str) -> Vec<String> {
    let mut words = Vec::new();
    for piece in identifier.split('_').filter(|piece| !piece.is_empty()) {
        let chars: Vec<char> = piece.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            let boundary = i > 0
                && c.is_uppercase()
                && (chars[i - 1].is_lowercase()
                    || chars[i - 1].is_ascii_digit()
                    || chars.get(i + 1).is_some_and(|next| next.is_lowercase()));
            if boundary && !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current.to_lowercase());
        }
    }
    words
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

struct IndexEntry {
    unit: StructuralUnit,
    vector: Vec<f32>,
}

/// Unit returned by a query with its similarity to the query text.
#[derive(Debug, Clone, Copy)]
pub struct ScoredUnit<'a> {
    pub unit: &'a StructuralUnit,
    pub score: f32,
}

/// Units of a snapshot with their embeddings, built once per run.
#[derive(Default)]
pub struct SemanticIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl SemanticIndex {
    /// Embeds every unit under its name followed by its body.
    ///
    /// ## Parameters:
    /// * `units` (`Vec<StructuralUnit>`): Units to index, in insertion order,
    /// * `embedder` (`&dyn Embedder`): Embedder used for units and later queries.
    ///
    /// ## Returns:
    /// * (`Result<SemanticIndex>`): The index, or the embedder failure.
    pub fn build(units: Vec<StructuralUnit>, embedder: &dyn Embedder) -> Result<Self> {
        let texts: Vec<String> = units
            .iter()
            .map(|unit| format!("{}\n{}", unit.symbol_name, unit.body_text))
            .collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = embedder.embed(&text_refs)?;
        if vectors.len() != units.len() {
            bail!(
                "embedder returned {} vectors for {} units",
                vectors.len(),
                units.len()
            );
        }
        let dimensions = embedder.dimensions();
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != dimensions) {
            bail!(
                "embedder returned a vector of {} values, expected {dimensions}",
                vector.len()
            );
        }
        let entries = units
            .into_iter()
            .zip(vectors)
            .map(|(unit, vector)| IndexEntry { unit, vector })
            .collect();
        Ok(SemanticIndex {
            entries,
            dimensions,
        })
    }

    /// Ranks indexed units by cosine similarity to `text`.
    ///
    /// ## Parameters:
    /// * `text` (`&str`): Query text,
    /// * `k` (`usize`): Maximum number of results,
    /// * `embedder` (`&dyn Embedder`): Must be the embedder the index was built with.
    ///
    /// ## Returns:
    /// * (`Result<Vec<ScoredUnit>>`): At most `k` units, best first; equal scores keep
    ///   insertion order.
    pub fn query(&self, text: &str, k: usize, embedder: &dyn Embedder) -> Result<Vec<ScoredUnit<'_>>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if embedder.dimensions() != self.dimensions {
            bail!(
                "query embedder has {} dimensions, index has {}",
                embedder.dimensions(),
                self.dimensions
            );
        }
        let Some(query) = embedder.embed(&[text])?.into_iter().next() else {
            bail!("embedder returned no vector for the query");
        };
        let mut scored: Vec<ScoredUnit> = self
            .entries
            .iter()
            .map(|entry| ScoredUnit {
                unit: &entry.unit,
                score: cosine_similarity(&query, &entry.vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn units(&self) -> impl Iterator<Item = &StructuralUnit> {
        self.entries.iter().map(|entry| &entry.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::StructuralUnitBuilder;

    fn unit(name: &str, body: &str) -> StructuralUnit {
        StructuralUnitBuilder::create()
            .with_symbol_name(name)
            .with_body_text(body)
            .build()
    }

    fn embedder() -> HashingEmbedder {
        HashingEmbedder::new(DEFAULT_DIMENSIONS).expect("valid dimensions")
    }

    #[test]
    fn sub_words_split_camel_and_snake_case() {
        assert_eq!(sub_words("getUserName"), vec!["get", "user", "name"]);
        assert_eq!(sub_words("load_user_v2"), vec!["load", "user", "v2"]);
        assert_eq!(sub_words("HTTPServer"), vec!["http", "server"]);
        assert_eq!(sub_words("main"), vec!["main"]);
    }

    #[test]
    fn vectors_are_normalised() {
        let vectors = embedder().embed(&["fn load_user() {}", ""]).expect("embeds");
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(vectors[1].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn query_ranks_callers_first() {
        let embedder = embedder();
        let index = SemanticIndex::build(
            vec![
                unit("render", "def render(page):\n    return page.html"),
                unit("handler", "def handler(req):\n    return fetch_user(req.id)"),
            ],
            &embedder,
        )
        .expect("index builds");
        let results = index.query("fetch_user", 2, &embedder).expect("query runs");
        assert_eq!(results[0].unit.symbol_name, "handler");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        let embedder = embedder();
        let index = SemanticIndex::build(
            vec![unit("a", "x"), unit("b", "x"), unit("c", "x")],
            &embedder,
        )
        .expect("index builds");
        // An empty query scores every unit zero.
        let results = index.query("", 3, &embedder).expect("query runs");
        let names: Vec<&str> = results.iter().map(|r| r.unit.symbol_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn k_limits_results() {
        let embedder = embedder();
        let index =
            SemanticIndex::build(vec![unit("a", "x"), unit("b", "y")], &embedder).expect("index builds");
        assert_eq!(index.query("x", 1, &embedder).expect("query runs").len(), 1);
        assert!(index.query("x", 0, &embedder).expect("query runs").is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }
}
