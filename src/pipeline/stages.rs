use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::{
    context::{PipelineContext, Route, TouchedSymbols},
    Pipeline,
};
use crate::{
    collaborators::LoadPredicate,
    error::StageError,
    impact::{render_impact, retrieve, ImpactContext},
    index::SemanticIndex,
    language::{extractor::StructuralExtractor, Language},
    line_map::map_changed_lines,
    patch,
    report::NO_IMPACT_REPORT,
    resolver::resolve_change,
    unit::{StructuralUnit, UnitIdentity},
};

type StageResult = Result<(), StageError>;

impl Pipeline<'_> {
    /// Files whose changes and content the run cares about.
    pub(super) fn load_predicate(&self) -> LoadPredicate {
        let mut extensions: Vec<&str> = Vec::new();
        for language in [self.settings.primary_language, self.settings.secondary_language] {
            extensions.extend(language.capability().extensions);
        }
        LoadPredicate::new(&extensions, &self.settings.excluded_dirs)
    }

    fn routed_language(ctx: &PipelineContext) -> Result<Language, StageError> {
        ctx.language.ok_or_else(|| StageError::Index {
            message: "no language was detected".to_string(),
        })
    }

    pub(super) fn fetch_changes(&self, ctx: &mut PipelineContext) -> StageResult {
        let source_control = self.collaborators.source_control;
        let (repository, pr_number) = (&ctx.identifiers.repository, ctx.identifiers.pr_number);
        let changes = source_control
            .list_changed_files(repository, pr_number)
            .map_err(|error| StageError::collaborator("source control", &error))?;
        let base_revision = source_control
            .base_revision(repository, pr_number)
            .map_err(|error| StageError::collaborator("source control", &error))?;
        info!(files = changes.len(), ?base_revision, "fetched pull request changes");
        ctx.changes = changes;
        ctx.base_revision = base_revision;
        Ok(())
    }

    pub(super) fn load_repository(&self, ctx: &mut PipelineContext) -> StageResult {
        let revision = ctx
            .base_revision
            .as_deref()
            .unwrap_or(ctx.identifiers.base_branch.as_str());
        let snapshots = self
            .collaborators
            .loader
            .load_files(&ctx.identifiers.repository, revision, &self.load_predicate())
            .map_err(|error| StageError::collaborator("repository loader", &error))?;
        info!(files = snapshots.len(), revision, "loaded repository");
        ctx.snapshots = snapshots;
        Ok(())
    }

    pub(super) fn detect_language(&self, ctx: &mut PipelineContext) -> StageResult {
        let secondary = self.settings.secondary_language;
        let (language, route) = if ctx
            .snapshots
            .iter()
            .any(|snapshot| secondary.owns(&snapshot.path))
        {
            (secondary, Route::Secondary)
        } else {
            (self.settings.primary_language, Route::Primary)
        };
        info!(%language, ?route, "detected language");
        ctx.language = Some(language);
        ctx.route = Some(route);
        Ok(())
    }

    pub(super) fn build_index(&self, ctx: &mut PipelineContext) -> StageResult {
        let language = Self::routed_language(ctx)?;
        let extractor = language.extractor().map_err(|error| StageError::Index {
            message: format!("{error:#}"),
        })?;
        let mut units = Vec::new();
        for snapshot in ctx.snapshots.iter().filter(|s| language.owns(&s.path)) {
            let extracted = extractor
                .extract(&snapshot.path, &snapshot.text)
                .map_err(|error| StageError::Extraction {
                    path: snapshot.path.clone(),
                    message: format!("{error:#}"),
                })?;
            debug!(units = extracted.len(), "extracted {}", snapshot.path.display());
            units.extend(extracted);
        }
        let index = SemanticIndex::build(units, self.collaborators.embedder).map_err(|error| {
            StageError::Index {
                message: format!("{error:#}"),
            }
        })?;
        info!(units = index.len(), "built semantic index");
        ctx.index = Some(index);
        Ok(())
    }

    pub(super) fn resolve_symbols(&self, ctx: &mut PipelineContext) -> StageResult {
        let language = Self::routed_language(ctx)?;
        let extractor = language.extractor().map_err(|error| StageError::Index {
            message: format!("{error:#}"),
        })?;
        let predicate = self.load_predicate();
        let texts: HashMap<_, _> = ctx
            .snapshots
            .iter()
            .map(|snapshot| (snapshot.path.as_path(), snapshot.text.as_str()))
            .collect();

        let mut touched = Vec::new();
        for record in &ctx.changes {
            if !predicate.accepts(&record.path) || !language.owns(&record.path) {
                debug!("skipping {}: not a {language} source", record.path.display());
                continue;
            }
            if record.patch_text.is_empty() {
                debug!("skipping {}: no patch", record.path.display());
                continue;
            }
            let pre_text = texts.get(record.path.as_path()).copied().unwrap_or_default();
            let post_text =
                patch::apply(pre_text, &record.patch_text).map_err(|source| StageError::Patch {
                    path: record.path.clone(),
                    source,
                })?;

            let pre_units: Vec<StructuralUnit> = match &ctx.index {
                Some(index) => index
                    .units()
                    .filter(|unit| unit.source_path == record.path)
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            let post_units = extractor.extract(&record.path, &post_text).map_err(|error| {
                StageError::Extraction {
                    path: record.path.clone(),
                    message: format!("{error:#}"),
                }
            })?;
            let changed = map_changed_lines(&record.patch_text);
            let symbols = resolve_change(&pre_units, &post_units, &changed, self.settings.touch_policy);
            debug!(
                symbols = symbols.len(),
                added = changed.added.len(),
                deleted = changed.deleted.len(),
                "resolved {}",
                record.path.display()
            );
            if !symbols.is_empty() {
                touched.push(TouchedSymbols {
                    path: record.path.clone(),
                    patch_text: record.patch_text.clone(),
                    symbols,
                });
            }
        }
        info!(
            symbols = touched.iter().map(|t| t.symbols.len()).sum::<usize>(),
            "resolved touched symbols"
        );
        ctx.touched = touched;
        Ok(())
    }

    pub(super) fn resolve_impact(&self, ctx: &mut PipelineContext) -> StageResult {
        let language = Self::routed_language(ctx)?;
        let Some(index) = &ctx.index else {
            return Err(StageError::Index {
                message: "semantic index was not built".to_string(),
            });
        };
        let mut contexts = Vec::new();
        for touched in &ctx.touched {
            for symbol in &touched.symbols {
                let identity = UnitIdentity::new(touched.path.clone(), symbol.clone());
                let usages = retrieve(
                    &identity,
                    index,
                    self.collaborators.embedder,
                    self.settings.retrieval,
                )
                .map_err(|error| StageError::Index {
                    message: format!("{error:#}"),
                })?;
                contexts.push(ImpactContext {
                    path: touched.path.clone(),
                    patch_text: touched.patch_text.clone(),
                    symbol_name: symbol.clone(),
                    usages,
                });
            }
        }
        if contexts.is_empty() {
            info!("no changed symbol found");
        } else {
            info!(symbols = contexts.len(), "retrieved usages");
        }
        ctx.impact_text = render_impact(&contexts, language.capability().fence);
        ctx.contexts = contexts;
        Ok(())
    }

    pub(super) fn report(&self, ctx: &mut PipelineContext) -> StageResult {
        let report = if ctx.contexts.is_empty() {
            NO_IMPACT_REPORT.to_string()
        } else {
            self.collaborators
                .report_generator
                .generate(&ctx.impact_text, &ctx.identifiers.pr_url)
                .map_err(|error| StageError::collaborator("report generator", &error))?
        };
        if let Some(sink) = self.collaborators.sink {
            if let Err(error) = sink.deliver(&ctx.identifiers, &report) {
                warn!("failed to deliver report: {error:#}");
            }
        }
        info!("report ready");
        ctx.report = Some(report);
        Ok(())
    }
}
