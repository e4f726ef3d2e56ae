use serde::Serialize;
use std::{collections::BTreeSet, path::PathBuf};

use crate::{
    collaborators::RunIdentifiers,
    error::StageError,
    impact::ImpactContext,
    index::SemanticIndex,
    language::Language,
    source::{ChangeRecord, SourceSnapshot},
};

/// Last stage a context went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    FetchedChanges,
    LoadedRepository,
    LanguageDetected,
    IndexedPrimary,
    IndexedSecondary,
    ResolvedSymbols,
    ResolvedImpact,
    Reported,
    Done,
}

impl Stage {
    /// Stage following this one. Indexing forks on the route; `Done` is final.
    pub fn next(self, route: Option<Route>) -> Stage {
        match self {
            Stage::Start => Stage::FetchedChanges,
            Stage::FetchedChanges => Stage::LoadedRepository,
            Stage::LoadedRepository => Stage::LanguageDetected,
            Stage::LanguageDetected => match route {
                Some(Route::Secondary) => Stage::IndexedSecondary,
                _ => Stage::IndexedPrimary,
            },
            Stage::IndexedPrimary | Stage::IndexedSecondary => Stage::ResolvedSymbols,
            Stage::ResolvedSymbols => Stage::ResolvedImpact,
            Stage::ResolvedImpact => Stage::Reported,
            Stage::Reported | Stage::Done => Stage::Done,
        }
    }
}

/// Which configured language a run was routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Primary,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// The run succeeded but no changed line fell inside a structural unit.
    NoImpactFound,
    Failed,
}

/// Terminal error of a run and the stage that raised it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

/// Symbols touched by one change record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TouchedSymbols {
    pub path: PathBuf,
    pub patch_text: String,
    pub symbols: BTreeSet<String>,
}

/// State of one run, moved from stage to stage.
///
/// ## Properties:
/// * `identifiers` (`RunIdentifiers`): Pull request the run is about,
/// * `stage` (`Stage`): Last stage the context went through,
/// * `changes` (`Vec<ChangeRecord>`): Files changed by the pull request,
/// * `base_revision` (`Option<String>`): Revision the changes apply to, base branch tip if `None`,
/// * `snapshots` (`Vec<SourceSnapshot>`): Repository files at that revision,
/// * `language` (`Option<Language>`): Language the run was routed to,
/// * `route` (`Option<Route>`): Whether that language is the primary or secondary one,
/// * `index` (`Option<SemanticIndex>`): Units of the routed language,
/// * `touched` (`Vec<TouchedSymbols>`): Touched symbols per change record,
/// * `contexts` (`Vec<ImpactContext>`): Usages per touched symbol,
/// * `impact_text` (`String`): Rendered contexts,
/// * `report` (`Option<String>`): Final report,
/// * `error` (`Option<StageFailure>`): Terminal error, never overwritten once set.
pub struct PipelineContext {
    pub identifiers: RunIdentifiers,
    pub stage: Stage,
    pub changes: Vec<ChangeRecord>,
    pub base_revision: Option<String>,
    pub snapshots: Vec<SourceSnapshot>,
    pub language: Option<Language>,
    pub route: Option<Route>,
    pub index: Option<SemanticIndex>,
    pub touched: Vec<TouchedSymbols>,
    pub contexts: Vec<ImpactContext>,
    pub impact_text: String,
    pub report: Option<String>,
    pub error: Option<StageFailure>,
}

impl PipelineContext {
    pub fn new(identifiers: RunIdentifiers) -> Self {
        PipelineContext {
            identifiers,
            stage: Stage::Start,
            changes: Vec::new(),
            base_revision: None,
            snapshots: Vec::new(),
            language: None,
            route: None,
            index: None,
            touched: Vec::new(),
            contexts: Vec::new(),
            impact_text: String::new(),
            report: None,
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Records the terminal error, unless one is already recorded.
    pub fn fail(&mut self, stage: Stage, error: StageError) {
        if self.error.is_none() {
            self.error = Some(StageFailure {
                stage,
                message: error.to_string(),
            });
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.is_failed() {
            RunStatus::Failed
        } else if self.contexts.is_empty() {
            RunStatus::NoImpactFound
        } else {
            RunStatus::Completed
        }
    }

    pub fn into_outcome(self) -> RunOutcome {
        RunOutcome {
            status: self.status(),
            identifiers: self.identifiers,
            language: self.language,
            contexts: self.contexts,
            impact_text: self.impact_text,
            report: self.report,
            error: self.error,
        }
    }
}

/// What a caller gets back from a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunOutcome {
    pub identifiers: RunIdentifiers,
    pub language: Option<Language>,
    pub status: RunStatus,
    pub contexts: Vec<ImpactContext>,
    pub impact_text: String,
    pub report: Option<String>,
    pub error: Option<StageFailure>,
}
