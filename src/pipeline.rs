//! Short-circuiting workflow taking a pull request from its changes to a report.
//!
//! One [`PipelineContext`] is moved through the stages in order. Once a stage
//! records a terminal error every later stage forwards the context untouched, and
//! the walk still ends at [`Stage::Done`].

use serde::{Deserialize, Serialize};
use std::{any::Any, collections::HashMap};
use tracing::{error, info, info_span, warn};

mod context;
mod guard;
mod stages;

pub use context::{PipelineContext, Route, RunOutcome, RunStatus, Stage, StageFailure, TouchedSymbols};
pub use guard::{RunSlot, RunSlotGuard};

use crate::{
    collaborators::{Collaborators, RunIdentifiers},
    error::SlotBusy,
    impact::RetrievalOptions,
    language::Language,
    resolver::TouchPolicy,
};

/// Tunables of a run, taken from the configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub primary_language: Language,
    /// Chosen whenever the repository contains one of its files.
    pub secondary_language: Language,
    pub retrieval: RetrievalOptions,
    pub touch_policy: TouchPolicy,
    pub excluded_dirs: Vec<String>,
}

pub fn default_excluded_dirs() -> Vec<String> {
    [".git", "target", "__pycache__", ".venv", "node_modules", "build"]
        .iter()
        .map(|dir| dir.to_string())
        .collect()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            primary_language: Language::Python,
            secondary_language: Language::Java,
            retrieval: RetrievalOptions::default(),
            touch_policy: TouchPolicy::default(),
            excluded_dirs: default_excluded_dirs(),
        }
    }
}

/// What [`Pipeline::run_all`] gives back.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub outcomes: Vec<RunOutcome>,
    /// Pull request numbers whose run panicked.
    pub panicked: Vec<u64>,
    /// Pull request numbers refused because the same pull request was already running.
    pub skipped: Vec<u64>,
}

impl BatchOutcome {
    /// Runs that failed or panicked.
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == RunStatus::Failed)
            .count()
            + self.panicked.len()
    }

    /// Runs that were started, panicked ones included.
    pub fn started(&self) -> usize {
        self.outcomes.len() + self.panicked.len()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

pub struct Pipeline<'a> {
    collaborators: Collaborators<'a>,
    settings: PipelineSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(collaborators: Collaborators<'a>, settings: PipelineSettings) -> Self {
        Pipeline {
            collaborators,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs every stage for one pull request.
    ///
    /// ## Parameters:
    /// * `identifiers` (`RunIdentifiers`): Pull request to analyse.
    ///
    /// ## Returns:
    /// * (`RunOutcome`): Impact summary, or the terminal error of the run.
    pub fn run(&self, identifiers: RunIdentifiers) -> RunOutcome {
        let span = info_span!(
            "run",
            repository = %identifiers.repository,
            pr_number = identifiers.pr_number
        );
        let _entered = span.enter();
        let ctx = self.resume(PipelineContext::new(identifiers));
        let outcome = ctx.into_outcome();
        info!(status = ?outcome.status, "run finished");
        outcome
    }

    /// Same as [`Pipeline::run`], refused at once while `slot` is held elsewhere.
    pub fn run_guarded(&self, slot: &RunSlot, identifiers: RunIdentifiers) -> Result<RunOutcome, SlotBusy> {
        let _guard = slot.try_acquire()?;
        Ok(self.run(identifiers))
    }

    /// Runs several pull requests at once, one thread each.
    ///
    /// Requests for the same pull request number share a [`RunSlot`], so a duplicate
    /// is skipped while the first one runs. A run that panics is reported instead of
    /// being dropped.
    ///
    /// ## Parameters:
    /// * `runs` (`Vec<RunIdentifiers>`): Pull requests to analyse.
    ///
    /// ## Returns:
    /// * (`BatchOutcome`): Finished runs in request order, plus the panicked and skipped ones.
    pub fn run_all(&self, runs: Vec<RunIdentifiers>) -> BatchOutcome {
        let slots: HashMap<u64, RunSlot> = runs
            .iter()
            .map(|run| (run.pr_number, RunSlot::new()))
            .collect();
        let mut batch = BatchOutcome::default();
        std::thread::scope(|scope| {
            let handles: Vec<_> = runs
                .into_iter()
                .filter_map(|run| {
                    let slot = slots.get(&run.pr_number)?;
                    let pr_number = run.pr_number;
                    Some((pr_number, scope.spawn(move || self.run_guarded(slot, run))))
                })
                .collect();
            for (pr_number, handle) in handles {
                match handle.join() {
                    Ok(Ok(outcome)) => batch.outcomes.push(outcome),
                    Ok(Err(busy)) => {
                        warn!(pr_number, "{busy}");
                        batch.skipped.push(pr_number);
                    }
                    Err(payload) => {
                        error!(pr_number, "run panicked: {}", panic_message(payload.as_ref()));
                        batch.panicked.push(pr_number);
                    }
                }
            }
        });
        batch
    }

    /// Walks a context from its current stage to [`Stage::Done`].
    pub fn resume(&self, mut ctx: PipelineContext) -> PipelineContext {
        while ctx.stage != Stage::Done {
            ctx = self.step(ctx);
        }
        ctx
    }

    /// Moves a context through the stage following its current one.
    pub fn step(&self, mut ctx: PipelineContext) -> PipelineContext {
        let next = ctx.stage.next(ctx.route);
        if !ctx.is_failed() {
            let result = match next {
                Stage::FetchedChanges => self.fetch_changes(&mut ctx),
                Stage::LoadedRepository => self.load_repository(&mut ctx),
                Stage::LanguageDetected => self.detect_language(&mut ctx),
                Stage::IndexedPrimary | Stage::IndexedSecondary => self.build_index(&mut ctx),
                Stage::ResolvedSymbols => self.resolve_symbols(&mut ctx),
                Stage::ResolvedImpact => self.resolve_impact(&mut ctx),
                Stage::Reported => self.report(&mut ctx),
                Stage::Start | Stage::Done => Ok(()),
            };
            if let Err(error) = result {
                tracing::error!(stage = ?next, "{error}");
                ctx.fail(next, error);
            }
        }
        ctx.stage = next;
        ctx
    }
}
