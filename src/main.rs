use anyhow::{bail, Context, Result};
use clap::Parser;
use std::{fs, path::PathBuf};
use tracing::info;

use pr_impact::{
    collaborators::{Collaborators, NotificationSink, RepositoryLoader, RunIdentifiers},
    config::ConfigLoader,
    git::{GitRepositoryLoader, GitSourceControl},
    index::HashingEmbedder,
    logging::init_logging,
    pipeline::{Pipeline, RunOutcome},
    report::{FileSink, MarkdownReportGenerator},
    resolver::TouchPolicy,
    webhook::WebhookPayload,
    workdir::WorkdirLoader,
};

#[derive(Parser, Debug)]
#[command(name = "pr-impact")]
#[command(about = "Find the code a pull request is likely to affect", long_about = None)]
/// Arguments received by the main command.
///
/// ## Arguments:
/// - `path` (`String`): Local clone of the repository, defaults to current directory,
/// - `pr` (`Vec<u64>`): Pull requests to analyse, read from `refs/pull/<n>/head`,
/// - `event` (`Option<PathBuf>`): Pull request webhook payload to analyse instead,
/// - `head` (`Option<String>`): Revision to use as the pull request head,
/// - `base` (`Option<String>`): Base branch, overriding the configuration,
/// - `url` (`Option<String>`): Web URL of the repository, used to link pull requests,
/// - `touch_policy` (`Option<TouchPolicy>`): Nesting policy, overriding the configuration,
/// - `worktree` (`bool`): Read the base content from the checkout instead of git,
/// - `config` (`Option<PathBuf>`): Configuration file, defaults to `pr-impact.toml`,
/// - `json` (`bool`): Print the outcomes as JSON,
/// - `report_out` (`Option<PathBuf>`): Directory receiving one report per pull request,
/// - `debug` (`bool`): true to display more info, defaults to false.
struct Args {
    #[arg(short, long, default_value_t = String::from("."))]
    /// Path to the local clone of the repository.
    path: String,
    #[arg(long, required_unless_present = "event", conflicts_with = "event")]
    /// Number of a pull request to analyse. Repeat to analyse several at once.
    pr: Vec<u64>,
    #[arg(long)]
    /// JSON payload of a pull request webhook event.
    event: Option<PathBuf>,
    #[arg(long)]
    /// Revision to use as the head of the pull request.
    head: Option<String>,
    #[arg(long)]
    /// Branch the pull request targets.
    base: Option<String>,
    #[arg(long)]
    /// Web URL of the repository.
    url: Option<String>,
    #[arg(long, value_enum)]
    /// Which units a changed line touches when units nest.
    touch_policy: Option<TouchPolicy>,
    #[arg(long)]
    /// Load the base content from the working tree.
    worktree: bool,
    #[arg(short, long)]
    /// Configuration file.
    config: Option<PathBuf>,
    #[arg(long)]
    /// Print outcomes as JSON.
    json: bool,
    #[arg(long)]
    /// Directory to write reports into.
    report_out: Option<PathBuf>,
    #[arg(short, long)]
    /// Display more information.
    debug: bool,
}

/// Gets the runs requested on the command line.
///
/// ## Parameters:
/// * `args` (`&Args`): Command line arguments,
/// * `base_branch` (`&str`): Configured base branch.
///
/// ## Returns:
/// * (`Result<Vec<RunIdentifiers>>`): One entry per pull request, empty when the event
///   is to be ignored.
fn requested_runs(args: &Args, base_branch: &str) -> Result<Vec<RunIdentifiers>> {
    if let Some(event) = &args.event {
        let json = fs::read_to_string(event)
            .with_context(|| format!("failed to read `{}`", event.display()))?;
        let payload = WebhookPayload::from_json(&json)?;
        let Some(identifiers) = payload.identifiers(base_branch) else {
            info!(action = %payload.action, "ignoring pull request event");
            return Ok(Vec::new());
        };
        return Ok(vec![RunIdentifiers {
            repository: args.path.clone(),
            base_branch: args.base.clone().unwrap_or(identifiers.base_branch),
            ..identifiers
        }]);
    }
    Ok(args
        .pr
        .iter()
        .map(|&pr_number| RunIdentifiers {
            repository: args.path.clone(),
            pr_number,
            pr_url: match &args.url {
                Some(url) => format!("{}/pull/{pr_number}", url.trim_end_matches('/')),
                None => format!("pull request #{pr_number}"),
            },
            base_branch: base_branch.to_string(),
        })
        .collect())
}

fn print_outcome(outcome: &RunOutcome) {
    let pr_number = outcome.identifiers.pr_number;
    match (&outcome.error, &outcome.report) {
        (Some(failure), _) => println!(
            "❌ Pull request #{pr_number} failed at {:?}: {}",
            failure.stage, failure.message
        ),
        (None, Some(report)) => println!("{report}"),
        (None, None) => println!("Pull request #{pr_number}: no report"),
    }
}

/// Runs the analysis of every requested pull request.
/// - Load configuration and logging,
/// - Run one pipeline per pull request, concurrently,
/// - Display the reports.
///
/// ## Returns:
/// - (`Result<()>`): Ok if every run succeeded, else the number of failed runs.
fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(base) = &args.base {
        loader = loader.with_override("base_branch", base);
    }
    if let Some(policy) = args.touch_policy {
        loader = loader.with_override("touch_policy", policy);
    }
    let config = loader.load()?;
    init_logging(&config.log, args.debug)?;

    let runs = requested_runs(&args, &config.base_branch)?;
    if runs.is_empty() {
        return Ok(());
    }

    let base_branch = runs
        .first()
        .map_or(config.base_branch.clone(), |run| run.base_branch.clone());
    let source_control = GitSourceControl::new(base_branch, args.head.clone());
    let repository_loader: Box<dyn RepositoryLoader> = if args.worktree {
        Box::new(WorkdirLoader)
    } else {
        Box::new(GitRepositoryLoader)
    };
    let embedder = HashingEmbedder::new(config.embedding_dimensions)?;
    let report_generator = MarkdownReportGenerator;
    let file_sink = args.report_out.as_ref().map(FileSink::new);

    let pipeline = Pipeline::new(
        Collaborators {
            source_control: &source_control,
            loader: repository_loader.as_ref(),
            embedder: &embedder,
            report_generator: &report_generator,
            sink: file_sink.as_ref().map(|sink| sink as &dyn NotificationSink),
        },
        config.pipeline_settings(),
    );

    let batch = pipeline.run_all(runs);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&batch.outcomes)?);
    } else {
        for outcome in &batch.outcomes {
            print_outcome(outcome);
        }
    }
    for pr_number in &batch.panicked {
        eprintln!("❌ Pull request #{pr_number} crashed");
    }

    let failed = batch.failed();
    if failed > 0 {
        bail!("{failed} of {} runs failed", batch.started());
    }
    Ok(())
}
