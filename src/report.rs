use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use tracing::info;

use crate::collaborators::{NotificationSink, ReportGenerator, RunIdentifiers};

/// Report of a run that found nothing to report on.
pub const NO_IMPACT_REPORT: &str =
    "Could not generate a report due to earlier errors or no impact context found.";

/// Renders the impact text as a markdown document, without any model in the loop.
#[derive(Default)]
pub struct MarkdownReportGenerator;

impl ReportGenerator for MarkdownReportGenerator {
    fn generate(&self, impact_text: &str, pr_url: &str) -> Result<String> {
        let changes = impact_text.matches("Change in `").count();
        let usages = impact_text.matches("- Usage in `").count();
        Ok(format!(
            "# Impact analysis\n\n\
             Pull request: {pr_url}\n\n\
             {changes} changed symbol(s), {usages} potential usage(s).\n\n\
             ## Details\n\n\
             {impact_text}\n"
        ))
    }
}

/// Writes each report to `<directory>/pr-<number>.md`.
pub struct FileSink {
    directory: PathBuf,
}

impl FileSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        FileSink {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, identifiers: &RunIdentifiers) -> PathBuf {
        self.directory.join(format!("pr-{}.md", identifiers.pr_number))
    }
}

impl NotificationSink for FileSink {
    fn deliver(&self, identifiers: &RunIdentifiers, report: &str) -> Result<()> {
        fs::create_dir_all(&self.directory)
            .with_context(|| format!("failed to create `{}`", self.directory.display()))?;
        let path = self.path_for(identifiers);
        fs::write(&path, report).with_context(|| format!("failed to write `{}`", path.display()))?;
        info!(pr_number = identifiers.pr_number, "report written to {}", path.display());
        Ok(())
    }
}

/// Emits each report as a log event.
#[derive(Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, identifiers: &RunIdentifiers, report: &str) -> Result<()> {
        info!(
            repository = %identifiers.repository,
            pr_number = identifiers.pr_number,
            "{report}"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifiers() -> RunIdentifiers {
        RunIdentifiers {
            repository: "acme/shop".to_string(),
            pr_number: 42,
            pr_url: "https://example.com/acme/shop/pull/42".to_string(),
            base_branch: "main".to_string(),
        }
    }

    #[test]
    fn markdown_report_embeds_impact_and_url() {
        let impact = "Change in `a.py` related to symbol `f`:\n**Potential Usages:**\n- Usage in `b.py` (Line 1):\n```python\nf()\n```";
        let report = MarkdownReportGenerator
            .generate(impact, "https://example.com/pull/1")
            .expect("report renders");
        assert!(report.starts_with("# Impact analysis\n\nPull request: https://example.com/pull/1\n"));
        assert!(report.contains("1 changed symbol(s), 1 potential usage(s)."));
        assert!(report.contains(impact));
    }

    #[test]
    fn markdown_report_is_deterministic() {
        let first = MarkdownReportGenerator.generate("x", "u").expect("report renders");
        let second = MarkdownReportGenerator.generate("x", "u").expect("report renders");
        assert_eq!(first, second);
    }

    #[test]
    fn file_sink_writes_one_file_per_pull_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FileSink::new(dir.path().join("reports"));
        sink.deliver(&identifiers(), "# report").expect("delivered");
        let written = fs::read_to_string(dir.path().join("reports/pr-42.md")).expect("file exists");
        assert_eq!(written, "# report");
    }

    #[test]
    fn log_sink_never_fails() {
        assert!(LogSink.deliver(&identifiers(), "report").is_ok());
    }
}
