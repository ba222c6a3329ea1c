//! Console output formatter for council jobs

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use council_domain::{
    ConversationId, Job, JobId, JobMetadata, JobStatus, Stage1Result, Stage2Result, Stage3Result,
    WorkerId,
};
use serde::Serialize;

/// Machine-readable shape of a job for `--output json`
#[derive(Serialize)]
struct CouncilReport<'a> {
    job_id: &'a JobId,
    conversation_id: &'a ConversationId,
    status: JobStatus,
    query: &'a str,
    stage1: &'a [Stage1Result],
    stage2: &'a [Stage2Result],
    stage3: Option<&'a Stage3Result>,
    metadata: Option<&'a JobMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Formats council jobs for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Turn colors off for the rest of the process (`[output] color = false`)
    pub fn set_color(enabled: bool) {
        if !enabled {
            colored::control::set_override(false);
        }
    }

    /// Format every stage of the job
    pub fn format(job: &Job) -> String {
        let mut output = String::new();

        // Header
        output.push_str(&Self::header("LLM Council Results"));
        output.push('\n');

        output.push_str(&format!(
            "{} {}\n\n",
            "Question:".cyan().bold(),
            job.user_query
        ));

        let stage1 = job.stage1.as_deref().unwrap_or_default();
        output.push_str(&format!(
            "{} {}\n",
            "Models:".cyan().bold(),
            Self::join(stage1.iter().map(|r| &r.model))
        ));
        if !job.progress.models_failed.is_empty() {
            output.push_str(&format!(
                "{} {}\n",
                "Failed:".red().bold(),
                Self::join(job.progress.models_failed.iter())
            ));
        }

        // Stage 1: Individual answers
        output.push_str(&Self::section_header("Stage 1: Individual Responses"));
        for result in stage1 {
            output.push_str(&format!(
                "\n{}\n{}\n",
                format!("── {} ──", result.model).yellow().bold(),
                result.response
            ));
        }

        // Stage 2: Peer rankings
        if let Some(section) = Self::format_rankings(job) {
            output.push_str(&section);
        }

        // Stage 3: Synthesis
        output.push_str(&Self::section_header("Stage 3: Final Synthesis"));
        match &job.stage3 {
            Some(result) => {
                let title = format!("Chairman: {}", result.model);
                let title = if result.is_fallback() {
                    title.red().bold()
                } else {
                    title.yellow().bold()
                };
                output.push_str(&format!("\n{}\n\n{}\n", title, result.response));
            }
            None => output.push_str(&format!("\n{}\n", "No synthesis".dimmed())),
        }

        if let Some(error) = job.error() {
            output.push_str(&format!("\n{} {}\n", "Error:".red().bold(), error));
        }

        output.push_str(&Self::footer());

        output
    }

    fn format_rankings(job: &Job) -> Option<String> {
        let metadata = job.metadata.as_ref()?;
        let mut output = Self::section_header("Stage 2: Peer Rankings");

        if let Some(reason) = &metadata.skipped_reason {
            output.push_str(&format!("\n{} {}\n", "Skipped:".dimmed(), reason.dimmed()));
            return Some(output);
        }

        for result in job.stage2.as_deref().unwrap_or_default() {
            output.push_str(&format!(
                "\n{}\n{}\n",
                format!("── {} ──", result.model).yellow().bold(),
                Self::indent(&result.ranking, "  ")
            ));
            if !result.parsed_ranking.is_empty() {
                let order: Vec<String> = result
                    .parsed_ranking
                    .iter()
                    .map(|label| match metadata.label_to_model.worker_for(label) {
                        Some(worker) => format!("{} ({})", label, worker),
                        None => label.clone(),
                    })
                    .collect();
                output.push_str(&format!(
                    "  {} {}\n",
                    "Parsed:".dimmed(),
                    order.join(" > ")
                ));
            }
        }

        if !metadata.aggregate_rankings.is_empty() {
            output.push_str(&format!("\n{}\n", "Aggregate Rankings:".green().bold()));
            for (position, rank) in metadata.aggregate_rankings.iter().enumerate() {
                output.push_str(&format!(
                    "  {}. {} - avg {:.2} ({} votes)\n",
                    position + 1,
                    rank.model,
                    rank.average_rank,
                    rank.rankings_count
                ));
            }
        }

        Some(output)
    }

    /// Format as JSON
    pub fn format_json(job: &Job) -> String {
        let report = CouncilReport {
            job_id: &job.id,
            conversation_id: &job.conversation_id,
            status: job.status(),
            query: job.user_query.content(),
            stage1: job.stage1.as_deref().unwrap_or_default(),
            stage2: job.stage2.as_deref().unwrap_or_default(),
            stage3: job.stage3.as_ref(),
            metadata: job.metadata.as_ref(),
            error: job.error(),
        };
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format synthesis only (concise output)
    pub fn format_synthesis_only(job: &Job) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}\n\n",
            "=== LLM Council Conclusion ===".cyan().bold()
        ));

        output.push_str(&format!("{} {}\n\n", "Q:".bold(), job.user_query));

        if let Some(stage1) = &job.stage1 {
            output.push_str(&format!(
                "{} {}\n\n",
                "Models consulted:".dimmed(),
                Self::join(stage1.iter().map(|r| &r.model))
            ));
        }

        match (&job.stage3, job.error()) {
            (Some(result), _) => output.push_str(&result.response),
            (None, Some(error)) => {
                output.push_str(&format!("{} {}", "Error:".red().bold(), error))
            }
            (None, None) => output.push_str(&"No synthesis".dimmed().to_string()),
        }
        output.push('\n');

        output
    }

    /// One model id per line, for `--list-models`
    pub fn format_models(models: &[WorkerId]) -> String {
        let mut output = format!("{} ({})\n", "Available models".cyan().bold(), models.len());
        for model in models {
            output.push_str(&format!("  {}\n", model));
        }
        output
    }

    fn join<'a>(models: impl Iterator<Item = &'a WorkerId>) -> String {
        models.map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, job: &Job) -> String {
        Self::format(job)
    }

    fn format_json(&self, job: &Job) -> String {
        Self::format_json(job)
    }

    fn format_synthesis_only(&self, job: &Job) -> String {
        Self::format_synthesis_only(job)
    }
}
