//! Output formatter trait

use council_domain::{Job, OutputFormat};

/// Trait for formatting finished council jobs
pub trait OutputFormatter {
    /// Every stage: answers, rankings and the synthesis
    fn format(&self, job: &Job) -> String;

    /// Format as JSON
    fn format_json(&self, job: &Job) -> String;

    /// Format synthesis only (concise output)
    fn format_synthesis_only(&self, job: &Job) -> String;

    /// Format in the requested output format
    fn render(&self, job: &Job, format: OutputFormat) -> String {
        match format {
            OutputFormat::Full => self.format(job),
            OutputFormat::Synthesis => self.format_synthesis_only(job),
            OutputFormat::Json => self.format_json(job),
        }
    }
}
