//! CLI command definitions

use clap::{Parser, ValueEnum};
use council_domain::DebateRole;
use std::path::PathBuf;

/// Output format for council results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every stage: answers, rankings and the synthesis
    Full,
    /// Only the final synthesis
    Synthesis,
    /// JSON output
    Json,
}

impl From<OutputFormat> for council_domain::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Full => council_domain::OutputFormat::Full,
            OutputFormat::Synthesis => council_domain::OutputFormat::Synthesis,
            OutputFormat::Json => council_domain::OutputFormat::Json,
        }
    }
}

/// CLI arguments for llm-council
#[derive(Parser, Debug)]
#[command(name = "llm-council")]
#[command(author, version, about = "LLM Council - several models answer, rank each other, and a chairman concludes")]
#[command(long_about = r#"
LLM Council sends your question to a council of models and combines their work.

The process has three stages:
1. Answers:    every council model answers independently, streamed live
2. Rankings:   every model ranks the anonymized answers ("Response A", ...)
3. Synthesis:  the chairman model writes the final answer

While a job runs, type on stdin:
  skip <model>   stop waiting for one model
  continue       move on once at least one model has answered (stage 1)
  cancel         abandon the job (Ctrl-C does the same)

Configuration files are loaded from (in priority order):
1. COUNCIL_* environment variables
2. --config <path>     Explicit config file
3. ./council.toml      Project-level config
4. ~/.config/llm-council/config.toml   Global config

Example:
  llm-council -m openai/gpt-4o -m anthropic/claude-3.5-sonnet "Is Rust a good first language?"
  llm-council --debate --role advocate --role skeptic -m openai/gpt-4o -m google/gemini-2.5-pro "Tabs or spaces?"
"#)]
pub struct Cli {
    /// The question to ask the council (the topic in debate mode)
    pub question: Option<String>,

    /// Models to include in the council (can be specified multiple times)
    #[arg(short, long, value_name = "MODEL")]
    pub model: Vec<String>,

    /// Model that writes the final synthesis (moderates in debate mode)
    #[arg(long, value_name = "MODEL")]
    pub chairman: Option<String>,

    /// Conversation to add the question to (a new one when omitted)
    #[arg(long, value_name = "ID")]
    pub conversation: Option<String>,

    /// Output format (defaults to the configured format, then synthesis)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Run a moderated debate instead of the council pipeline
    #[arg(long)]
    pub debate: bool,

    /// Debate role for the participant at the same position (repeatable)
    #[arg(long = "role", value_name = "ROLE", value_parser = parse_role, requires = "debate")]
    pub roles: Vec<DebateRole>,

    /// Discussion turns after the opening statements
    #[arg(long, value_name = "N", requires = "debate")]
    pub max_turns: Option<usize>,

    /// List the models the provider offers and exit
    #[arg(long)]
    pub list_models: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// `--output`, else the configured format, else synthesis only
    pub fn output_format(
        &self,
        configured: Option<council_domain::OutputFormat>,
    ) -> council_domain::OutputFormat {
        self.output
            .map(Into::into)
            .or(configured)
            .unwrap_or_default()
    }
}

fn parse_role(s: &str) -> Result<DebateRole, String> {
    s.parse::<DebateRole>().map_err(|e| e.to_string())
}
