//! CLI entrypoint for LLM Council
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use council_application::{
    CouncilConfig, DebateInput, JobService, JobStore, ProgressEvent, RunDebateUseCase,
    WorkerGateway,
};
use council_domain::{ConversationId, JobStatus, OutputFormat, UserQuery};
use council_infrastructure::{
    ConfigLoader, FileConfig, JsonConversationStore, JsonJobRepository, JsonlJobEventLogger,
    OpenRouterGateway, OpenRouterSettings,
};
use council_presentation::{
    Cli, ConsoleFormatter, DebateFormatter, OutputFormatter, ProgressReporter, ProgressView,
    SimpleProgress, follow_job, spawn_stdin_reader,
};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    // Load configuration
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    apply_cli_overrides(&cli, &mut config);
    config.validate().context("Invalid configuration")?;

    let data_dir = config.storage.resolve_data_dir();
    let _log_guard = init_logging(cli.verbose, data_dir.as_deref());
    ConsoleFormatter::set_color(config.output.color);

    info!("Starting LLM Council");

    // === Dependency Injection ===
    // Create infrastructure adapter (OpenRouter gateway)
    let settings = OpenRouterSettings::from_env(
        config.provider.api_url.clone(),
        &config.provider.api_key_env,
        config.connect_timeout(),
    )?;
    let gateway = Arc::new(OpenRouterGateway::new(settings)?);

    if cli.list_models {
        let models = gateway.available_models().await?;
        print!("{}", ConsoleFormatter::format_models(&models));
        return Ok(());
    }

    let question = match &cli.question {
        Some(q) => q.clone(),
        None => bail!("Question is required. Pass it as the first argument."),
    };
    let council = config
        .council_config()
        .context("No usable council: pass --model or set [council] models")?;
    let format = cli.output_format(config.output.format);

    if cli.debate {
        return run_debate(&cli, gateway, council, question, format).await;
    }

    let data_dir = data_dir.context("No data directory: set [storage] data_dir")?;
    run_council(&cli, &config, &data_dir, gateway, council, question, format).await
}

/// `-m` replaces the configured council, `--chairman` the chairman
fn apply_cli_overrides(cli: &Cli, config: &mut FileConfig) {
    if !cli.model.is_empty() {
        config.council.models = cli.model.clone();
    }
    if let Some(chairman) = &cli.chairman {
        config.council.chairman = Some(chairman.clone());
    }
}

/// Console logging by verbosity, plus a daily log file under the data
/// directory when there is one
fn init_logging(verbose: u8, data_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };

    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(level));

    let (file, guard) = match data_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), "llm-council.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(if verbose > 1 { level } else { "info" }));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file).init();
    guard
}

fn progress_view(quiet: bool) -> Option<Box<dyn ProgressView>> {
    if quiet {
        None
    } else if std::io::stderr().is_terminal() {
        Some(Box::new(ProgressReporter::new()))
    } else {
        Some(Box::new(SimpleProgress::new()))
    }
}

async fn run_council(
    cli: &Cli,
    config: &FileConfig,
    data_dir: &Path,
    gateway: Arc<OpenRouterGateway>,
    council: CouncilConfig,
    question: String,
    format: OutputFormat,
) -> Result<()> {
    let query = UserQuery::try_new(question).context("Question must not be empty")?;

    // Persistence
    let repository = Arc::new(JsonJobRepository::new(data_dir.join("jobs"))?);
    let conversations = Arc::new(JsonConversationStore::new(data_dir.join("conversations"))?);
    let mut store = JobStore::new(repository);
    if let Some(logger) = JsonlJobEventLogger::new(data_dir.join("logs").join("jobs.jsonl")) {
        store = store.with_listener(Arc::new(logger));
    }

    let service = JobService::new(
        gateway,
        Arc::new(store),
        conversations,
        council,
        config.execution.to_params(),
    );

    let interrupted = service.recover()?;
    if !interrupted.is_empty() {
        warn!(count = interrupted.len(), "Jobs from a previous run were interrupted");
    }
    let sweep_cancel = CancellationToken::new();
    let sweep = service.spawn_cleanup_sweep(sweep_cancel.clone());

    let conversation_id = match &cli.conversation {
        Some(id) => ConversationId::new(id.clone()),
        None => ConversationId::generate(),
    };

    let job = service.submit(conversation_id.clone(), query).await?;

    if !cli.quiet && format != OutputFormat::Json {
        eprintln!();
        eprintln!("Question: {}", job.user_query);
        eprintln!(
            "Council: {} (chairman {})",
            service
                .council()
                .models
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            service.council().chairman
        );
        eprintln!("Conversation: {}  Job: {}", conversation_id, job.id.short());
        eprintln!("Type `skip <model>`, `continue` or `cancel` and press Enter to steer the job.");
        eprintln!();
    }

    // Control commands from stdin
    let (tx, rx) = mpsc::channel(16);
    if std::io::stdin().is_terminal()
        && let Err(e) = spawn_stdin_reader(tx)
    {
        warn!(error = %e, "Could not start the stdin control reader");
    }

    let view = progress_view(cli.quiet);
    let terminal = follow_job(&service, &job.id, view.as_deref(), rx).await;

    service.wait(&job.id).await;
    sweep_cancel.cancel();
    if let Err(e) = sweep.await {
        warn!(error = %e, "Cleanup sweep ended abnormally");
    }

    let finished = match terminal.as_ref().and_then(ProgressEvent::final_job) {
        Some(job) => job.clone(),
        None => service
            .store()
            .get(&job.id)
            .with_context(|| format!("Job {} disappeared", job.id))?,
    };

    if format == OutputFormat::Json || finished.status() == JobStatus::Complete {
        println!("{}", ConsoleFormatter.render(&finished, format));
    }

    match terminal {
        Some(ProgressEvent::Error { message, .. }) => bail!("Job failed: {}", message),
        _ if finished.status() != JobStatus::Complete => {
            bail!("Job ended as {}", finished.status())
        }
        _ => Ok(()),
    }
}

async fn run_debate(
    cli: &Cli,
    gateway: Arc<OpenRouterGateway>,
    council: CouncilConfig,
    topic: String,
    format: OutputFormat,
) -> Result<()> {
    let mut input = DebateInput::new(topic.clone(), council.models, council.chairman)
        .with_roles(cli.roles.clone());
    if let Some(max_turns) = cli.max_turns {
        input = input.with_max_turns(max_turns);
    }

    let live = format != OutputFormat::Json;
    let (tx, mut rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if live && let Some(text) = DebateFormatter::format_event(&event) {
                println!("{}", text);
            }
        }
    });

    let use_case = RunDebateUseCase::new(gateway);
    let transcript = tokio::select! {
        transcript = use_case.execute(input, tx) => transcript,
        _ = tokio::signal::ctrl_c() => bail!("Debate interrupted"),
    };
    printer.await?;

    if !live {
        println!("{}", DebateFormatter::format_json(&topic, &transcript));
    }

    Ok(())
}
