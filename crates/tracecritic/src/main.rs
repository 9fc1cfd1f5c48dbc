use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use tracecritic_agent::{create_generator, Generator, GeneratorType};
use tracecritic_core::{
    CritiqueOutcome, PipelineError, PipelineRunner, RunContext, NO_HISTORY_SENTINEL,
};
use tracecritic_logfire::{LogfireClient, LookbackAge, TraceBackend, MAX_AGE_MINUTES};
use tracecritic_logging::{init_tracing, LogFormat, Logger};
use tracecritic_trace::TraceStore;

mod config;

use config::{Overrides, ProjectConfig, Settings};

/// Exit code for runs that abort before producing a report
const EXIT_FATAL: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "tracecritic",
    about = "Span-by-span critique of AI agent traces",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Diagnostic log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Also append run events as JSON lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Directory holding fetched traces (default: ./data)
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Text-generation backend
    #[arg(short, long, value_enum, global = true)]
    generator: Option<GeneratorChoice>,

    /// Model to use for every generation call
    #[arg(short, long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a trace, critique each assistant span and aggregate a report
    Annotate {
        /// 32 character hexadecimal trace id
        trace_id: String,

        /// Lookback window in minutes (at most 7 days)
        #[arg(long, default_value_t = i64::from(MAX_AGE_MINUTES), allow_negative_numbers = true)]
        age: i64,

        /// Use the stored trace instead of fetching it
        #[arg(long)]
        offline: bool,

        /// Add a whole-trace summary to the report
        #[arg(long)]
        summarize: bool,

        /// Critique only these 1-based positions, e.g. 2,4
        #[arg(long, value_delimiter = ',')]
        positions: Option<Vec<usize>>,

        /// Maximum concurrent critiques
        #[arg(long, value_parser = parse_concurrency)]
        concurrency: Option<usize>,

        /// Output the report as JSON
        #[arg(long)]
        json_output: bool,
    },

    /// Critique one span of a stored trace
    Critique {
        trace_id: String,

        /// 1-based position of the assistant interaction
        position: usize,

        /// Output the entry as JSON
        #[arg(long)]
        json_output: bool,
    },

    /// Run a SQL query against Logfire and print the rows as JSON
    Query {
        sql: String,

        /// Lookback window in minutes (at most 7 days)
        #[arg(long, allow_negative_numbers = true)]
        age: i64,
    },

    /// Describe the columns of the Logfire records table
    Schema,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GeneratorChoice {
    ClaudeCli,
    Anthropic,
}

impl From<GeneratorChoice> for GeneratorType {
    fn from(choice: GeneratorChoice) -> Self {
        match choice {
            GeneratorChoice::ClaudeCli => GeneratorType::ClaudeCli,
            GeneratorChoice::Anthropic => GeneratorType::Anthropic,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("concurrency must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing(&cli.log_level, log_format);

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let project_config = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    match cli.command {
        Command::Annotate {
            ref trace_id,
            age,
            offline,
            summarize,
            ref positions,
            concurrency,
            json_output,
        } => {
            let overrides = overrides(&cli, concurrency, summarize);
            let settings = Settings::resolve(&project_config, &overrides, env_base_url())?;
            let age = LookbackAge::new(age).map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;

            let generator = build_generator(&settings).await?;
            let logger = Arc::new(build_logger(&cli, log_format)?);
            let client = if offline {
                None
            } else {
                Some(build_client(&settings)?)
            };

            let mut runner = PipelineRunner::new(
                generator.as_ref(),
                TraceStore::with_dir(settings.data_dir.clone()),
                logger,
            )
            .with_critique_options(settings.critique_options.clone())
            .with_aggregate_options(settings.aggregate_options.clone());
            if let Some(client) = client.as_ref() {
                runner = runner.with_backend(client);
            }

            let mut context = RunContext::new(trace_id.clone())
                .with_age(age)
                .with_summary(settings.summarize)
                .with_concurrency(settings.concurrency);
            if offline {
                context = context.offline();
            }
            if let Some(positions) = positions {
                context = context.with_positions(positions.clone());
            }

            match runner.run(context).await {
                Ok(report) => {
                    if json_output {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        println!("{}", report.render_markdown());
                    }
                }
                Err(e) => exit_fatal(&e),
            }
        }
        Command::Critique {
            ref trace_id,
            position,
            json_output,
        } => {
            let overrides = overrides(&cli, None, false);
            let settings = Settings::resolve(&project_config, &overrides, env_base_url())?;
            let generator = build_generator(&settings).await?;
            let logger = Arc::new(build_logger(&cli, log_format)?);

            let runner = PipelineRunner::new(
                generator.as_ref(),
                TraceStore::with_dir(settings.data_dir.clone()),
                logger,
            )
            .with_critique_options(settings.critique_options.clone());

            let entry = match runner.critique_stored(trace_id, position).await {
                Ok(entry) => entry,
                Err(e) => exit_fatal(&e),
            };

            if json_output {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            }
            match &entry.outcome {
                CritiqueOutcome::Critique { text } => {
                    if !json_output {
                        println!("{}", text);
                    }
                }
                CritiqueOutcome::NoHistory => {
                    if !json_output {
                        println!("{}", NO_HISTORY_SENTINEL);
                    }
                }
                CritiqueOutcome::Unavailable { kind, reason } => {
                    eprintln!(
                        "{} critique unavailable for span {}: {} ({})",
                        "error:".bright_red().bold(),
                        position,
                        reason,
                        kind
                    );
                    std::process::exit(EXIT_FATAL);
                }
            }
        }
        Command::Query { ref sql, age } => {
            let settings =
                Settings::resolve(&project_config, &Overrides::default(), env_base_url())?;
            let age = LookbackAge::new(age).map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;
            let client = build_client(&settings)?;
            let rows = client
                .query(sql, age)
                .await
                .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Schema => {
            let settings =
                Settings::resolve(&project_config, &Overrides::default(), env_base_url())?;
            let client = build_client(&settings)?;
            let description = client
                .schema()
                .await
                .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;
            println!("{}", description);
        }
    }

    Ok(())
}

fn overrides(cli: &Cli, concurrency: Option<usize>, summarize: bool) -> Overrides {
    Overrides {
        data_dir: cli.data_dir.clone(),
        concurrency,
        summarize,
        generator: cli.generator.map(Into::into),
        model: cli.model.clone(),
    }
}

fn env_base_url() -> Option<String> {
    std::env::var("LOGFIRE_BASE_URL").ok()
}

async fn build_generator(settings: &Settings) -> Result<Box<dyn Generator>> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").ok();
    let generator = create_generator(settings.generator, api_key)
        .with_context(|| format!("Failed to create {} generator", settings.generator))?;

    if !generator.is_available().await {
        anyhow::bail!(
            "Generator '{}' is not available. Make sure it's installed and in PATH.",
            generator.name()
        );
    }
    Ok(generator)
}

fn build_client(settings: &Settings) -> Result<LogfireClient> {
    LogfireClient::from_env(settings.logfire_base_url.clone())
        .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))
}

fn build_logger(cli: &Cli, format: LogFormat) -> Result<Logger> {
    match &cli.log_file {
        Some(path) => Logger::with_file(format, path)
            .with_context(|| format!("Failed to open log file {}", path.display())),
        None => Ok(Logger::new(format)),
    }
}

fn exit_fatal(error: &PipelineError) -> ! {
    eprintln!(
        "{} {} ({}, stage {})",
        "error:".bright_red().bold(),
        error,
        error.kind(),
        error.stage()
    );
    std::process::exit(EXIT_FATAL);
}
