//! DebateForge CLI - Debate Dataset Expansion Tool
//!
//! A command-line tool that expands seed questions into structured debate
//! records using OpenAI-compatible APIs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use colored::Colorize;
use debateforge_core::{
    Config, DatasetStore, DebateValidator, ExpansionEvent, ExpansionOrchestrator, FanOutExpander,
    GenerationClient, HttpTransport, QuestionSource, RunSummary, TokioSleeper, default_config,
    generate_questions,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(
    name = "debateforge",
    version,
    about = "Debate dataset expansion tool",
    long_about = "Expands seed questions into debate records (standpoints, arguments, counter-questions) using OpenAI-compatible APIs."
)]
struct Cli {
    /// TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand seed questions into the dataset, one question at a time
    Expand {
        /// Seed questions file
        #[arg(long, value_name = "FILE")]
        seeds: Option<PathBuf>,

        /// Dataset file to extend
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Questions per batch
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Generate concurrently and write training examples in one pass
    Fanout {
        /// Seed questions file
        #[arg(long, value_name = "FILE", conflicts_with = "generate")]
        seeds: Option<PathBuf>,

        /// Sample N questions from the built-in bank instead of a seed file
        #[arg(long, value_name = "N")]
        generate: Option<usize>,

        /// Training examples file (JSON Lines)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Maximum requests in flight
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
    },

    /// Generate a single debate and print it
    Probe {
        /// The question to expand
        #[arg(value_name = "QUESTION")]
        question: String,
    },

    /// Check the structure of every record in a dataset
    Validate {
        /// Dataset file (defaults to the configured dataset)
        #[arg(value_name = "FILE")]
        dataset: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    if let Some(path) = cli.log_file {
        config.paths.log_file = Some(path);
    }

    // Dropping the guard flushes the file writer, so it lives until exit.
    let _log_guard = init_logging(config.paths.log_file.as_deref())?;
    apply_env_overrides(&mut config);

    match cli.command {
        Command::Expand {
            seeds,
            output,
            batch_size,
        } => {
            if let Some(path) = seeds {
                config.paths.seed_questions = path;
            }
            if let Some(path) = output {
                config.paths.dataset = path;
            }
            if let Some(size) = batch_size {
                config.pipeline.batch_size = size;
            }
            run_expand(&config).await
        }
        Command::Fanout {
            seeds,
            generate,
            output,
            concurrency,
        } => {
            if let Some(path) = seeds {
                config.paths.seed_questions = path;
            }
            if let Some(path) = output {
                config.paths.training_output = path;
            }
            if let Some(n) = concurrency {
                config.pipeline.max_concurrent_requests = n;
            }
            run_fanout(&config, generate).await
        }
        Command::Probe { question } => run_probe(&config, &question).await,
        Command::Validate { dataset } => {
            run_validate(&config, dataset.unwrap_or_else(|| config.paths.dataset.clone()))
        }
    }
}

/// Console logging, plus a plain-text file when `log_file` is set.
fn init_logging(
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path.file_name().ok_or("log file path has no file name")?;
            fs::create_dir_all(dir)?;

            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Environment variables take precedence over the config file.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = env::var("DEEPSEEK_API_KEY").or_else(|_| env::var("OPENAI_API_KEY")) {
        config.api.api_key = key;
    }
    if let Ok(base) = env::var("DEEPSEEK_API_BASE").or_else(|_| env::var("OPENAI_API_BASE")) {
        config.api.base_url = base;
    }

    if config.api.api_key.is_empty() {
        eprintln!(
            "{}",
            "Warning: DEEPSEEK_API_KEY not set. API calls may fail.".yellow()
        );
    }
}

fn client(config: &Config) -> Result<GenerationClient<HttpTransport>, Box<dyn std::error::Error>> {
    let transport = HttpTransport::new(&config.api)?;
    Ok(GenerationClient::new(transport, config, TokioSleeper))
}

async fn run_expand(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let seeds = QuestionSource::new(&config.paths.seed_questions).load()?;
    if seeds.is_empty() {
        warn!("no seed questions found or failed to load");
        return Ok(());
    }

    print_header(config, seeds.len());

    let store = DatasetStore::new(&config.paths.dataset);
    let mut orchestrator = ExpansionOrchestrator::new(client(config)?, store, config, TokioSleeper)
        .with_callback(create_console_callback());

    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                "Interrupt received, finishing current question...".yellow()
            );
            stop.store(true, Ordering::SeqCst);
        }
    });

    let summary = orchestrator.run(&seeds).await?;
    print_summary(&summary);
    Ok(())
}

async fn run_fanout(
    config: &Config,
    generate: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = rand::rng();
    let seeds = match generate {
        Some(count) => generate_questions(count, &mut rng),
        None => QuestionSource::new(&config.paths.seed_questions).load()?,
    };
    if seeds.is_empty() {
        warn!("no seed questions found or failed to load");
        return Ok(());
    }

    let expander = FanOutExpander::new(client(config)?, config);
    let report = expander.run(&seeds, &mut rng).await?;

    println!();
    println!(
        "{} {} debates, {} training examples written to {}",
        "Done:".bright_green().bold(),
        report.records.len(),
        report.examples.len(),
        config.paths.training_output.display()
    );
    for (question, error) in &report.failures {
        println!("  {} {} - {}", "✗".red(), question, error.to_string().dimmed());
    }
    Ok(())
}

async fn run_probe(config: &Config, question: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!(%question, "probing single question");
    let debate = client(config)?.generate(question).await?;

    println!("{}", "Debate structure is valid.".bright_green().bold());
    for standpoint in &debate.standpoints {
        println!(
            "  - {}: {} arguments",
            standpoint.id.bright_cyan(),
            standpoint.arguments.len()
        );
    }
    println!("  - {} counter questions", debate.counter_questions.len());
    println!();
    println!("{}", serde_json::to_string_pretty(&debate)?);
    Ok(())
}

fn run_validate(config: &Config, path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    // Raw entries: typed loading fills in defaults for missing fields.
    let records = DatasetStore::new(&path).load_values()?;
    let validator = DebateValidator::new(config.validation.clone());

    let mut invalid = 0;
    for value in &records {
        if let Err(e) = validator.validate(value) {
            invalid += 1;
            let question = value["question"].as_str().unwrap_or_default();
            println!("{} {} [{}] {}", "✗".red(), question, e.rule.code().yellow(), e.detail);
        }
    }

    println!(
        "{} {} records, {} invalid",
        path.display().to_string().bold(),
        records.len(),
        invalid
    );
    if invalid > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_header(config: &Config, seeds: usize) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  DebateForge - Dataset Expansion".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Seeds:".bold(), config.paths.seed_questions.display());
    println!("{} {}", "Dataset:".bold(), config.paths.dataset.display());
    println!(
        "{} {} ({})",
        "Model:".bold(),
        config.api.model.bright_white(),
        config.api.base_url.dimmed()
    );
    println!("{} {}", "Seed questions:".bold(), seeds);
    println!("{}", "─".repeat(70).dimmed());
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    let title = if summary.interrupted {
        "  Expansion interrupted.".yellow().bold()
    } else {
        "  Expansion complete.".bright_green().bold()
    };
    println!("{title}");
    println!(
        "  {:.1} minutes | attempted {} | completed {} | failed {} | skipped {} | total {}",
        summary.elapsed.as_secs_f64() / 60.0,
        summary.attempted,
        summary.completed,
        summary.exhausted,
        summary.already_processed + summary.empty,
        summary.total_records
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
}

/// Create a callback that prints expansion events to the console.
fn create_console_callback() -> Box<dyn Fn(ExpansionEvent) + Send + Sync> {
    Box::new(move |event| match event {
        ExpansionEvent::RunStart { existing, pending } => {
            println!(
                "{} {} existing records, {} new questions",
                "▶".bright_cyan(),
                existing,
                pending.to_string().bright_white().bold()
            );
        }
        ExpansionEvent::BatchStart {
            number,
            total,
            size,
        } => {
            println!();
            println!(
                "{}",
                format!("  Batch {number}/{total} ({size} questions)")
                    .bright_magenta()
                    .bold()
            );
        }
        ExpansionEvent::QuestionStart { question } => {
            println!("  {} {}", "…".dimmed(), question);
        }
        ExpansionEvent::QuestionCompleted { total_records, .. } => {
            println!("    {} saved ({} total)", "✓".bright_green(), total_records);
        }
        ExpansionEvent::QuestionExhausted { error, .. } => {
            println!("    {} skipped: {}", "✗".red(), error.dimmed());
        }
        ExpansionEvent::BatchEnd { .. } | ExpansionEvent::RunEnd { .. } => {
            // Summary printed in main
        }
    })
}
