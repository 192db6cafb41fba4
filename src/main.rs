//! Blueprint CLI - validate and dry-run blueprint files

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::{Map, Value};

use blueprint::codec;
use blueprint::config::BlueprintConfig;
use blueprint::error::{BlueprintError, FixSuggestion};
use blueprint::runtime::{DryRunApplier, OnError, ReconcileReport, Reconciler};
use blueprint::store::{MemoryStore, ProcessEnv};
use blueprint::{Document, EventLog, Externals};

#[derive(Parser)]
#[command(name = "blueprint")]
#[command(about = "Blueprint - declarative entries with YAML tag resolution")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a blueprint file (parse + structure only)
    Validate {
        /// Path to the blueprint YAML file
        file: PathBuf,
    },

    /// Resolve every entry against an in-memory store and print the result
    Resolve {
        #[command(flatten)]
        run: RunArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },

    /// Dry-run a blueprint and print its event log as JSON
    Events {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the blueprint YAML file
    file: PathBuf,

    /// Context value (KEY=VALUE, VALUE parsed as YAML), repeatable
    #[arg(short, long = "context", value_parser = parse_context)]
    context: Vec<(String, Value)>,

    /// What to do when an entry fails (abort, skip)
    #[arg(long)]
    on_error: Option<OnError>,

    /// Config file (defaults to ~/.config/blueprint/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => validate_blueprint(&file),
        Commands::Resolve { run, format } => resolve_blueprint(&run, format),
        Commands::Events { run } => print_events(&run),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn parse_context(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.is_empty() {
        return Err("context key must not be empty".to_string());
    }
    let value = serde_yaml::from_str::<Value>(value)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn load(file: &Path) -> Result<Document, BlueprintError> {
    let document = codec::load_file(file)?;
    document.validate()?;
    Ok(document)
}

fn validate_blueprint(file: &Path) -> Result<(), BlueprintError> {
    let document = load(file)?;
    let tagged = document
        .entries
        .iter()
        .filter(|e| {
            e.model.contains_tags()
                || e.state.contains_tags()
                || e.identifiers.contains_tags()
                || e.attrs.contains_tags()
                || e.conditions.iter().any(|c| c.contains_tags())
        })
        .count();

    println!("{} Blueprint '{}' is valid", "✓".green(), file.display());
    if let Some(metadata) = &document.metadata {
        println!("  Name: {}", metadata.name);
    }
    println!("  Entries: {}", document.entries.len());
    println!("  Entries with tags: {}", tagged);
    Ok(())
}

/// Load, layer context and reconcile against a fresh in-memory store
fn dry_run(run: &RunArgs, event_log: EventLog) -> Result<ReconcileReport, BlueprintError> {
    let config = match &run.config {
        Some(path) => BlueprintConfig::load_from(path)?,
        None => BlueprintConfig::load()?,
    }
    .with_env();

    let mut document = load(&run.file)?;
    document.context_defaults(&config.context);
    document.merge_context(run.context.iter().cloned().collect::<Map<String, Value>>());

    let on_error = run.on_error.unwrap_or_else(|| config.on_error());
    let store = MemoryStore::new();
    let applier = DryRunApplier::new(store.clone());
    let env = ProcessEnv;

    Reconciler::new(Externals::new(&store, &env), &applier)
        .with_on_error(on_error)
        .with_event_log(event_log)
        .run(&document)
}

fn resolve_blueprint(run: &RunArgs, format: OutputFormat) -> Result<(), BlueprintError> {
    let report = dry_run(run, EventLog::new())?;

    let output = match format {
        OutputFormat::Yaml => codec::dump_value(&report.to_json())?,
        OutputFormat::Json => serde_json::to_string_pretty(&report.to_json()).map_err(|e| {
            BlueprintError::DumpError {
                details: e.to_string(),
            }
        })?,
    };
    print!("{}", output);
    if matches!(format, OutputFormat::Json) {
        println!();
    }

    for failure in &report.failed {
        eprintln!(
            "{} entry #{}: {}",
            "Skipped:".yellow().bold(),
            failure.index,
            failure.error
        );
    }
    eprintln!(
        "{} {} applied, {} skipped, {} failed",
        "→".cyan(),
        report.applied.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(())
}

fn print_events(run: &RunArgs) -> Result<(), BlueprintError> {
    let event_log = EventLog::new();
    // Failures are part of the log; print it either way
    let result = dry_run(run, event_log.clone());

    let json = serde_json::to_string_pretty(&event_log.to_json()).map_err(|e| {
        BlueprintError::DumpError {
            details: e.to_string(),
        }
    })?;
    println!("{}", json);
    result.map(|_| ())
}
