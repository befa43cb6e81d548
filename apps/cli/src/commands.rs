//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chapterwatch_core::{Pipeline, current_week, pipeline, week_of};
use chapterwatch_shared::{
    AppConfig, RunConfig, StorageTarget, init_config, load_config, load_config_from,
};
use chapterwatch_storage::Storage;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ChapterWatch: announce each new chapter once per week.
#[derive(Parser)]
#[command(
    name = "chapterwatch",
    version,
    about = "Detect this week's chapter post and announce its reading link to Telegram.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.chapterwatch/chapterwatch.toml.
    #[arg(long, global = true, env = "CHAPTERWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline once for the current week and print the report.
    Run,

    /// Print the week index for today (UTC) or a given date.
    Week {
        /// Date as YYYY-MM-DD.
        #[arg(long)]
        date: Option<String>,
    },

    /// List recorded detections, newest first.
    History {
        /// Show at most this many rows.
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries
/// only command output.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "chapterwatch=info",
        1 => "chapterwatch=debug",
        _ => "chapterwatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run => cmd_run(config_path).await,
        Command::Week { date } => cmd_week(date.as_deref()),
        Command::History { limit } => cmd_history(config_path, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let run_config = RunConfig::resolve(&config)?;
    let week = current_week();

    info!(%week, listing = %run_config.board.listing_url, "starting run");

    let report = match Pipeline::from_config(&run_config).await {
        Ok(pipeline) => pipeline.run_and_report(week).await,
        Err(e) => pipeline::report(&Err(e)),
    };

    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_week(date: Option<&str>) -> Result<()> {
    let week = match date {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| eyre!("invalid date '{raw}': {e}"))?;
            week_of(date)
        }
        None => current_week(),
    };
    println!("{week}");
    Ok(())
}

async fn cmd_history(config_path: Option<&Path>, limit: usize) -> Result<()> {
    let config = load(config_path)?;
    let target = StorageTarget::resolve(&config.storage)?;
    let storage = Storage::connect_readonly(&target).await?;

    let detections = storage.list_detections().await?;
    info!(count = detections.len(), "loaded detections");

    if detections.is_empty() {
        println!("No detections recorded yet.");
        return Ok(());
    }

    for detection in detections.iter().take(limit) {
        println!(
            "  {}  {}  {}",
            detection.week,
            detection.detected_at.format("%Y-%m-%d %H:%M"),
            detection.url
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
