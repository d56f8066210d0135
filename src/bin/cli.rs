//! Bolus History CLI
//!
//! Command-line interface for bolus history operations:
//! - Retrieve therapy data from t:connect, dump it and/or import it
//! - Show glucose or insulin events around a time
//! - Generate a default config file

use anyhow::{bail, Context};
use bolus_history::config::Config;
use bolus_history::import::{self, TracingReporter};
use bolus_history::storage::{
    GlucoseReading, InsulinDelivery, SeriesKind, SeriesRecord, Store, TimeWindow,
};
use bolus_history::tandem::{
    parse_date_arg, write_dump, DateRange, FileSource, RangeError, TandemClient, TandemLogin,
    TherapyDataSource,
};
use bolus_history::{logging, storage};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bolus-history")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Correlate meals with glucose and insulin history")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Retrieve t:connect data and import it
    Import {
        /// First day to retrieve (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// End of the retrieval range
        #[arg(long)]
        end: Option<String>,
        /// Number of days to retrieve
        #[arg(long)]
        days: Option<i64>,
        /// Write all retrieved data to this JSON file
        #[arg(long)]
        out: Option<PathBuf>,
        /// Import the therapy events into the database
        #[arg(long)]
        commit: bool,
        /// Read previously dumped data instead of t:connect
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Show stored events around a time
    Window {
        /// Event series (glucose, insulin)
        series: SeriesKind,
        /// Center of the window
        #[arg(long)]
        anchor: String,
        /// Hours before the anchor
        #[arg(long, default_value_t = storage::DEFAULT_PRE_HOURS)]
        pre: i64,
        /// Hours after the anchor
        #[arg(long, default_value_t = storage::DEFAULT_POST_HOURS)]
        post: i64,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    logging::init(&config.logging);

    match cli.command {
        Commands::Import {
            start,
            end,
            days,
            out,
            commit,
            from_file,
        } => {
            if out.is_none() && !commit {
                bail!("Nothing to do: give --out FILE and/or --commit");
            }

            let source: Box<dyn TherapyDataSource> = match &from_file {
                Some(path) => Box::new(FileSource::new(path)),
                None => {
                    // Abort before any network traffic
                    let login = match TandemLogin::from_env() {
                        Ok(login) => login,
                        Err(e) => {
                            tracing::error!("{}", e);
                            std::process::exit(1);
                        }
                    };
                    Box::new(TandemClient::new(config.tandem.clone(), login)?)
                }
            };

            let range = resolve_range(start, end, days, from_file.is_some())?;
            tracing::info!("Retrieving {} from {}", range, source.name());

            let data = source.fetch(&range, out.is_some()).await?;

            if let Some(path) = &out {
                write_dump(path, &data).await?;
            }

            if commit {
                let store = open_store(&config)?;
                let report = import::commit(&store, &data, &TracingReporter)?;
                println!(
                    "Accepted {} and discarded {} records",
                    report.total_accepted(),
                    report.total_discarded()
                );
            }
        }

        Commands::Window {
            series,
            anchor,
            pre,
            post,
        } => {
            if pre < 0 || post < 0 {
                bail!("--pre and --post must not be negative");
            }
            let anchor = parse_date_arg(&anchor)?;
            let store = open_store(&config)?;

            match series {
                SeriesKind::Glucose => print_window::<GlucoseReading>(&store, anchor, pre, post)?,
                SeriesKind::Insulin => print_window::<InsulinDelivery>(&store, anchor, pre, post)?,
            }
        }

        Commands::Config { output } => {
            let content = bolus_history::config::generate_default_config();

            if let Some(path) = output {
                write_config(&path, &content)?;
                println!("Config written to {:?}", path);
            } else {
                println!("{}", content);
            }
        }
    }

    Ok(())
}

/// A dump replays its own range, so bounds are optional with `--from-file`
fn resolve_range(
    start: Option<String>,
    end: Option<String>,
    days: Option<i64>,
    from_file: bool,
) -> anyhow::Result<DateRange> {
    let start = start.as_deref().map(parse_date_arg).transpose()?;
    let end = end.as_deref().map(parse_date_arg).transpose()?;
    let now = chrono::Local::now().naive_local();

    match DateRange::resolve(start, end, days, now) {
        Ok(range) => Ok(range),
        Err(RangeError::MissingBounds) if from_file => Ok(DateRange::resolve(None, None, Some(1), now)?),
        Err(e) => Err(e.into()),
    }
}

fn open_store(config: &Config) -> anyhow::Result<Store> {
    let path = config.storage.path();
    tracing::debug!("Opening database {}", path.display());
    Store::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn print_window<T: SeriesRecord>(
    store: &Store,
    anchor: chrono::NaiveDateTime,
    pre: i64,
    post: i64,
) -> anyhow::Result<()> {
    if TimeWindow::around(anchor, pre, post).is_none() {
        bail!("Window -{}h/+{}h around {} is out of range", pre, post, anchor);
    }
    let events = store.events_in_window::<T>(anchor, pre, post)?;
    if events.is_empty() {
        println!("No {} events within -{}h/+{}h of {}", T::KIND, pre, post, anchor);
        return Ok(());
    }

    for row in &events {
        println!("{}", row.record);
    }
    println!("{} {} events", events.len(), T::KIND);
    Ok(())
}

fn write_config(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}
