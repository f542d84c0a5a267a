// 🧑‍🔬 mcml - fuzzy lookup of people in the MCML team directory
//
//   mcml export                 crawl mcml.ai/team and rebuild the local database
//   mcml search --name "Dan Cremer"
//   mcml check --first Daniel --last Cremers
//   mcml info

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mcml_roster::config::Config;
use mcml_roster::db::{ExportSummary, Store, StoreMetadata};
use mcml_roster::matcher::RankedMatch;
use mcml_roster::service::{self, PersonQuery};
use mcml_roster::sources::{CsvSource, DirectorySource, PersonSource};
use mcml_roster::LookupError;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mcml", version, about = "Query MCML people from a local database")]
struct Cli {
    /// Path to the SQLite database (default: $MCML_DB or the XDG data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON file overriding match weights and thresholds
    #[arg(long, global = true, env = "MCML_POLICY")]
    policy: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the team pages (or load a CSV) and replace the local database
    Export {
        /// Load people from a CSV file instead of crawling
        #[arg(long, value_name = "FILE")]
        from_csv: Option<PathBuf>,

        /// Crawl only these pages (repeatable); disables page discovery
        #[arg(long, value_name = "URL", conflicts_with = "from_csv")]
        seed: Vec<String>,
    },

    /// Ranked candidates for a (partial or misspelled) name
    Search {
        #[command(flatten)]
        who: NameArgs,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Yes/no membership answer plus the top matches
    Check {
        #[command(flatten)]
        who: NameArgs,

        #[arg(long)]
        json: bool,
    },

    /// Database location, record count and last update
    Info {
        /// Also list the most recent exports
        #[arg(long, value_name = "N")]
        history: Option<usize>,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct NameArgs {
    /// First name (can be partial/misspelled)
    #[arg(long)]
    first: Option<String>,

    /// Last name (can be partial/misspelled)
    #[arg(long)]
    last: Option<String>,

    /// Full name, split into first name and the rest (one word is a last name)
    #[arg(long)]
    name: Option<String>,
}

impl NameArgs {
    fn query(&self) -> PersonQuery {
        PersonQuery::from_parts(self.first.as_deref(), self.last.as_deref(), self.name.as_deref())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {:#}", err);
            let lookup = err.downcast_ref::<LookupError>();
            if let Some(LookupError::InvalidQuery(_)) = lookup {
                eprintln!("   Pass --first and/or --last (or --name \"First Last\").");
            }
            ExitCode::from(lookup.map_or(1, LookupError::exit_code))
        }
    }
}

/// Logs go to stderr; RUST_LOG overrides the -v level
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::resolve(cli.db, cli.policy.as_deref())?;

    match cli.command {
        Command::Export { from_csv, seed } => run_export(&config, from_csv, seed),
        Command::Search { who, limit, json } => run_search(&config, &who.query(), limit, json),
        Command::Check { who, json } => run_check(&config, &who.query(), json),
        Command::Info { history, json } => run_info(&config, history, json),
    }
}

fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))
}

/// True (after printing a hint) when there is nothing to search yet
fn warn_if_empty(store: &Store, config: &Config) -> Result<bool> {
    if store.verify_count()? > 0 {
        return Ok(false);
    }
    eprintln!(
        "Database is empty. Run 'mcml export' first. DB: {}",
        config.db_path.display()
    );
    Ok(true)
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_export(config: &Config, from_csv: Option<PathBuf>, seed: Vec<String>) -> Result<()> {
    let source: Box<dyn PersonSource> = match from_csv {
        Some(path) => Box::new(CsvSource::new(path)),
        None if seed.is_empty() => Box::new(DirectorySource::new()?),
        None => Box::new(DirectorySource::new()?.with_seeds(seed)),
    };

    let mut store = open_store(config)?;
    let summary = service::export(&mut store, source.as_ref())?;

    println!(
        "✓ Stored {} people in {}",
        summary.inserted,
        config.db_path.display()
    );
    if summary.duplicates_skipped > 0 {
        println!("  {} duplicates skipped", summary.duplicates_skipped);
    }
    Ok(())
}

fn run_search(config: &Config, query: &PersonQuery, limit: Option<usize>, json: bool) -> Result<()> {
    query.validate()?;
    let store = open_store(config)?;
    let empty = warn_if_empty(&store, config)?;

    let matches = service::search(&store, query, limit, &config.policy)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
    } else if matches.is_empty() {
        if !empty {
            println!("No close matches found.");
        }
    } else {
        print_matches(&format!("MCML candidates for: {}", query.label()), &matches);
    }
    Ok(())
}

fn run_check(config: &Config, query: &PersonQuery, json: bool) -> Result<()> {
    query.validate()?;
    let store = open_store(config)?;
    warn_if_empty(&store, config)?;

    let outcome = service::check(&store, query, &config.policy)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.is_member {
        println!("✓ Yes, likely an MCML member.");
    } else {
        println!("✗ No strong match found in the local database.");
    }
    if !outcome.matches.is_empty() {
        println!();
        print_matches(&format!("Top matches for: {}", query.label()), &outcome.matches);
    }
    Ok(())
}

#[derive(Serialize)]
struct InfoReport {
    db_path: String,
    #[serde(flatten)]
    metadata: StoreMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    history: Vec<ExportSummary>,
}

fn run_info(config: &Config, history: Option<usize>, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let report = InfoReport {
        db_path: config.db_path.display().to_string(),
        metadata: service::info(&store)?,
        history: match history {
            Some(n) => store.export_history(n)?,
            None => Vec::new(),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let meta = &report.metadata;
    println!("DB: {}", report.db_path);
    println!("Records: {}", meta.record_count);
    match meta.last_updated_at {
        Some(at) => println!("Last updated (UTC): {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("Last updated (UTC): never"),
    }
    if let Some(source) = &meta.last_source {
        println!("Source: {}", source);
    }
    if let Some(fingerprint) = &meta.fingerprint {
        println!("Fingerprint: {}", &fingerprint[..fingerprint.len().min(16)]);
    }

    if !report.history.is_empty() {
        println!("\nRecent exports:");
        for export in &report.history {
            println!(
                "  {}  {:>5} people  {:>3} dup  {}",
                export.exported_at.format("%Y-%m-%d %H:%M:%S"),
                export.inserted,
                export.duplicates_skipped,
                export.source
            );
        }
    }
    Ok(())
}

// ============================================================================
// TABLE OUTPUT
// ============================================================================

fn print_matches(title: &str, matches: &[RankedMatch]) {
    println!("{}", title);
    println!(
        "{:>5}  {:<30}  {:<24}  {:<28}  {}",
        "score", "name", "role", "note", "url"
    );
    println!("{}", "─".repeat(100));

    for m in matches {
        println!(
            "{:>5.2}  {:<30}  {:<24}  {:<28}  {}",
            m.score.combined,
            fit(&m.record.shown_name(), 30),
            fit(&m.record.role, 24),
            fit(&m.record.note, 28),
            m.record.profile_url.as_deref().unwrap_or("")
        );
    }
}

/// Truncate to `width` chars with an ellipsis
fn fit(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
