//! Tiledefs CLI - resolve layout definitions from JSON files
//!
//! Usage:
//!     tiledefs --source tiles.json home
//!     tiledefs --source tiles.json --locale en_US news/sports
//!     tiledefs --config engine.json --list

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tiledefs_core::{DefinitionCache, DefsError, EngineConfig, Locale};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tiledefs")]
#[command(about = "Resolve layout definitions with inheritance, locale fallback and patterns")]
#[command(version)]
struct Args {
    /// Definition to resolve
    name: Option<String>,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Definition file; may be repeated, later files override earlier ones
    #[arg(short, long = "source")]
    sources: Vec<PathBuf>,

    /// Locale to resolve for (e.g. en_US); root when omitted
    #[arg(short, long, default_value = "")]
    locale: String,

    /// Print every definition of the locale
    #[arg(long)]
    list: bool,

    /// Check sources for changes before every lookup
    #[arg(long)]
    refresh: bool,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "tiledefs_core=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode, DefsError> {
    let config = load_config(&args)?;
    let locale: Locale = args.locale.parse()?;
    let cache = DefinitionCache::from_config(&config)?;

    if args.list {
        let definitions = cache.resolve_key(&locale)?;
        let listing: Vec<_> = definitions.values().map(|d| &**d).collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        if args.verbose {
            eprintln!("Total: {} definitions for locale '{}'", listing.len(), locale);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let Some(name) = args.name else {
        eprintln!("Nothing to do: pass a definition name or --list");
        return Ok(ExitCode::from(2));
    };

    match cache.lookup(&name, &locale)? {
        Some(definition) => {
            println!("{}", serde_json::to_string_pretty(&*definition)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("Definition '{}' not found for locale '{}'", name, locale);
            Ok(ExitCode::from(3))
        }
    }
}

fn load_config(args: &Args) -> Result<EngineConfig, DefsError> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading engine config");
            EngineConfig::from_file(path)?
        }
        None => EngineConfig::default(),
    };

    for source in &args.sources {
        config = config.with_source(source.clone());
    }
    if args.refresh {
        config = config.with_refresh(true);
    }

    if config.sources.is_empty() {
        return Err(DefsError::InvalidConfig {
            reason: "no definition sources; pass --source or --config".to_string(),
        });
    }
    Ok(config)
}
