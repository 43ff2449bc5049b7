//! Tessera CLI - Structural symbol extraction from the command line.
//!
//! Extracts nested symbol tables from Python, Rust and Java sources and
//! answers name, kind and position queries over them.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// Tessera: Multi-language structural symbol extraction.
#[derive(Parser)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ./tessera.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for extracted tables.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Indented symbol tree
    #[default]
    Tree,
    /// Serialized batch record
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract symbol tables from source files
    Extract {
        /// Files or directories to extract
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Language hint applied to every file (python, rust, java)
        #[arg(short, long)]
        lang: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Tree)]
        format: OutputFormat,
    },

    /// Query symbols across source files
    #[command(group(ArgGroup::new("query").required(true).args(["name", "kind", "at"])))]
    Query {
        /// Files or directories to index before querying
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Exact symbol name
        #[arg(short, long)]
        name: Option<String>,

        /// Symbol kind (module, function, class, method, attribute, variable)
        #[arg(short, long)]
        kind: Option<String>,

        /// Position as LINE:COL (1-based)
        #[arg(long, value_parser = cli::query::parse_position)]
        at: Option<(u32, u32)>,

        /// Language hint applied to every file
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// List supported languages and their extensions
    Languages,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Extract {
            paths,
            lang,
            format,
        } => cli::extract::run(config, &paths, lang.as_deref(), format),
        Commands::Query {
            paths,
            name,
            kind,
            at,
            lang,
        } => cli::query::run(
            config,
            &paths,
            lang.as_deref(),
            cli::query::QueryArgs { name, kind, at },
        ),
        Commands::Languages => {
            cli::languages::run(&config);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = std::error::Error::source(cause);
            }
            ExitCode::FAILURE
        }
    }
}
