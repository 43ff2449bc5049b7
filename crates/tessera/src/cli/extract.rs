//! `tessera extract` command implementation.

use std::path::PathBuf;

use colored::Colorize;
use tessera::{ExtractorConfig, JobStatus, Tessera};

use super::display::{print_diagnostics, print_tree};
use crate::OutputFormat;

/// Run the extract command.
pub fn run(
    config: ExtractorConfig,
    paths: &[PathBuf],
    lang: Option<&str>,
    format: OutputFormat,
) -> Result<(), tessera::Error> {
    let tessera = Tessera::new(config)?;
    let outcome = super::run_batch(&tessera, paths, lang)?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&outcome.to_record())?);
        return Ok(());
    }

    for result in &outcome.results {
        print_tree(&result.symbol_table);
        if !result.diagnostics.is_empty() {
            print_diagnostics(&result.diagnostics);
        }
        println!();
    }

    let symbols: usize = outcome
        .results
        .iter()
        .map(|result| result.symbol_table.symbol_count())
        .sum();
    let status = match outcome.status {
        JobStatus::Completed => outcome.status.to_string().green().bold(),
        JobStatus::CompletedWithErrors => outcome.status.to_string().yellow().bold(),
        JobStatus::Cancelled => outcome.status.to_string().red().bold(),
    };
    println!(
        "{} {} files, {} symbols",
        status,
        outcome.results.len(),
        symbols
    );
    if !outcome.diagnostics.is_empty() {
        println!("{}:", "Job diagnostics".dimmed());
        print_diagnostics(&outcome.diagnostics);
    }

    Ok(())
}
