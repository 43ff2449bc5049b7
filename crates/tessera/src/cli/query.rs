//! `tessera query` command implementation.

use std::path::PathBuf;

use colored::Colorize;
use tessera::{ExtractorConfig, Query, SymbolHit, SymbolKind, Tessera};

use super::display::symbol_line;

/// Which lookup to run; exactly one field is set.
pub struct QueryArgs {
    /// Exact symbol name
    pub name: Option<String>,
    /// Symbol kind
    pub kind: Option<String>,
    /// Position as `(line, col)`
    pub at: Option<(u32, u32)>,
}

/// Parse a `LINE:COL` argument.
pub fn parse_position(value: &str) -> Result<(u32, u32), String> {
    let (line, col) = value
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:COL, got '{value}'"))?;
    let line = line
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid line '{line}': {e}"))?;
    let col = col
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid column '{col}': {e}"))?;
    if line == 0 || col == 0 {
        return Err("line and column are 1-based".to_string());
    }
    Ok((line, col))
}

/// Run the query command.
pub fn run(
    config: ExtractorConfig,
    paths: &[PathBuf],
    lang: Option<&str>,
    args: QueryArgs,
) -> Result<(), tessera::Error> {
    let tessera = Tessera::new(config)?;
    let outcome = super::run_batch(&tessera, paths, lang)?;
    let failed = outcome.results.iter().filter(|r| r.has_errors()).count();
    if failed > 0 {
        tracing::info!(failed, "Some files produced errors; run `tessera extract` for details");
    }

    let (description, hits) = if let Some(name) = args.name {
        let hits = tessera.query(&Query::ByName(name.clone()));
        (format!("named \"{}\"", name.cyan()), hits)
    } else if let Some(kind) = args.kind {
        let kind: SymbolKind = kind.parse().map_err(tessera::Error::config)?;
        (
            format!("of kind {}", kind.to_string().cyan()),
            tessera.query(&Query::ByKind(kind)),
        )
    } else if let Some((line, col)) = args.at {
        let hits = tessera
            .index()
            .source_ids()
            .iter()
            .filter_map(|id| tessera.index().symbol_at(id, line, col))
            .collect();
        (format!("at {}", format!("{line}:{col}").cyan()), hits)
    } else {
        return Err(tessera::Error::config(
            "one of --name, --kind or --at is required",
        ));
    };

    print_hits(&description, &hits);
    Ok(())
}

fn print_hits(description: &str, hits: &[SymbolHit]) {
    if hits.is_empty() {
        println!("No symbols found {description}");
        return;
    }

    println!(
        "Found {} symbols {}:",
        hits.len().to_string().green().bold(),
        description
    );
    println!();
    for hit in hits {
        let symbol = hit.symbol();
        println!(
            "  {} {}",
            symbol_line(symbol),
            format!("in {}", hit.source_id()).dimmed()
        );
        println!("    {}", symbol.qualified_path.dimmed());
        if let Some(signature) = &symbol.signature {
            println!("    {}", signature.dimmed());
        }
    }
}
