//! `tessera languages` command implementation.

use colored::Colorize;
use tessera::{AdapterRegistry, ExtractorConfig};

/// Run the languages command.
pub fn run(config: &ExtractorConfig) {
    let registry = AdapterRegistry::global();

    println!("{}:", "Languages".bold());
    for adapter in registry.adapters() {
        let language = adapter.language();
        let extensions = adapter
            .extensions()
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(", ");
        let status = if config.supported_languages.contains(&language) {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        println!(
            "  {} {} {}",
            language.to_string().white().bold(),
            format!("({extensions})").dimmed(),
            status
        );
    }

    println!();
    println!(
        "{}: {}  {}: {}ms",
        "Max concurrency".dimmed(),
        config.max_concurrency,
        "Per-file timeout".dimmed(),
        config.per_file_timeout_ms
    );
}
