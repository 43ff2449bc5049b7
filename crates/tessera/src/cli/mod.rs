//! CLI command implementations.

mod display;

pub mod extract;
pub mod languages;
pub mod query;

use std::path::{Path, PathBuf};

use tessera::config::CONFIG_FILE_NAME;
use tessera::{BatchOutcome, ExtractionInput, ExtractorConfig, Language, Tessera};
use tracing::warn;

/// Directory names never descended into.
const EXCLUDED_DIRS: &[&str] = &["target", "node_modules", "__pycache__", "build", "venv"];

/// Load the configuration named on the command line, falling back to
/// `./tessera.yaml` and then to the defaults.
pub fn load_config(path: Option<&Path>) -> Result<ExtractorConfig, tessera::Error> {
    if let Some(path) = path {
        return ExtractorConfig::load(path);
    }
    let local = Path::new(CONFIG_FILE_NAME);
    if local.is_file() {
        return ExtractorConfig::load(local);
    }
    Ok(ExtractorConfig::default())
}

/// Expand directories into the source files below them.
///
/// Files named explicitly are kept whatever their extension, so the
/// extractor can report them. Files found by walking must have a known
/// extension. Hidden and build directories are skipped.
pub fn collect_sources(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        let mut pending = vec![path.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(directory = %dir.display(), error = %e, "Cannot read directory, skipping");
                    continue;
                }
            };
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(directory = %dir.display(), error = %e, "Failed to read directory entry, skipping");
                        continue;
                    }
                };
                let path = entry.path();
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_ref()) {
                    continue;
                }
                if path.is_dir() {
                    pending.push(path);
                } else if path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(Language::from_extension)
                    .is_some()
                {
                    found.push(path);
                }
            }
        }
        found.sort();
        files.extend(found);
    }
    files
}

/// Read every source under `paths` and run one batch over them.
pub fn run_batch(
    tessera: &Tessera,
    paths: &[PathBuf],
    lang: Option<&str>,
) -> Result<BatchOutcome, tessera::Error> {
    let inputs: Vec<_> = collect_sources(paths)
        .iter()
        .map(|path| {
            let input = ExtractionInput::read(path);
            match lang {
                Some(lang) => input.with_hint(lang),
                None => input,
            }
        })
        .collect();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(tessera.run(inputs))
}
