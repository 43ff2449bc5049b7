//! Extractor configuration.
//!
//! Recognized options, all optional in a YAML file:
//!
//! ```yaml
//! maxConcurrency: 8
//! perFileTimeoutMs: 5000
//! supportedLanguages: [python, rust]
//! ```

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Language;

/// Default per-file time budget.
pub const DEFAULT_PER_FILE_TIMEOUT_MS: u64 = 5_000;

/// Name of the configuration file looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "tessera.yaml";

/// Options controlling extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Maximum number of files processed at once by a batch job
    pub max_concurrency: usize,
    /// Time budget for one file's pipeline, in milliseconds
    pub per_file_timeout_ms: u64,
    /// Languages the classifier may return; everything else is `unknown`
    pub supported_languages: BTreeSet<Language>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            per_file_timeout_ms: DEFAULT_PER_FILE_TIMEOUT_MS,
            supported_languages: Language::SUPPORTED.into_iter().collect(),
        }
    }
}

impl ExtractorConfig {
    /// Load and validate a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML for
    /// this schema, or fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        tracing::debug!(path = %path.display(), ?config, "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate YAML text. Empty text yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not match the schema or fails
    /// [`validate`](Self::validate).
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check option values.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for zero concurrency, a zero timeout, an
    /// empty language set, or a set naming `unknown`.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::config("maxConcurrency must be at least 1"));
        }
        if self.per_file_timeout_ms == 0 {
            return Err(Error::config("perFileTimeoutMs must be at least 1"));
        }
        if self.supported_languages.is_empty() {
            return Err(Error::config("supportedLanguages must not be empty"));
        }
        if self.supported_languages.contains(&Language::Unknown) {
            return Err(Error::config(
                "supportedLanguages cannot include 'unknown'",
            ));
        }
        Ok(())
    }

    /// The per-file budget as a `Duration`.
    #[must_use]
    pub fn per_file_timeout(&self) -> Duration {
        Duration::from_millis(self.per_file_timeout_ms)
    }

    /// Restrict the supported languages.
    #[must_use]
    pub fn with_languages(mut self, languages: impl IntoIterator<Item = Language>) -> Self {
        self.supported_languages = languages.into_iter().collect();
        self
    }

    /// Override the concurrency bound.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Override the per-file budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_file_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}
