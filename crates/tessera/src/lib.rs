//! # Tessera: Structural Symbol Extraction
//!
//! Tessera turns source files into nested symbol tables: every function,
//! class, method, attribute and module-level variable, with its qualified
//! path, exact source span, docstring, signature and decorators. Python, Rust
//! and Java are supported out of the box through tree-sitter grammars.
//!
//! ## Design Philosophy
//!
//! - **Structure, not semantics** - Declarations and nesting only; no type
//!   resolution across files
//! - **Best effort** - Broken input still yields what can be salvaged, with
//!   the problems reported as diagnostics
//! - **Language agnostic core** - Adapters collapse each grammar into one
//!   normalized tree; everything downstream is shared
//! - **Embeddable** - Library first, CLI second
//!
//! ## Pipeline
//!
//! ```text
//! classify ─► parse ─► normalize ─► build ─► ExtractionIndex
//!    │          │          │          │
//!    └──────────┴── diagnostics ──────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use tessera::{ExtractionInput, ExtractorConfig, SymbolKind, Tessera};
//!
//! let tessera = Tessera::new(ExtractorConfig::default())?;
//! let output = tessera.extract(&ExtractionInput::text(
//!     "greeter.py",
//!     "class Greeter:\n    def greet(self):\n        \"\"\"Say hi.\"\"\"\n",
//! ));
//!
//! let greet = output.symbol_table.lookup("Greeter.greet").expect("method");
//! assert_eq!(greet.kind, SymbolKind::Method);
//! assert_eq!(greet.docstring.as_deref(), Some("Say hi."));
//! assert!(output.diagnostics.is_empty());
//! # Ok::<(), tessera::Error>(())
//! ```

pub mod builder;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod index;
pub mod job;
pub mod languages;
pub mod normalize;
pub mod parser;
pub mod registry;
pub mod symbols;
pub mod types;

pub use config::ExtractorConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Recovered, Severity};
pub use error::{Error, Result};
pub use extract::{ExtractionInput, ExtractionOutput, Extractor, SourceContent};
pub use index::{ExtractionIndex, Query, SymbolHit};
pub use job::{BatchOutcome, ExtractionJob, JobStatus};
pub use registry::{AdapterRegistry, install_global};
pub use symbols::{Symbol, SymbolRecord, SymbolTable, TableRecord};
pub use types::{Language, Span, SymbolId, SymbolKind};

use std::sync::Arc;

/// Extraction entry point bundling an extractor and the index it feeds.
///
/// Single-file extraction is synchronous; batches run on the caller's tokio
/// runtime through [`Tessera::run`] or a job from [`Tessera::job`].
#[derive(Debug, Clone)]
pub struct Tessera {
    config: ExtractorConfig,
    extractor: Arc<Extractor>,
    index: Arc<ExtractionIndex>,
}

impl Tessera {
    /// Create an instance over the process-wide adapter registry.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` fails validation.
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        Self::with_registry(AdapterRegistry::global(), config)
    }

    /// Create an instance over a specific registry.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` fails validation.
    pub fn with_registry(registry: Arc<AdapterRegistry>, config: ExtractorConfig) -> Result<Self> {
        config.validate()?;
        let extractor = Arc::new(Extractor::new(registry, &config));
        Ok(Self {
            config,
            extractor,
            index: Arc::new(ExtractionIndex::new()),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// The shared index.
    #[must_use]
    pub fn index(&self) -> &Arc<ExtractionIndex> {
        &self.index
    }

    /// Extract one source without touching the index.
    #[must_use]
    pub fn extract(&self, input: &ExtractionInput) -> ExtractionOutput {
        self.extractor.extract(input)
    }

    /// Extract one source and index the result.
    ///
    /// A source whose parse ran out of time leaves any earlier table for
    /// the same id in place.
    pub fn extract_and_index(&self, input: &ExtractionInput) -> ExtractionOutput {
        let output = self.extractor.extract(input);
        if output.count(DiagnosticKind::Timeout) == 0 {
            self.index.insert(Arc::clone(&output.symbol_table));
        }
        output
    }

    /// A new batch job feeding this instance's index.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn job(&self) -> Result<ExtractionJob> {
        ExtractionJob::new(
            Arc::clone(&self.extractor),
            Arc::clone(&self.index),
            &self.config,
        )
    }

    /// Run one batch to completion.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid. Per-file
    /// failures are reported on the outcome.
    pub async fn run(
        &self,
        inputs: impl IntoIterator<Item = ExtractionInput>,
    ) -> Result<BatchOutcome> {
        Ok(self.job()?.run(inputs).await)
    }

    /// Query the index.
    #[must_use]
    pub fn query(&self, query: &Query) -> Vec<SymbolHit> {
        self.index.query(query)
    }
}
