//! The per-file extraction pipeline.
//!
//! ```text
//! ExtractionInput ─► decode ─► classify ─► parse ─► normalize ─► build
//!                                                                 │
//!                         ExtractionOutput { symbol_table, diagnostics }
//! ```
//!
//! Every stage returns a best-effort value and its diagnostics; nothing here
//! is fatal. The cancellation token is checked between stages, and a
//! cancelled pipeline produces no output at all.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::builder;
use crate::classify::Classifier;
use crate::config::ExtractorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsCollector};
use crate::index::content_hash;
use crate::parser::ParseOptions;
use crate::registry::AdapterRegistry;
use crate::symbols::{SymbolTable, TableRecord};
use crate::types::Language;

/// Number of leading bytes the classifier may look at.
const CLASSIFY_PREFIX_BYTES: usize = 256;

/// Raw content of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceContent {
    /// Already-decoded text
    Text(String),
    /// Raw bytes, expected to be UTF-8
    Bytes(Vec<u8>),
    /// The content could not be obtained; carries the reason
    Unavailable(String),
}

/// One source to extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionInput {
    /// Path or logical name, unique within a batch
    pub id: String,
    /// Explicit language, overriding extension and shebang detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_hint: Option<String>,
    /// The content to extract from
    pub content: SourceContent,
}

impl ExtractionInput {
    /// Input from decoded text.
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_content(id, SourceContent::Text(text.into()))
    }

    /// Input from raw bytes.
    pub fn bytes(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_content(id, SourceContent::Bytes(bytes.into()))
    }

    /// Input whose content could not be obtained.
    pub fn unavailable(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_content(id, SourceContent::Unavailable(reason.into()))
    }

    /// Read a file. Read failures become [`SourceContent::Unavailable`].
    pub fn read(path: &Path) -> Self {
        let id = path.display().to_string();
        match std::fs::read(path) {
            Ok(bytes) => Self::bytes(id, bytes),
            Err(e) => Self::unavailable(id, e.to_string()),
        }
    }

    fn with_content(id: impl Into<String>, content: SourceContent) -> Self {
        Self {
            id: id.into(),
            language_hint: None,
            content,
        }
    }

    /// Attach a language hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.language_hint = Some(hint.into());
        self
    }

    /// The content as text, without a leading byte-order mark.
    fn decode(&self) -> Result<&str, Diagnostic> {
        let text = match &self.content {
            SourceContent::Text(text) => text.as_str(),
            SourceContent::Bytes(bytes) => std::str::from_utf8(bytes)
                .map_err(|e| Diagnostic::io_error(&self.id, format!("invalid UTF-8: {e}")))?,
            SourceContent::Unavailable(reason) => {
                return Err(Diagnostic::io_error(&self.id, reason));
            }
        };
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
    }
}

/// A decoded, classified source ready for parsing.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Path or logical name
    pub id: String,
    /// Classified language
    pub language: Language,
    /// Decoded text
    pub text: Arc<str>,
    /// `xxh3` hash of `text`
    pub content_hash: u64,
}

/// Result of extracting one source.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    /// The extracted table; holds only the root when nothing was salvaged
    pub symbol_table: Arc<SymbolTable>,
    /// Problems encountered, in pipeline order
    pub diagnostics: Vec<Diagnostic>,
}

impl ExtractionOutput {
    pub(crate) fn empty(id: &str, language: Language, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            symbol_table: Arc::new(SymbolTable::empty(id, language, 0)),
            diagnostics,
        }
    }

    /// Returns `true` if any diagnostic has error severity.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Number of diagnostics of one kind.
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    /// Serializable form.
    #[must_use]
    pub fn to_record(&self) -> OutputRecord {
        OutputRecord {
            symbol_table: self.symbol_table.to_record(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Stable serialized form of an [`ExtractionOutput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    /// The table record
    pub symbol_table: TableRecord,
    /// Diagnostics in pipeline order
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the per-file pipeline against one registry snapshot.
#[derive(Debug, Clone)]
pub struct Extractor {
    registry: Arc<AdapterRegistry>,
    classifier: Classifier,
    parse_timeout: Duration,
}

impl Extractor {
    /// Bind a registry and configuration.
    #[must_use]
    pub fn new(registry: Arc<AdapterRegistry>, config: &ExtractorConfig) -> Self {
        let classifier = Classifier::new(&registry, &config.supported_languages);
        Self {
            registry,
            classifier,
            parse_timeout: config.per_file_timeout(),
        }
    }

    /// The registry this extractor dispatches to.
    #[must_use]
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Classify an input without extracting it.
    #[must_use]
    pub fn classify(&self, input: &ExtractionInput) -> Language {
        let head = input.decode().ok().map(prefix);
        self.classifier
            .classify(&input.id, input.language_hint.as_deref(), head)
    }

    /// Extract one source to completion.
    #[must_use]
    pub fn extract(&self, input: &ExtractionInput) -> ExtractionOutput {
        let cancel = CancellationToken::new();
        self.extract_cancellable(input, &cancel).unwrap_or_else(|| {
            ExtractionOutput::empty(
                &input.id,
                Language::Unknown,
                vec![Diagnostic::cancelled(&input.id)],
            )
        })
    }

    /// Extract one source, giving up when `cancel` fires.
    ///
    /// Returns `None` if the pipeline was cancelled; any partial result is
    /// discarded.
    #[must_use]
    pub fn extract_cancellable(
        &self,
        input: &ExtractionInput,
        cancel: &CancellationToken,
    ) -> Option<ExtractionOutput> {
        let started = Instant::now();
        let decoded = input.decode();
        let language = self.classifier.classify(
            &input.id,
            input.language_hint.as_deref(),
            decoded.as_ref().ok().map(|text| prefix(text)),
        );

        let text = match decoded {
            Ok(text) => text,
            Err(diagnostic) => {
                tracing::warn!(source = %input.id, "Content unavailable");
                return Some(ExtractionOutput::empty(&input.id, language, vec![diagnostic]));
            }
        };

        let Some(adapter) = self.registry.get(language) else {
            let detail = Classifier::explain_unknown(&input.id, input.language_hint.as_deref());
            tracing::debug!(source = %input.id, %detail, "Unsupported language");
            return Some(ExtractionOutput::empty(
                &input.id,
                language,
                vec![Diagnostic::unsupported_language(&input.id, &detail)],
            ));
        };

        let unit = SourceUnit {
            id: input.id.clone(),
            language,
            text: Arc::from(text),
            content_hash: content_hash(text),
        };
        if unit.text.is_empty() {
            let table = SymbolTable::empty(&unit.id, language, unit.content_hash);
            return Some(ExtractionOutput {
                symbol_table: Arc::new(table),
                diagnostics: Vec::new(),
            });
        }

        let diagnostics = DiagnosticsCollector::new();
        let options = ParseOptions {
            cancel: cancel.clone(),
            timeout: Some(self.parse_timeout),
        };
        let tree = diagnostics.absorb(adapter.parse(Arc::clone(&unit.text), &options));
        if cancel.is_cancelled() {
            return None;
        }
        let Some(tree) = tree else {
            if diagnostics.is_empty() {
                tracing::warn!(source = %unit.id, "Parser exceeded its time budget");
                diagnostics.add(Diagnostic::timeout(&unit.id, self.parse_timeout));
            }
            return Some(ExtractionOutput::empty(&unit.id, language, diagnostics.take()));
        };

        let root = diagnostics.absorb(adapter.normalize(&tree, cancel));
        if cancel.is_cancelled() {
            return None;
        }
        drop(tree);

        let table = diagnostics.absorb(builder::build(
            root,
            &unit.id,
            language,
            unit.content_hash,
        ));
        if cancel.is_cancelled() {
            return None;
        }

        tracing::debug!(
            source = %unit.id,
            %language,
            symbols = table.symbol_count(),
            diagnostics = diagnostics.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Extracted"
        );
        Some(ExtractionOutput {
            symbol_table: Arc::new(table),
            diagnostics: diagnostics.take(),
        })
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(AdapterRegistry::global(), &ExtractorConfig::default())
    }
}

/// Leading text handed to the classifier, cut on a character boundary.
fn prefix(text: &str) -> &str {
    let mut end = text.len().min(CLASSIFY_PREFIX_BYTES);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolKind;

    fn extractor() -> Extractor {
        Extractor::new(
            Arc::new(AdapterRegistry::with_builtin()),
            &ExtractorConfig::default(),
        )
    }

    #[test]
    fn empty_content_yields_empty_table_without_diagnostics() {
        let output = extractor().extract(&ExtractionInput::text("empty.py", ""));
        assert!(output.symbol_table.is_empty());
        assert!(output.diagnostics.is_empty());
        assert_eq!(output.symbol_table.language(), Language::Python);
    }

    #[test]
    fn unsupported_hint_yields_one_diagnostic() {
        let input = ExtractionInput::text("main.py", "def f(): pass\n").with_hint("cobol");
        let output = extractor().extract(&input);
        assert!(output.symbol_table.is_empty());
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.count(DiagnosticKind::UnsupportedLanguage), 1);
        assert!(output.diagnostics[0].message.contains("cobol"));
    }

    #[test]
    fn bytes_are_decoded_and_bom_is_ignored() {
        let mut bytes = "\u{feff}".as_bytes().to_vec();
        bytes.extend_from_slice(b"def run():\n    pass\n");
        let output = extractor().extract(&ExtractionInput::bytes("tool.py", bytes));
        assert!(output.diagnostics.is_empty());
        let run = output.symbol_table.lookup("run").expect("run");
        assert_eq!(run.kind, SymbolKind::Function);
        assert_eq!(run.span.start(), (1, 1));
        assert_eq!(
            output.symbol_table.content_hash(),
            content_hash("def run():\n    pass\n")
        );
    }

    #[test]
    fn invalid_utf8_and_unavailable_content_are_io_errors() {
        let extractor = extractor();
        let invalid = extractor.extract(&ExtractionInput::bytes("bad.py", vec![0x66, 0xff, 0xfe]));
        assert_eq!(invalid.count(DiagnosticKind::IoError), 1);
        assert!(invalid.symbol_table.is_empty());

        let missing = extractor.extract(&ExtractionInput::unavailable("gone.rs", "not found"));
        assert_eq!(missing.diagnostics.len(), 1);
        assert!(missing.diagnostics[0].message.contains("not found"));
        assert_eq!(missing.symbol_table.language(), Language::Rust);
    }

    #[test]
    fn shebang_classifies_extensionless_scripts() {
        let input = ExtractionInput::text("bin/deploy", "#!/usr/bin/env python3\nVERSION = 1\n");
        let output = extractor().extract(&input);
        assert_eq!(output.symbol_table.language(), Language::Python);
        assert!(output.symbol_table.lookup("VERSION").is_some());
    }

    #[test]
    fn cancelled_pipeline_produces_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let input = ExtractionInput::text("a.rs", "fn main() {}\n");
        assert!(extractor().extract_cancellable(&input, &cancel).is_none());
    }

    #[test]
    fn disabled_language_is_unsupported() {
        let extractor = Extractor::new(
            Arc::new(AdapterRegistry::with_builtin()),
            &ExtractorConfig::default().with_languages([Language::Java]),
        );
        let input = ExtractionInput::text("lib.rs", "fn main() {}\n");
        assert_eq!(extractor.classify(&input), Language::Unknown);
        let output = extractor.extract(&input);
        assert_eq!(output.count(DiagnosticKind::UnsupportedLanguage), 1);
        assert!(output.diagnostics[0].message.contains("extension '.rs'"));
    }

    #[test]
    fn prefix_respects_char_boundaries() {
        let text = "é".repeat(200);
        let cut = prefix(&text);
        assert!(cut.len() <= CLASSIFY_PREFIX_BYTES);
        assert!(text.starts_with(cut));
    }
}
