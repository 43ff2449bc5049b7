//! Non-fatal diagnostics produced during extraction.
//!
//! Every stage of the pipeline is allowed to fail partially: a file with a
//! syntax error still yields the symbols that could be recovered. The
//! problems encountered along the way are reported as [`Diagnostic`] values
//! next to the salvaged result, wrapped together in a [`Recovered`].
//!
//! # Examples
//!
//! ```
//! use tessera::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsCollector};
//!
//! let collector = DiagnosticsCollector::new();
//! collector.add(Diagnostic::new(DiagnosticKind::SyntaxError, "unexpected `)`"));
//! collector.add(Diagnostic::new(DiagnosticKind::NormalizationGap, "no rule for `type_item`"));
//!
//! assert_eq!(collector.len(), 2);
//! assert!(collector.has_errors());
//! assert_eq!(collector.count(DiagnosticKind::SyntaxError), 1);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Span;

/// How much a diagnostic matters to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational: the result is complete but something was skipped or renamed
    Info,
    /// The result may be inaccurate
    Warning,
    /// Part or all of the result is missing
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Categories of diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    // === Input problems ===
    /// No adapter is registered or enabled for the file's language
    UnsupportedLanguage,
    /// The parser had to recover from invalid syntax
    SyntaxError,
    /// A declaration-like construct has no normalization rule
    NormalizationGap,
    /// Content could not be read or decoded
    IoError,

    // === Scheduling ===
    /// The file exceeded its time budget
    Timeout,
    /// The job was cancelled before the file finished
    Cancelled,
    /// The file's pipeline panicked and produced nothing
    ExtractionFailed,

    // === Table construction ===
    /// Two symbols resolved to the same qualified path
    DuplicatePath,
    /// A child span escapes its parent or overlaps a sibling
    SpanAnomaly,
}

impl DiagnosticKind {
    /// Severity implied by the kind.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::UnsupportedLanguage
            | Self::SyntaxError
            | Self::IoError
            | Self::Timeout
            | Self::Cancelled
            | Self::ExtractionFailed => Severity::Error,
            Self::SpanAnomaly => Severity::Warning,
            Self::NormalizationGap | Self::DuplicatePath => Severity::Info,
        }
    }

    /// Returns a static string identifying the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedLanguage => "unsupported_language",
            Self::SyntaxError => "syntax_error",
            Self::NormalizationGap => "normalization_gap",
            Self::IoError => "io_error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::ExtractionFailed => "extraction_failed",
            Self::DuplicatePath => "duplicate_path",
            Self::SpanAnomaly => "span_anomaly",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal problem found while extracting one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Category of the problem
    pub kind: DiagnosticKind,
    /// Derived from `kind`
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Location in the source, when one applies
    pub span: Option<Span>,
}

impl Diagnostic {
    /// Create a diagnostic with no location.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
            span: None,
        }
    }

    /// Attach a source location.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// No adapter handles the file.
    pub fn unsupported_language(source_id: &str, detail: &str) -> Self {
        Self::new(
            DiagnosticKind::UnsupportedLanguage,
            format!("no enabled language adapter for '{source_id}' ({detail})"),
        )
    }

    /// The parser recovered from invalid syntax at `span`.
    pub fn syntax_error(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::SyntaxError, message).with_span(span)
    }

    /// A declaration-like construct was mapped to `Unknown`.
    pub fn normalization_gap(construct: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::NormalizationGap,
            format!("no normalization rule for `{construct}`"),
        )
        .with_span(span)
    }

    /// Content could not be read or decoded.
    pub fn io_error(source_id: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            DiagnosticKind::IoError,
            format!("cannot read '{source_id}': {reason}"),
        )
    }

    /// The file exceeded its time budget.
    pub fn timeout(source_id: &str, budget: Duration) -> Self {
        Self::new(
            DiagnosticKind::Timeout,
            format!(
                "extraction of '{source_id}' exceeded {}ms",
                budget.as_millis()
            ),
        )
    }

    /// The job was cancelled before the file finished.
    pub fn cancelled(source_id: &str) -> Self {
        Self::new(
            DiagnosticKind::Cancelled,
            format!("extraction of '{source_id}' was cancelled"),
        )
    }

    /// The file's pipeline stopped abnormally, usually an adapter panic.
    pub fn extraction_failed(source_id: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            DiagnosticKind::ExtractionFailed,
            format!("extraction of '{source_id}' failed: {reason}"),
        )
    }

    /// A symbol was renamed to keep its path unique.
    pub fn duplicate_path(path: &str, renamed: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::DuplicatePath,
            format!("duplicate qualified path `{path}`, kept as `{renamed}`"),
        )
        .with_span(span)
    }

    /// A span violates containment or sibling ordering.
    pub fn span_anomaly(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::SpanAnomaly, message).with_span(span)
    }

    /// Returns `true` if the diagnostic means part of the result is missing.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(
                f,
                "{} [{}] at {}: {}",
                self.severity, self.kind, span, self.message
            ),
            None => write!(f, "{} [{}]: {}", self.severity, self.kind, self.message),
        }
    }
}

/// A best-effort value together with the diagnostics raised producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered<T> {
    /// The salvaged result
    pub value: T,
    /// Problems encountered, in the order they were found
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Recovered<T> {
    /// Pair a value with its diagnostics.
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    /// A value produced without any problems.
    pub fn clean(value: T) -> Self {
        Self::new(value, Vec::new())
    }

    /// Transform the value, keeping the diagnostics.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Recovered<U> {
        Recovered {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }

    /// Split into value and diagnostics.
    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}

/// A thread-safe collector for accumulating diagnostics.
///
/// Clones share the same underlying list, so a collector can be handed to
/// concurrent tasks and drained once they finish. A poisoned lock is
/// recovered rather than propagated: diagnostics are append-only and a
/// panicking writer cannot leave the list half-updated.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsCollector {
    diagnostics: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticsCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a diagnostic.
    pub fn add(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }

    /// Adds every diagnostic from an iterator, preserving order.
    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.lock().extend(diagnostics);
    }

    /// Records a partial result's diagnostics and returns its value.
    pub fn absorb<T>(&self, recovered: Recovered<T>) -> T {
        let (value, diagnostics) = recovered.into_parts();
        self.extend(diagnostics);
        value
    }

    /// Number of diagnostics collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of diagnostics of one kind.
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.lock().iter().filter(|d| d.kind == kind).count()
    }

    /// Returns `true` if any collected diagnostic has error severity.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.lock().iter().any(Diagnostic::is_error)
    }

    /// Copy of the diagnostics collected so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Takes the collected diagnostics, leaving the collector empty.
    #[must_use]
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Wraps a value with everything collected so far, draining the collector.
    pub fn finish<T>(&self, value: T) -> Recovered<T> {
        Recovered::new(value, self.take())
    }
}
