//! Tree-sitter parsing shared by every language adapter.
//!
//! Parsing never fails on bad input: tree-sitter recovers from syntax errors
//! by inserting `ERROR` and `MISSING` nodes. This module turns each distinct
//! recovery point into one `SyntaxError` diagnostic and hands the (possibly
//! damaged) tree on to normalization.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tree_sitter::{Node, Parser, Tree};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Recovered};
use crate::languages::tree_sitter_utils::{node_span, snippet};
use crate::types::Language;

/// Options for a single parse.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Checked before parsing starts and by adapters that do extra work
    pub cancel: CancellationToken,
    /// Upper bound on time spent inside tree-sitter
    pub timeout: Option<Duration>,
}

impl ParseOptions {
    /// Options bound to a cancellation token.
    #[must_use]
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            timeout: None,
        }
    }
}

/// A parsed source file.
///
/// Owns both the tree and the text it was parsed from, since tree-sitter
/// nodes only carry byte offsets.
pub struct ParseTree {
    tree: Tree,
    source: Arc<str>,
    language: Language,
}

impl ParseTree {
    /// Wrap an existing tree-sitter tree.
    #[must_use]
    pub fn new(tree: Tree, source: Arc<str>, language: Language) -> Self {
        Self {
            tree,
            source,
            language,
        }
    }

    /// Root node of the syntax tree.
    #[must_use]
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// The parsed text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Language the tree was parsed as.
    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    /// Returns `true` if the parser had to recover from a syntax error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }
}

impl std::fmt::Debug for ParseTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseTree")
            .field("language", &self.language)
            .field("bytes", &self.source.len())
            .field("has_errors", &self.has_errors())
            .finish_non_exhaustive()
    }
}

/// Parse `source` with a fresh tree-sitter parser.
///
/// Returns `None` when the token was already cancelled, the grammar could
/// not be loaded, or tree-sitter gave up because of the timeout.
pub fn parse_source(
    language: Language,
    grammar: &tree_sitter::Language,
    source: Arc<str>,
    options: &ParseOptions,
) -> Recovered<Option<ParseTree>> {
    if options.cancel.is_cancelled() {
        return Recovered::clean(None);
    }

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(grammar) {
        tracing::warn!(%language, error = %e, "Failed to load tree-sitter grammar");
        return Recovered::new(
            None,
            vec![Diagnostic::new(
                DiagnosticKind::UnsupportedLanguage,
                format!("{language} grammar could not be loaded: {e}"),
            )],
        );
    }
    if let Some(timeout) = options.timeout {
        parser.set_timeout_micros(u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX));
    }

    let Some(tree) = parser.parse(source.as_bytes(), None) else {
        tracing::debug!(%language, bytes = source.len(), "Parse aborted");
        return Recovered::clean(None);
    };

    let diagnostics = syntax_diagnostics(&tree.root_node(), &source);
    Recovered::new(Some(ParseTree::new(tree, source, language)), diagnostics)
}

/// One `SyntaxError` per distinct recovery point.
///
/// Only the top-most `ERROR`/`MISSING` node of each region is reported, and
/// regions starting on the same line as the previous one are merged into it.
#[must_use]
pub fn syntax_diagnostics(root: &Node<'_>, source: &str) -> Vec<Diagnostic> {
    let mut regions = Vec::new();
    collect_error_regions(root, &mut regions);

    let mut diagnostics: Vec<Diagnostic> = Vec::with_capacity(regions.len());
    let mut last_line = None;
    for node in regions {
        let span = node_span(&node);
        if last_line == Some(span.start_line) {
            continue;
        }
        last_line = Some(span.start_line);

        let message = if node.is_missing() {
            format!("missing `{}`", node.kind())
        } else {
            format!("unexpected `{}`", snippet(&node, source))
        };
        diagnostics.push(Diagnostic::syntax_error(span, message));
    }
    diagnostics
}

fn collect_error_regions<'t>(node: &Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.is_error() || node.is_missing() {
        out.push(*node);
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_regions(&child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_python(code: &str) -> Recovered<Option<ParseTree>> {
        parse_source(
            Language::Python,
            &tree_sitter_python::LANGUAGE.into(),
            Arc::from(code),
            &ParseOptions::default(),
        )
    }

    #[test]
    fn valid_source_has_no_diagnostics() {
        let parsed = parse_python("def f(x):\n    return x\n");
        let tree = parsed.value.expect("tree");
        assert!(!tree.has_errors());
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn invalid_source_still_yields_a_tree() {
        let parsed = parse_python("def f(:\n    pass\n");
        assert!(parsed.value.is_some_and(|tree| tree.has_errors()));
        assert!(!parsed.diagnostics.is_empty());
        assert!(
            parsed
                .diagnostics
                .iter()
                .all(|d| d.kind == DiagnosticKind::SyntaxError && d.span.is_some())
        );
    }

    #[test]
    fn separate_error_lines_are_reported_separately() {
        let parsed = parse_python("x = (1 +\n\ny = 2\n\ndef g(:\n    pass\n");
        assert!(!parsed.diagnostics.is_empty());
        let mut lines: Vec<u32> = parsed
            .diagnostics
            .iter()
            .filter_map(|d| d.span.map(|s| s.start_line))
            .collect();
        let before = lines.len();
        lines.dedup();
        assert_eq!(lines.len(), before, "regions on one line are merged");
    }

    #[test]
    fn cancelled_token_skips_parsing() {
        let options = ParseOptions::default();
        options.cancel.cancel();
        let parsed = parse_source(
            Language::Rust,
            &tree_sitter_rust::LANGUAGE.into(),
            Arc::from("fn main() {}"),
            &options,
        );
        assert!(parsed.value.is_none());
        assert!(parsed.diagnostics.is_empty());
    }
}
