//! Language-agnostic normalized syntax tree.
//!
//! Each language adapter collapses its parse tree into [`NormalizedNode`]s
//! over the closed [`NodeKind`] set. Downstream stages (the symbol table
//! builder) never look at language-specific productions.
//!
//! Construct-specific details travel in the node's metadata map under the
//! well-known keys in [`meta`].

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tree_sitter::Node;

use crate::diagnostics::{Diagnostic, DiagnosticsCollector, Recovered};
use crate::languages::tree_sitter_utils::{node_span, node_text};
use crate::types::{NodeKind, Span};

/// Well-known metadata keys.
pub mod meta {
    /// Cleaned documentation text
    pub const DOCSTRING: &str = "docstring";
    /// Declaration header with whitespace collapsed
    pub const SIGNATURE: &str = "signature";
    /// Declared return type
    pub const RETURN_TYPE: &str = "return_type";
    /// Declared type of a field or binding
    pub const TYPE: &str = "type";
    /// Visibility modifier as written (`pub`, `pub(crate)`, `public`)
    pub const VISIBILITY: &str = "visibility";
    /// Source construct a node was normalized from (`struct`, `impl`, `ERROR`)
    pub const CONSTRUCT: &str = "construct";
}

/// One node of the normalized tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedNode {
    /// Closed kind tag
    pub kind: NodeKind,
    /// Declared name; `None` for anonymous constructs and wrappers
    pub name: Option<String>,
    /// Exact span copied from the parse tree
    pub span: Span,
    /// Children in source order
    pub children: Vec<NormalizedNode>,
    /// Construct-specific details, see [`meta`]
    pub metadata: BTreeMap<String, String>,
}

impl NormalizedNode {
    /// Create a leaf node.
    pub fn new(kind: NodeKind, name: Option<String>, span: Span) -> Self {
        Self {
            kind,
            name,
            span,
            children: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create a named leaf node.
    pub fn named(kind: NodeKind, name: impl Into<String>, span: Span) -> Self {
        Self::new(kind, Some(name.into()), span)
    }

    /// Create an `Unknown` wrapper recording which construct it stands for.
    pub fn unknown(construct: &str, span: Span) -> Self {
        Self::new(NodeKind::Unknown, None, span).with_meta(meta::CONSTRUCT, construct)
    }

    /// Builder-style metadata setter.
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_meta(key, value);
        self
    }

    /// Builder-style children setter.
    #[must_use]
    pub fn with_children(mut self, children: Vec<NormalizedNode>) -> Self {
        self.children = children;
        self
    }

    /// Set a metadata entry, replacing any previous value.
    pub fn set_meta(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Set a metadata entry only when a value is present.
    pub fn set_meta_opt(&mut self, key: &str, value: Option<String>) {
        if let Some(value) = value {
            self.set_meta(key, value);
        }
    }

    /// Look up a metadata entry.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Total number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

/// Shared state for one normalization pass.
///
/// Gives adapters access to the source text, the cancellation token, and a
/// place to record diagnostics.
pub struct NormalizeContext<'a> {
    source: &'a str,
    cancel: &'a CancellationToken,
    diagnostics: DiagnosticsCollector,
}

impl<'a> NormalizeContext<'a> {
    /// Start a pass over `source`.
    #[must_use]
    pub fn new(source: &'a str, cancel: &'a CancellationToken) -> Self {
        Self {
            source,
            cancel,
            diagnostics: DiagnosticsCollector::new(),
        }
    }

    /// The text being normalized.
    #[must_use]
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Text of a node.
    #[must_use]
    pub fn text(&self, node: &Node<'_>) -> &'a str {
        node_text(node, self.source)
    }

    /// Text of a named field of a node, if present.
    #[must_use]
    pub fn field_text(&self, node: &Node<'_>, field: &str) -> Option<&'a str> {
        node.child_by_field_name(field).map(|child| self.text(&child))
    }

    /// Returns `true` once the pass should stop.
    ///
    /// Adapters check this between declarations; the caller discards the
    /// result of a cancelled pass.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Map a declaration-like node with no rule to `Unknown`, recording a
    /// `NormalizationGap` diagnostic.
    pub fn gap(&self, node: &Node<'_>) -> NormalizedNode {
        let span = node_span(node);
        tracing::trace!(node_kind = %node.kind(), %span, "No normalization rule");
        self.diagnostics
            .add(Diagnostic::normalization_gap(node.kind(), span));
        NormalizedNode::unknown(node.kind(), span)
    }

    /// Record an arbitrary diagnostic.
    pub fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.add(diagnostic);
    }

    /// Finish the pass.
    #[must_use]
    pub fn finish(self, root: NormalizedNode) -> Recovered<NormalizedNode> {
        self.diagnostics.finish(root)
    }
}

// ============================================================================
// Documentation cleaning
// ============================================================================

/// Normalize the indentation of a docstring body.
///
/// The first line is stripped; the common leading indentation of the
/// remaining lines is removed; leading and trailing blank lines are dropped.
#[must_use]
pub fn clean_docstring(raw: &str) -> String {
    let expanded = raw.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            cleaned.push(line.trim());
        } else {
            cleaned.push(line.get(indent..).unwrap_or("").trim_end());
        }
    }
    trim_blank_lines(&cleaned)
}

/// Strip the delimiters and leading `*` gutters from a `/** ... */` comment.
#[must_use]
pub fn clean_block_comment(raw: &str, opener: &str) -> String {
    let body = raw.strip_prefix(opener).unwrap_or(raw);
    let body = body.strip_suffix("*/").unwrap_or(body);
    let lines: Vec<&str> = body
        .lines()
        .map(|line| {
            let line = line.trim();
            match line.strip_prefix('*') {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).trim_end(),
                None => line,
            }
        })
        .collect();
    trim_blank_lines(&lines)
}

/// Join consecutive line-comment doc lines after stripping their marker.
#[must_use]
pub fn clean_line_docs<'s>(lines: impl IntoIterator<Item = &'s str>, marker: &str) -> String {
    let stripped: Vec<&str> = lines
        .into_iter()
        .map(|line| {
            let line = line.trim_end();
            let rest = line.strip_prefix(marker).unwrap_or(line);
            rest.strip_prefix(' ').unwrap_or(rest)
        })
        .collect();
    trim_blank_lines(&stripped)
}

pub(crate) fn trim_blank_lines(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}
