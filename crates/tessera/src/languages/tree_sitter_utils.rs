//! Shared tree-sitter utilities for language support modules.
//!
//! Provides common functions for extracting text and positions from tree-sitter nodes.
//! Used by all language-specific normalizers.

// Tree-sitter returns usize for positions, but we store u32 for compactness.
// This is safe for practical source files (no file has 4 billion lines).
#![allow(clippy::cast_possible_truncation)]

use tree_sitter::Node;

use crate::types::Span;

/// Get text content of a tree-sitter node.
///
/// Returns an empty string if the node's byte range does not fall on
/// character boundaries of `source`.
#[must_use]
pub fn node_text<'s>(node: &Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_else(|| {
        tracing::trace!(
            byte_range = ?node.byte_range(),
            node_kind = %node.kind(),
            "Node range is not on a character boundary"
        );
        ""
    })
}

/// Source text from the start of `node` up to (not including) byte `end`.
///
/// Used for signatures: everything in a declaration before its body.
#[must_use]
pub fn text_until<'s>(node: &Node<'_>, end: usize, source: &'s str) -> &'s str {
    let start = node.start_byte();
    source.get(start..end.max(start)).unwrap_or_default()
}

/// Convert tree-sitter positions to our Span type.
///
/// Tree-sitter uses 0-indexed positions; Span uses 1-indexed.
/// Falls back to an empty span at the start position if the node produces
/// invalid positions.
#[must_use]
pub fn node_span(node: &Node<'_>) -> Span {
    let start_line = node.start_position().row as u32 + 1;
    let start_col = node.start_position().column as u32 + 1;
    let end_line = node.end_position().row as u32 + 1;
    let end_col = node.end_position().column as u32 + 1;

    Span::new(start_line, start_col, end_line, end_col).unwrap_or_else(|| {
        tracing::warn!(
            start_line,
            start_col,
            end_line,
            end_col,
            node_kind = %node.kind(),
            "Tree-sitter produced invalid span, using fallback"
        );
        Span {
            start_line,
            start_col,
            end_line: start_line,
            end_col: start_col,
        }
    })
}

/// Span covering the whole of `source`, from 1:1 to just past the last byte.
#[must_use]
pub fn source_extent(source: &str) -> Span {
    let newlines = source.bytes().filter(|&b| b == b'\n').count();
    let last_line_len = source.rfind('\n').map_or(source.len(), |i| source.len() - i - 1);
    Span {
        start_line: 1,
        start_col: 1,
        end_line: newlines as u32 + 1,
        end_col: last_line_len as u32 + 1,
    }
}

/// All children of a node, named and anonymous, in source order.
#[must_use]
pub fn children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Named children of a node in source order.
#[must_use]
pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Collapse runs of whitespace (including newlines) to single spaces.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First line of a node's text, shortened for use in messages.
#[must_use]
pub fn snippet(node: &Node<'_>, source: &str) -> String {
    const MAX_CHARS: usize = 40;
    let line = node_text(node, source).lines().next().unwrap_or_default().trim();
    if line.chars().count() > MAX_CHARS {
        let cut: String = line.chars().take(MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_extent_counts_trailing_newline_as_new_line() {
        let span = source_extent("a = 1\nb = 2\n");
        assert_eq!(span.end(), (3, 1));
        let span = source_extent("a = 1\nbb");
        assert_eq!(span.end(), (2, 3));
    }

    #[test]
    fn collapse_whitespace_joins_lines() {
        assert_eq!(
            collapse_whitespace("def f(\n    a,\n    b,\n)"),
            "def f( a, b, )"
        );
    }

    #[test]
    fn node_span_is_one_indexed() {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("load python grammar");
        let source = "x = 1\n\ndef f():\n    pass\n";
        let tree = parser.parse(source, None).expect("parse");
        let function = tree
            .root_node()
            .named_child(1)
            .expect("function definition");
        assert_eq!(function.kind(), "function_definition");
        let span = node_span(&function);
        assert_eq!(span.start(), (3, 1));
        assert_eq!(span.end(), (4, 9));
        assert_eq!(snippet(&function, source), "def f():");
    }
}
