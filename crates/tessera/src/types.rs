//! Domain types shared by every extraction stage.
//!
//! - **Tags**: `Language`, `SymbolKind`, `NodeKind`
//! - **Positions**: `Span`
//! - **Handles**: `SymbolId` (arena index into a `SymbolTable`)
//!
//! ## Design Decisions
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Language | Closed enum with `Unknown` | Unsupported input is a value, not an error |
//! | Span columns | Byte offsets, 1-based | Matches tree-sitter points without re-scanning text |
//! | Span end | Exclusive | Siblings can touch without overlapping |
//! | NodeKind vs SymbolKind | Separate enums | Decorators and Unknown never become symbols |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Strongly-typed ID wrappers
// ============================================================================

/// Handle to a symbol inside one `SymbolTable` arena.
///
/// Only meaningful together with the table that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub usize);

impl SymbolId {
    /// The root module symbol of every table.
    pub const ROOT: SymbolId = SymbolId(0);

    /// Extract the raw arena index.
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl From<usize> for SymbolId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Languages the extractor knows about.
///
/// `Unknown` is what the classifier returns for anything it cannot map to a
/// registered, enabled adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python source files (`.py`, `.pyi`)
    Python,
    /// Rust source files (`.rs`)
    Rust,
    /// Java source files (`.java`)
    Java,
    /// Anything unrecognized or disabled
    Unknown,
}

impl Language {
    /// Every language with a built-in adapter.
    pub const SUPPORTED: [Language; 3] = [Self::Python, Self::Rust, Self::Java];

    /// File extensions handled by this language.
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py", "pyi"],
            Self::Rust => &["rs"],
            Self::Java => &["java"],
            Self::Unknown => &[],
        }
    }

    /// Detect language from file extension.
    ///
    /// # Returns
    ///
    /// `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// Detect language from an explicit hint such as `"python"` or `"rs"`.
    ///
    /// Hints are matched case-insensitively against language names and
    /// extensions.
    #[must_use]
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_lowercase().as_str() {
            "python" | "python3" | "py" | "pyi" => Some(Self::Python),
            "rust" | "rs" => Some(Self::Rust),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// Detect language from a `#!` interpreter line.
    ///
    /// Understands both direct interpreter paths (`#!/usr/bin/python3`) and
    /// `env` indirection (`#!/usr/bin/env -S python3 -u`).
    #[must_use]
    pub fn from_shebang(line: &str) -> Option<Self> {
        let rest = line.strip_prefix("#!")?;
        let mut words = rest.split_whitespace();
        let mut program = words.next()?;
        if program.rsplit('/').next() == Some("env") {
            program = words.find(|word| !word.starts_with('-'))?;
        }
        let name = program.rsplit('/').next()?;
        if name.starts_with("python") {
            Some(Self::Python)
        } else if name == "rust-script" {
            Some(Self::Rust)
        } else if name == "java" {
            Some(Self::Java)
        } else {
            None
        }
    }

    /// Lowercase name used in serialized output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Java => "java",
            Self::Unknown => "unknown",
        }
    }

    /// Returns `false` only for `Unknown`.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbol kinds emitted into a `SymbolTable`.
///
/// These are normalized across languages: a Rust `impl` block and a Java
/// interface are both `Class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// File root or nested module (`mod` in Rust)
    Module,
    /// Free function
    Function,
    /// Class-like type: class, struct, enum, trait, interface, impl block
    Class,
    /// Function declared in a class-like body
    Method,
    /// Field, class-level assignment, enum variant or associated constant
    Attribute,
    /// Module-level binding
    Variable,
}

impl SymbolKind {
    /// All symbol kinds, in declaration order.
    pub const ALL: [SymbolKind; 6] = [
        Self::Module,
        Self::Function,
        Self::Class,
        Self::Method,
        Self::Attribute,
        Self::Variable,
    ];

    /// Lowercase name used in serialized output and placeholders.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Attribute => "attribute",
            Self::Variable => "variable",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown symbol kind '{s}' (expected one of: {})",
                    Self::ALL.map(|k| k.as_str()).join(", ")
                )
            })
    }
}

/// Kinds of node in the language-agnostic normalized tree.
///
/// A superset of [`SymbolKind`]: `Decorator` nodes become metadata of their
/// parent and `Unknown` nodes are transparent containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// See [`SymbolKind::Module`]
    Module,
    /// See [`SymbolKind::Function`]
    Function,
    /// See [`SymbolKind::Class`]
    Class,
    /// See [`SymbolKind::Method`]
    Method,
    /// See [`SymbolKind::Attribute`]
    Attribute,
    /// See [`SymbolKind::Variable`]
    Variable,
    /// Decorator, attribute macro or annotation attached to its parent
    Decorator,
    /// Construct with no symbol of its own (control flow, error regions)
    Unknown,
}

impl NodeKind {
    /// The symbol kind this node produces, if any.
    #[must_use]
    pub fn symbol_kind(self) -> Option<SymbolKind> {
        match self {
            Self::Module => Some(SymbolKind::Module),
            Self::Function => Some(SymbolKind::Function),
            Self::Class => Some(SymbolKind::Class),
            Self::Method => Some(SymbolKind::Method),
            Self::Attribute => Some(SymbolKind::Attribute),
            Self::Variable => Some(SymbolKind::Variable),
            Self::Decorator | Self::Unknown => None,
        }
    }
}

impl From<SymbolKind> for NodeKind {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Module => Self::Module,
            SymbolKind::Function => Self::Function,
            SymbolKind::Class => Self::Class,
            SymbolKind::Method => Self::Method,
            SymbolKind::Attribute => Self::Attribute,
            SymbolKind::Variable => Self::Variable,
        }
    }
}

// ============================================================================
// Positions
// ============================================================================

/// A start/end position span in a file.
///
/// Lines and columns are 1-indexed to match editor conventions. Columns are
/// byte offsets within the line. The end position is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Starting line (1-indexed)
    pub start_line: u32,
    /// Starting column (1-indexed)
    pub start_col: u32,
    /// Ending line (1-indexed, inclusive)
    pub end_line: u32,
    /// Ending column (1-indexed, exclusive)
    pub end_col: u32,
}

impl Span {
    /// Create a new span with validation.
    ///
    /// Returns `None` if the end position is before the start position.
    #[must_use]
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Option<Self> {
        if (end_line, end_col) < (start_line, start_col) {
            return None;
        }
        Some(Self {
            start_line,
            start_col,
            end_line,
            end_col,
        })
    }

    /// Start position as `(line, column)`.
    #[must_use]
    pub fn start(&self) -> (u32, u32) {
        (self.start_line, self.start_col)
    }

    /// End position as `(line, column)`.
    #[must_use]
    pub fn end(&self) -> (u32, u32) {
        (self.end_line, self.end_col)
    }

    /// Returns `true` if `other` lies entirely within this span.
    #[must_use]
    pub fn contains(&self, other: &Span) -> bool {
        self.start() <= other.start() && other.end() <= self.end()
    }

    /// Returns `true` if the position falls inside this span.
    #[must_use]
    pub fn contains_position(&self, line: u32, col: u32) -> bool {
        self.start() <= (line, col) && (line, col) < self.end()
    }

    /// Returns `true` if this span ends at or before `other` starts.
    #[must_use]
    pub fn precedes(&self, other: &Span) -> bool {
        self.end() <= other.start()
    }

    /// Returns `true` if the two spans share at least one position.
    #[must_use]
    pub fn overlaps(&self, other: &Span) -> bool {
        !self.precedes(other) && !other.precedes(self)
    }

    /// Smallest span covering both.
    #[must_use]
    pub fn cover(&self, other: &Span) -> Span {
        let (start_line, start_col) = self.start().min(other.start());
        let (end_line, end_col) = self.end().max(other.end());
        Span {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn span(a: u32, b: u32, c: u32, d: u32) -> Span {
        Span::new(a, b, c, d).expect("valid span")
    }

    #[test]
    fn span_rejects_end_before_start() {
        assert!(Span::new(3, 5, 3, 4).is_none());
        assert!(Span::new(3, 5, 2, 9).is_none());
        assert!(Span::new(3, 5, 3, 5).is_some());
    }

    #[test]
    fn containment_is_inclusive_of_edges() {
        let outer = span(1, 1, 10, 1);
        assert!(outer.contains(&outer));
        assert!(outer.contains(&span(2, 5, 9, 80)));
        assert!(!outer.contains(&span(9, 1, 10, 2)));
    }

    #[test]
    fn touching_spans_do_not_overlap() {
        let first = span(1, 1, 3, 10);
        let second = span(3, 10, 5, 1);
        assert!(first.precedes(&second));
        assert!(!first.overlaps(&second));
        assert!(first.overlaps(&span(3, 9, 3, 12)));
    }

    #[test]
    fn position_lookup_is_half_open() {
        let s = span(2, 1, 4, 6);
        assert!(s.contains_position(2, 1));
        assert!(s.contains_position(4, 5));
        assert!(!s.contains_position(4, 6));
        assert!(!s.contains_position(1, 99));
    }

    #[test]
    fn cover_spans_both_inputs() {
        let merged = span(3, 4, 5, 1).cover(&span(1, 2, 3, 9));
        assert_eq!(merged, span(1, 2, 5, 1));
    }

    #[test]
    fn span_serializes_with_stable_field_names() {
        let json = serde_json::to_string(&span(1, 2, 3, 4)).expect("serialize span");
        assert_eq!(json, r#"{"startLine":1,"startCol":2,"endLine":3,"endCol":4}"#);
    }

    #[rstest]
    #[case("py", Some(Language::Python))]
    #[case("PYI", Some(Language::Python))]
    #[case("rs", Some(Language::Rust))]
    #[case("java", Some(Language::Java))]
    #[case("kt", None)]
    #[case("", None)]
    fn language_from_extension(#[case] ext: &str, #[case] expected: Option<Language>) {
        assert_eq!(Language::from_extension(ext), expected);
    }

    #[rstest]
    #[case("#!/usr/bin/python3", Some(Language::Python))]
    #[case("#!/usr/bin/env python", Some(Language::Python))]
    #[case("#!/usr/bin/env -S python3.12 -u", Some(Language::Python))]
    #[case("#!/usr/bin/env rust-script", Some(Language::Rust))]
    #[case("#!/bin/sh", None)]
    #[case("import os", None)]
    fn language_from_shebang(#[case] line: &str, #[case] expected: Option<Language>) {
        assert_eq!(Language::from_shebang(line), expected);
    }

    #[test]
    fn symbol_kind_parses_case_insensitively() {
        assert_eq!("Method".parse::<SymbolKind>(), Ok(SymbolKind::Method));
        assert!("struct".parse::<SymbolKind>().is_err());
    }

    #[test]
    fn decorators_and_unknown_are_not_symbols() {
        assert_eq!(NodeKind::Decorator.symbol_kind(), None);
        assert_eq!(NodeKind::Unknown.symbol_kind(), None);
        for kind in SymbolKind::ALL {
            assert_eq!(NodeKind::from(kind).symbol_kind(), Some(kind));
        }
    }
}
