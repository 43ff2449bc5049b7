//! Per-file symbol tables.
//!
//! A [`SymbolTable`] owns every [`Symbol`] of one source file in a single
//! arena. Symbols refer to each other through [`SymbolId`] handles, so the
//! parent/child structure carries no lifetimes and the table can be shared
//! across threads behind an `Arc`.
//!
//! Index `0` is always the root Module symbol. Its qualified path is the
//! empty string and it is never part of the serialized `symbols` list.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{Language, Span, SymbolId, SymbolKind};

/// One extracted symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Handle of this symbol in its table
    pub id: SymbolId,
    /// Normalized kind
    pub kind: SymbolKind,
    /// Declared name, or an `<anonymous-{kind}-{n}>` placeholder
    pub name: String,
    /// Dot-joined names from the root, root excluded
    pub qualified_path: String,
    /// Source span, including leading decorators
    pub span: Span,
    /// Cleaned documentation text
    pub docstring: Option<String>,
    /// Declaration header with whitespace collapsed
    pub signature: Option<String>,
    /// Decorators, attribute macros or annotations in source order
    pub decorators: Vec<String>,
    /// Remaining construct details (`return_type`, `visibility`, ...)
    pub metadata: BTreeMap<String, String>,
    /// Enclosing symbol; `None` only for the root
    pub parent: Option<SymbolId>,
    /// Nested symbols in source order
    pub children: Vec<SymbolId>,
}

impl Symbol {
    /// Look up a metadata entry.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Symbols extracted from one source, stored in an arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    source_id: String,
    language: Language,
    content_hash: u64,
    symbols: Vec<Symbol>,
    paths: HashMap<String, SymbolId>,
}

impl SymbolTable {
    /// A table holding only the root module.
    #[must_use]
    pub fn empty(source_id: &str, language: Language, content_hash: u64) -> Self {
        let span = Span {
            start_line: 1,
            start_col: 1,
            end_line: 1,
            end_col: 1,
        };
        Self::from_arena(
            source_id,
            language,
            content_hash,
            vec![root_symbol(source_id, span)],
        )
    }

    /// Assemble a table from a finished arena whose first entry is the root.
    pub(crate) fn from_arena(
        source_id: &str,
        language: Language,
        content_hash: u64,
        symbols: Vec<Symbol>,
    ) -> Self {
        let paths = symbols
            .iter()
            .skip(1)
            .map(|symbol| (symbol.qualified_path.clone(), symbol.id))
            .collect();
        Self {
            source_id: source_id.to_string(),
            language,
            content_hash,
            symbols,
            paths,
        }
    }

    /// Identifier of the source this table was extracted from.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Language the source was parsed as.
    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    /// `xxh3` hash of the decoded content.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    /// The root module symbol.
    #[must_use]
    pub fn root(&self) -> &Symbol {
        &self.symbols[SymbolId::ROOT.as_usize()]
    }

    /// Module-level documentation.
    #[must_use]
    pub fn docstring(&self) -> Option<&str> {
        self.root().docstring.as_deref()
    }

    /// Get a symbol by handle.
    #[must_use]
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.as_usize())
    }

    /// Find a symbol by qualified path.
    #[must_use]
    pub fn lookup(&self, qualified_path: &str) -> Option<&Symbol> {
        self.paths.get(qualified_path).and_then(|id| self.get(*id))
    }

    /// Parent of a symbol.
    #[must_use]
    pub fn parent(&self, id: SymbolId) -> Option<&Symbol> {
        self.get(id)?.parent.and_then(|parent| self.get(parent))
    }

    /// Direct children of a symbol in source order.
    pub fn children(&self, id: SymbolId) -> impl Iterator<Item = &Symbol> + '_ {
        self.get(id)
            .map(|symbol| symbol.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.get(*child))
    }

    /// Ancestors of a symbol, nearest first, ending with the root.
    pub fn ancestors(&self, id: SymbolId) -> impl Iterator<Item = &Symbol> + '_ {
        std::iter::successors(self.parent(id), |symbol| {
            symbol.parent.and_then(|parent| self.get(parent))
        })
    }

    /// Every symbol except the root, in depth-first source order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.iter().skip(1)
    }

    /// Number of symbols, not counting the root.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len() - 1
    }

    /// Returns `true` if nothing but the root was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbol_count() == 0
    }

    /// Symbols whose span contains `span`, outermost first.
    pub fn containing(&self, span: Span) -> impl Iterator<Item = &Symbol> + '_ {
        self.iter().filter(move |symbol| symbol.span.contains(&span))
    }

    /// The innermost symbol covering a position, if any.
    #[must_use]
    pub fn symbol_at(&self, line: u32, col: u32) -> Option<&Symbol> {
        let mut current = self.root();
        let mut found = None;
        while let Some(child) = self
            .children(current.id)
            .find(|child| child.span.contains_position(line, col))
        {
            found = Some(child);
            current = child;
        }
        found
    }

    /// Serializable record of one symbol and its descendants.
    #[must_use]
    pub fn record(&self, id: SymbolId) -> Option<SymbolRecord> {
        let symbol = self.get(id)?;
        Some(SymbolRecord {
            qualified_path: symbol.qualified_path.clone(),
            kind: symbol.kind,
            name: symbol.name.clone(),
            span: symbol.span,
            docstring: symbol.docstring.clone(),
            signature: symbol.signature.clone(),
            decorators: symbol.decorators.clone(),
            children: symbol
                .children
                .iter()
                .filter_map(|child| self.record(*child))
                .collect(),
        })
    }

    /// Serializable record of the whole table.
    #[must_use]
    pub fn to_record(&self) -> TableRecord {
        TableRecord {
            id: self.source_id.clone(),
            language: self.language,
            docstring: self.root().docstring.clone(),
            symbols: self
                .root()
                .children
                .iter()
                .filter_map(|child| self.record(*child))
                .collect(),
        }
    }
}

/// The root module symbol for a source.
pub(crate) fn root_symbol(source_id: &str, span: Span) -> Symbol {
    let name = Path::new(source_id)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(source_id);
    Symbol {
        id: SymbolId::ROOT,
        kind: SymbolKind::Module,
        name: name.to_string(),
        qualified_path: String::new(),
        span,
        docstring: None,
        signature: None,
        decorators: Vec::new(),
        metadata: BTreeMap::new(),
        parent: None,
        children: Vec::new(),
    }
}

/// Stable serialized form of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRecord {
    /// Dot-joined path from the module root
    pub qualified_path: String,
    /// Normalized kind
    pub kind: SymbolKind,
    /// Declared or placeholder name
    pub name: String,
    /// Source span
    pub span: Span,
    /// Cleaned documentation, `null` when absent
    pub docstring: Option<String>,
    /// Declaration header, `null` when absent
    pub signature: Option<String>,
    /// Decorators in source order
    pub decorators: Vec<String>,
    /// Nested records in source order
    pub children: Vec<SymbolRecord>,
}

/// Stable serialized form of a symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    /// Source identifier
    pub id: String,
    /// Language the source was parsed as
    pub language: Language,
    /// Module-level documentation, `null` when absent
    pub docstring: Option<String>,
    /// Records of the root's children
    pub symbols: Vec<SymbolRecord>,
}
