//! Concurrently queryable index over many symbol tables.
//!
//! Tables are stored behind `Arc` and keyed by source id. Each insert swaps
//! the table and its derived `name` and `kind` entries under a single write
//! lock, so readers never observe a half-replaced file. Tables are built
//! before the lock is taken; writers hold it only for the swap.
//!
//! Every query returns hits ordered by source id, then arena order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use xxhash_rust::xxh3::xxh3_64;

use crate::symbols::{Symbol, SymbolTable};
use crate::types::{Span, SymbolId, SymbolKind};

/// Hash used to detect content changes.
///
/// A leading byte-order mark is ignored so raw and decoded text agree.
#[must_use]
pub fn content_hash(text: &str) -> u64 {
    xxh3_64(text.strip_prefix('\u{feff}').unwrap_or(text).as_bytes())
}

/// A lookup against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Symbols whose declared name matches exactly
    ByName(String),
    /// Symbols of one kind
    ByKind(SymbolKind),
    /// Symbols of one source whose span contains `span`, outermost first
    Containing {
        /// Source to search
        source_id: String,
        /// Span that must be covered
        span: Span,
    },
}

/// One symbol returned by a query.
#[derive(Debug, Clone)]
pub struct SymbolHit {
    /// Table the symbol belongs to
    pub table: Arc<SymbolTable>,
    /// Handle into `table`
    pub id: SymbolId,
}

impl SymbolHit {
    /// The matched symbol.
    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        self.table.get(self.id).unwrap_or_else(|| self.table.root())
    }

    /// Source the symbol was extracted from.
    #[must_use]
    pub fn source_id(&self) -> &str {
        self.table.source_id()
    }
}

type Postings = BTreeSet<(String, SymbolId)>;

#[derive(Default)]
struct IndexState {
    tables: BTreeMap<String, Arc<SymbolTable>>,
    by_name: HashMap<String, Postings>,
    by_kind: HashMap<SymbolKind, Postings>,
}

impl IndexState {
    fn link(&mut self, table: &SymbolTable) {
        for symbol in table.iter() {
            let key = (table.source_id().to_string(), symbol.id);
            self.by_name
                .entry(symbol.name.clone())
                .or_default()
                .insert(key.clone());
            self.by_kind.entry(symbol.kind).or_default().insert(key);
        }
    }

    fn unlink(&mut self, table: &SymbolTable) {
        for symbol in table.iter() {
            let key = (table.source_id().to_string(), symbol.id);
            if let Some(postings) = self.by_name.get_mut(&symbol.name) {
                postings.remove(&key);
                if postings.is_empty() {
                    self.by_name.remove(&symbol.name);
                }
            }
            if let Some(postings) = self.by_kind.get_mut(&symbol.kind) {
                postings.remove(&key);
                if postings.is_empty() {
                    self.by_kind.remove(&symbol.kind);
                }
            }
        }
    }

    fn hits(&self, postings: Option<&Postings>) -> Vec<SymbolHit> {
        postings
            .into_iter()
            .flatten()
            .filter_map(|(source_id, id)| {
                self.tables.get(source_id).map(|table| SymbolHit {
                    table: Arc::clone(table),
                    id: *id,
                })
            })
            .collect()
    }
}

/// Index of symbol tables keyed by source id.
#[derive(Default)]
pub struct ExtractionIndex {
    state: RwLock<IndexState>,
}

impl ExtractionIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a table under its source id, replacing any previous table for
    /// that id. Returns the replaced table.
    pub fn insert(&self, table: impl Into<Arc<SymbolTable>>) -> Option<Arc<SymbolTable>> {
        let table = table.into();
        let source_id = table.source_id().to_string();

        let mut state = self.write();
        let previous = state.tables.remove(&source_id);
        if let Some(previous) = &previous {
            state.unlink(previous);
        }
        state.link(&table);
        state.tables.insert(source_id.clone(), table);
        drop(state);

        tracing::debug!(
            source = %source_id,
            replaced = previous.is_some(),
            "Indexed symbol table"
        );
        previous
    }

    /// Remove the table for a source id.
    pub fn remove(&self, source_id: &str) -> Option<Arc<SymbolTable>> {
        let mut state = self.write();
        let removed = state.tables.remove(source_id);
        if let Some(table) = &removed {
            state.unlink(table);
        }
        removed
    }

    /// The table for a source id.
    #[must_use]
    pub fn get(&self, source_id: &str) -> Option<Arc<SymbolTable>> {
        self.read().tables.get(source_id).cloned()
    }

    /// Number of indexed sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().tables.len()
    }

    /// Returns `true` if no source is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().tables.is_empty()
    }

    /// Total number of symbols across all tables.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.read()
            .tables
            .values()
            .map(|table| table.symbol_count())
            .sum()
    }

    /// Indexed source ids in sorted order.
    #[must_use]
    pub fn source_ids(&self) -> Vec<String> {
        self.read().tables.keys().cloned().collect()
    }

    /// Returns `true` if `content` differs from what was indexed for
    /// `source_id`, or nothing was indexed yet.
    #[must_use]
    pub fn needs_update(&self, source_id: &str, content: &str) -> bool {
        self.read()
            .tables
            .get(source_id)
            .is_none_or(|table| table.content_hash() != content_hash(content))
    }

    /// Run a query.
    #[must_use]
    pub fn query(&self, query: &Query) -> Vec<SymbolHit> {
        match query {
            Query::ByName(name) => self.by_name(name),
            Query::ByKind(kind) => self.by_kind(*kind),
            Query::Containing { source_id, span } => self.containing(source_id, *span),
        }
    }

    /// Symbols with this exact name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Vec<SymbolHit> {
        let state = self.read();
        state.hits(state.by_name.get(name))
    }

    /// Symbols of one kind.
    #[must_use]
    pub fn by_kind(&self, kind: SymbolKind) -> Vec<SymbolHit> {
        let state = self.read();
        state.hits(state.by_kind.get(&kind))
    }

    /// Symbols of `source_id` whose span contains `span`, outermost first.
    #[must_use]
    pub fn containing(&self, source_id: &str, span: Span) -> Vec<SymbolHit> {
        let Some(table) = self.get(source_id) else {
            return Vec::new();
        };
        table
            .containing(span)
            .map(|symbol| SymbolHit {
                table: Arc::clone(&table),
                id: symbol.id,
            })
            .collect()
    }

    /// Innermost symbol of `source_id` covering a position.
    #[must_use]
    pub fn symbol_at(&self, source_id: &str, line: u32, col: u32) -> Option<SymbolHit> {
        let table = self.get(source_id)?;
        let id = table.symbol_at(line, col)?.id;
        Some(SymbolHit { table, id })
    }
}

impl std::fmt::Debug for ExtractionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionIndex")
            .field("sources", &self.len())
            .finish_non_exhaustive()
    }
}
