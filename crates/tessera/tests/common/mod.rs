//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use tessera::{
    AdapterRegistry, ExtractionInput, ExtractionOutput, Extractor, ExtractorConfig, SymbolKind,
    SymbolTable,
};

/// Extractor over the built-in adapters with default settings.
pub fn extractor() -> Extractor {
    Extractor::new(
        Arc::new(AdapterRegistry::with_builtin()),
        &ExtractorConfig::default(),
    )
}

/// Extract `code` under the identifier `id`.
pub fn extract(id: &str, code: &str) -> ExtractionOutput {
    extractor().extract(&ExtractionInput::text(id, code))
}

/// `(qualified path, kind)` of every symbol in arena order.
pub fn outline(table: &SymbolTable) -> Vec<(String, SymbolKind)> {
    table
        .iter()
        .map(|symbol| (symbol.qualified_path.clone(), symbol.kind))
        .collect()
}

/// Qualified paths of every symbol in arena order.
pub fn paths(table: &SymbolTable) -> Vec<String> {
    table.iter().map(|symbol| symbol.qualified_path.clone()).collect()
}

/// Unique paths and consistent parent/child links.
pub fn assert_structure(table: &SymbolTable) {
    let mut seen = HashSet::new();
    for symbol in table.iter() {
        assert!(
            seen.insert(symbol.qualified_path.as_str()),
            "duplicate path {}",
            symbol.qualified_path
        );

        let parent = table.parent(symbol.id).expect("non-root symbol has a parent");
        assert!(
            parent.children.contains(&symbol.id),
            "{} missing from its parent's children",
            symbol.qualified_path
        );
    }
}

/// Structure plus span nesting and sibling ordering.
pub fn assert_table_invariants(table: &SymbolTable) {
    assert_structure(table);
    for symbol in std::iter::once(table.root()).chain(table.iter()) {
        let children: Vec<_> = table.children(symbol.id).collect();
        for child in &children {
            assert_eq!(child.parent, Some(symbol.id));
            assert!(
                symbol.span.contains(&child.span),
                "{} ({}) escapes {} ({})",
                child.qualified_path,
                child.span,
                symbol.qualified_path,
                symbol.span
            );
        }
        for pair in children.windows(2) {
            assert!(
                pair[0].span.precedes(&pair[1].span),
                "{} ({}) and {} ({}) are out of order or overlap",
                pair[0].qualified_path,
                pair[0].span,
                pair[1].qualified_path,
                pair[1].span
            );
        }
    }
}
