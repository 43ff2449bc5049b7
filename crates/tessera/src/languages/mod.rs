//! Language-specific parsing and normalization.
//!
//! Each supported language implements the `LanguageSupport` trait, which defines
//! how source text is parsed and how the resulting tree-sitter syntax tree is
//! collapsed into the language-agnostic [`NormalizedNode`] shape.
//!
//! ## Adding a New Language
//!
//! 1. Add the variant to `Language` enum in `types.rs`
//! 2. Create a new module (e.g., `go.rs`)
//! 3. Implement `LanguageSupport` trait
//! 4. Register it in `AdapterRegistry::with_builtin()`
//!
//! ## Design
//!
//! Adapters are stateless unit structs. Each call builds its own tree-sitter
//! parser, so one adapter can serve any number of concurrent extractions.

pub mod java;
pub mod python;
pub mod rust;
pub mod tree_sitter_utils;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::diagnostics::Recovered;
use crate::normalize::NormalizedNode;
use crate::parser::{ParseOptions, ParseTree, parse_source};
use crate::types::Language;

pub use java::JavaLanguage;
pub use python::PythonLanguage;
pub use rust::RustLanguage;

/// Trait for language-specific parsing and normalization.
pub trait LanguageSupport: Send + Sync {
    /// The language tag this adapter serves.
    fn language(&self) -> Language;

    /// File extensions this language handles.
    fn extensions(&self) -> &[&str] {
        self.language().extensions()
    }

    /// Get the tree-sitter language for parsing.
    fn tree_sitter_language(&self) -> tree_sitter::Language;

    /// Parse source text into a syntax tree plus syntax diagnostics.
    ///
    /// Returns `None` only when parsing was cancelled or timed out.
    fn parse(&self, source: Arc<str>, options: &ParseOptions) -> Recovered<Option<ParseTree>> {
        parse_source(
            self.language(),
            &self.tree_sitter_language(),
            source,
            options,
        )
    }

    /// Collapse a parse tree into a normalized tree rooted at a `Module`.
    fn normalize(&self, tree: &ParseTree, cancel: &CancellationToken)
    -> Recovered<NormalizedNode>;
}
