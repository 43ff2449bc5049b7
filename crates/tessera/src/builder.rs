//! Symbol table construction from a normalized tree.
//!
//! The walk is depth-first with an explicit work stack, so arena order is
//! source order and arbitrarily deep trees cannot overflow the call stack.
//!
//! - `Unknown` nodes produce no symbol; their children attach to the nearest
//!   symbol ancestor.
//! - `Decorator` children become the owner's ordered `decorators` list.
//! - `docstring` and `signature` metadata move into their own fields.
//!
//! Nothing here is fatal. Duplicate paths are renamed with `#2`, `#3`, ...
//! and span problems are reported, but every symbol is kept. A span that
//! escapes its parent or overlaps its previous sibling is clamped, so every
//! finished table nests cleanly; the diagnostic carries the original span.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Diagnostic, DiagnosticsCollector, Recovered};
use crate::normalize::{NormalizedNode, meta};
use crate::symbols::{Symbol, SymbolTable, root_symbol};
use crate::types::{Language, NodeKind, Span, SymbolId, SymbolKind};

/// Build the symbol table for one normalized source.
///
/// `root` is treated as the file's module whatever its kind.
#[must_use]
pub fn build(
    root: NormalizedNode,
    source_id: &str,
    language: Language,
    content_hash: u64,
) -> Recovered<SymbolTable> {
    let mut builder = TableBuilder::new(source_id, root.span);
    let NormalizedNode {
        children, metadata, ..
    } = root;

    let (decorators, children) = split_decorators(children);
    let root_entry = &mut builder.symbols[SymbolId::ROOT.as_usize()];
    root_entry.decorators = decorators;
    root_entry.docstring = metadata
        .get(meta::DOCSTRING)
        .filter(|doc| !doc.is_empty())
        .cloned();

    builder.walk(children);

    let table = SymbolTable::from_arena(source_id, language, content_hash, builder.symbols);
    tracing::debug!(
        source = %source_id,
        symbols = table.symbol_count(),
        diagnostics = builder.diagnostics.len(),
        "Built symbol table"
    );
    builder.diagnostics.finish(table)
}

/// Per-symbol bookkeeping for its direct children.
#[derive(Default)]
struct Frame {
    anonymous: HashMap<SymbolKind, usize>,
    last_child: Option<Span>,
}

struct TableBuilder {
    symbols: Vec<Symbol>,
    frames: Vec<Frame>,
    paths: HashSet<String>,
    diagnostics: DiagnosticsCollector,
}

impl TableBuilder {
    fn new(source_id: &str, span: Span) -> Self {
        Self {
            symbols: vec![root_symbol(source_id, span)],
            frames: vec![Frame::default()],
            paths: HashSet::new(),
            diagnostics: DiagnosticsCollector::new(),
        }
    }

    fn walk(&mut self, children: Vec<NormalizedNode>) {
        let mut stack: Vec<(NormalizedNode, SymbolId)> = children
            .into_iter()
            .rev()
            .map(|child| (child, SymbolId::ROOT))
            .collect();

        while let Some((node, parent)) = stack.pop() {
            match node.kind.symbol_kind() {
                Some(kind) => {
                    let (id, children) = self.emit(node, kind, parent);
                    stack.extend(children.into_iter().rev().map(|child| (child, id)));
                }
                None if node.kind == NodeKind::Decorator => {
                    tracing::trace!(span = %node.span, "Dropping decorator with no owner");
                }
                None => {
                    stack.extend(node.children.into_iter().rev().map(|child| (child, parent)));
                }
            }
        }
    }

    /// Append one symbol under `parent`, returning its handle and the
    /// children still to visit.
    fn emit(
        &mut self,
        node: NormalizedNode,
        kind: SymbolKind,
        parent: SymbolId,
    ) -> (SymbolId, Vec<NormalizedNode>) {
        let NormalizedNode {
            name,
            span,
            children,
            mut metadata,
            ..
        } = node;
        let (decorators, children) = split_decorators(children);

        let name = match name.filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => self.placeholder(parent, kind),
        };
        let qualified_path = self.unique_path(parent, &name, span);
        let span = self.fit_span(parent, &qualified_path, span);

        let id = SymbolId(self.symbols.len());
        let docstring = metadata
            .remove(meta::DOCSTRING)
            .filter(|doc| !doc.is_empty());
        let signature = metadata.remove(meta::SIGNATURE);

        tracing::trace!(path = %qualified_path, %kind, %span, "Emitting symbol");
        self.symbols[parent.as_usize()].children.push(id);
        self.symbols.push(Symbol {
            id,
            kind,
            name,
            qualified_path,
            span,
            docstring,
            signature,
            decorators,
            metadata,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.frames.push(Frame::default());
        (id, children)
    }

    fn placeholder(&mut self, parent: SymbolId, kind: SymbolKind) -> String {
        let counter = self.frames[parent.as_usize()]
            .anonymous
            .entry(kind)
            .or_insert(0);
        *counter += 1;
        format!("<anonymous-{kind}-{counter}>")
    }

    fn unique_path(&mut self, parent: SymbolId, name: &str, span: Span) -> String {
        let parent_path = &self.symbols[parent.as_usize()].qualified_path;
        let base = if parent_path.is_empty() {
            name.to_string()
        } else {
            format!("{parent_path}.{name}")
        };

        let mut path = base.clone();
        let mut ordinal = 1;
        while self.paths.contains(&path) {
            ordinal += 1;
            path = format!("{base}#{ordinal}");
        }
        if ordinal > 1 {
            tracing::debug!(%base, renamed = %path, "Duplicate qualified path");
            self.diagnostics
                .add(Diagnostic::duplicate_path(&base, &path, span));
        }
        self.paths.insert(path.clone());
        path
    }

    /// Report span problems and return the span clamped into the parent and
    /// behind the previous sibling.
    fn fit_span(&mut self, parent: SymbolId, path: &str, span: Span) -> Span {
        let owner = &self.symbols[parent.as_usize()];
        let mut fitted = span;
        if !owner.span.contains(&span) {
            let owner_path = if owner.qualified_path.is_empty() {
                "<module>"
            } else {
                owner.qualified_path.as_str()
            };
            tracing::warn!(%path, %span, parent = %owner.span, "Symbol escapes its parent");
            self.diagnostics.add(Diagnostic::span_anomaly(
                format!("`{path}` extends outside `{owner_path}`"),
                span,
            ));
            fitted = clamp(fitted, owner.span.start(), owner.span.end());
        }

        let frame = &mut self.frames[parent.as_usize()];
        if let Some(previous) = frame.last_child.filter(|previous| !previous.precedes(&fitted)) {
            tracing::warn!(%path, %span, %previous, "Symbol overlaps its previous sibling");
            self.diagnostics.add(Diagnostic::span_anomaly(
                format!("`{path}` overlaps or precedes its previous sibling at {previous}"),
                span,
            ));
            let upper = fitted.end().max(previous.end());
            fitted = clamp(fitted, previous.end(), upper);
        }
        frame.last_child = Some(fitted);
        fitted
    }
}

/// Move both ends of `span` into `lower..=upper`, keeping end after start.
fn clamp(span: Span, lower: (u32, u32), upper: (u32, u32)) -> Span {
    let (start_line, start_col) = span.start().clamp(lower, upper);
    let (end_line, end_col) = span.end().clamp((start_line, start_col), upper);
    Span {
        start_line,
        start_col,
        end_line,
        end_col,
    }
}

fn split_decorators(children: Vec<NormalizedNode>) -> (Vec<String>, Vec<NormalizedNode>) {
    let (decorators, rest): (Vec<_>, Vec<_>) = children
        .into_iter()
        .partition(|child| child.kind == NodeKind::Decorator);
    let names = decorators
        .into_iter()
        .filter_map(|decorator| decorator.name)
        .collect();
    (names, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    fn span(a: u32, b: u32, c: u32, d: u32) -> Span {
        Span::new(a, b, c, d).expect("valid span")
    }

    fn node(kind: NodeKind, name: &str, span: Span) -> NormalizedNode {
        NormalizedNode::named(kind, name, span)
    }

    fn module(children: Vec<NormalizedNode>) -> NormalizedNode {
        NormalizedNode::new(NodeKind::Module, None, span(1, 1, 100, 1)).with_children(children)
    }

    fn build_module(children: Vec<NormalizedNode>) -> Recovered<SymbolTable> {
        build(module(children), "src/app.py", Language::Python, 7)
    }

    fn paths(table: &SymbolTable) -> Vec<&str> {
        table.iter().map(|s| s.qualified_path.as_str()).collect()
    }

    #[test]
    fn paths_are_dot_joined_in_source_order() {
        let class = node(NodeKind::Class, "Greeter", span(1, 1, 10, 1)).with_children(vec![
            node(NodeKind::Method, "__init__", span(2, 5, 4, 1)),
            node(NodeKind::Method, "greet", span(5, 5, 9, 1)),
        ]);
        let result = build_module(vec![class, node(NodeKind::Function, "main", span(11, 1, 12, 1))]);
        assert!(result.diagnostics.is_empty());
        assert_eq!(
            paths(&result.value),
            ["Greeter", "Greeter.__init__", "Greeter.greet", "main"]
        );
        assert_eq!(result.value.content_hash(), 7);
    }

    #[test]
    fn unknown_wrappers_are_transparent() {
        let wrapper = NormalizedNode::unknown("if_statement", span(1, 1, 5, 1)).with_children(vec![
            node(NodeKind::Variable, "DEBUG", span(2, 5, 2, 17)),
            NormalizedNode::unknown("for_statement", span(3, 5, 5, 1))
                .with_children(vec![node(NodeKind::Function, "helper", span(4, 9, 4, 30))]),
        ]);
        let result = build_module(vec![wrapper]);
        assert!(result.diagnostics.is_empty());
        assert_eq!(paths(&result.value), ["DEBUG", "helper"]);
        assert!(
            result
                .value
                .iter()
                .all(|s| s.parent == Some(SymbolId::ROOT))
        );
    }

    #[test]
    fn decorators_and_docs_move_onto_the_symbol() {
        let function = node(NodeKind::Function, "cached", span(1, 1, 4, 1))
            .with_meta(meta::DOCSTRING, "Cached.")
            .with_meta(meta::SIGNATURE, "def cached()")
            .with_meta(meta::RETURN_TYPE, "int")
            .with_children(vec![
                node(NodeKind::Decorator, "functools.cache", span(1, 1, 1, 17)),
                node(NodeKind::Decorator, "trace", span(2, 1, 2, 7)),
            ]);
        let result = build_module(vec![function]);
        let symbol = result.value.lookup("cached").expect("cached");
        assert_eq!(symbol.decorators, ["functools.cache", "trace"]);
        assert_eq!(symbol.docstring.as_deref(), Some("Cached."));
        assert_eq!(symbol.signature.as_deref(), Some("def cached()"));
        assert_eq!(symbol.meta(meta::RETURN_TYPE), Some("int"));
        assert_eq!(symbol.meta(meta::DOCSTRING), None);
        assert!(symbol.children.is_empty());
    }

    #[test]
    fn anonymous_symbols_are_numbered_per_parent_and_kind() {
        let outer = node(NodeKind::Class, "Outer", span(1, 1, 20, 1)).with_children(vec![
            NormalizedNode::new(NodeKind::Class, None, span(2, 1, 3, 1)),
            NormalizedNode::new(NodeKind::Function, None, span(4, 1, 5, 1)),
            NormalizedNode::new(NodeKind::Class, None, span(6, 1, 7, 1)),
        ]);
        let result = build_module(vec![
            NormalizedNode::new(NodeKind::Class, None, span(30, 1, 31, 1)),
            outer,
        ]);
        assert_eq!(
            paths(&result.value),
            [
                "<anonymous-class-1>",
                "Outer",
                "Outer.<anonymous-class-1>",
                "Outer.<anonymous-function-1>",
                "Outer.<anonymous-class-2>",
            ]
        );
    }

    #[test]
    fn duplicate_paths_are_suffixed_and_reported() {
        let result = build_module(vec![
            node(NodeKind::Class, "<Foo>", span(1, 1, 3, 1))
                .with_children(vec![node(NodeKind::Method, "new", span(2, 5, 2, 30))]),
            node(NodeKind::Class, "<Foo>", span(4, 1, 6, 1))
                .with_children(vec![node(NodeKind::Method, "new", span(5, 5, 5, 30))]),
            node(NodeKind::Class, "<Foo>", span(7, 1, 8, 1)),
        ]);
        assert_eq!(
            paths(&result.value),
            ["<Foo>", "<Foo>.new", "<Foo>#2", "<Foo>#2.new", "<Foo>#3"]
        );
        assert_eq!(result.value.lookup("<Foo>#2").map(|s| s.name.as_str()), Some("<Foo>"));
        let kinds: Vec<_> = result.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            [DiagnosticKind::DuplicatePath, DiagnosticKind::DuplicatePath]
        );
        assert_eq!(result.diagnostics[0].span, Some(span(4, 1, 6, 1)));
    }

    #[test]
    fn span_violations_are_reported_but_kept() {
        let class = node(NodeKind::Class, "A", span(1, 1, 5, 1)).with_children(vec![
            node(NodeKind::Method, "escapes", span(4, 1, 7, 1)),
        ]);
        let result = build_module(vec![
            class,
            node(NodeKind::Function, "overlaps", span(4, 1, 6, 1)),
        ]);
        assert_eq!(result.value.symbol_count(), 3);
        assert_eq!(result.diagnostics.len(), 2);
        assert!(
            result
                .diagnostics
                .iter()
                .all(|d| d.kind == DiagnosticKind::SpanAnomaly)
        );
        assert!(result.diagnostics[0].message.contains("`A.escapes` extends outside `A`"));
        assert!(result.diagnostics[1].message.contains("previous sibling"));
        assert_eq!(result.diagnostics[0].span, Some(span(4, 1, 7, 1)));
        assert_eq!(result.diagnostics[1].span, Some(span(4, 1, 6, 1)));

        let table = &result.value;
        let clamped = |path: &str| table.lookup(path).map(|s| s.span);
        assert_eq!(clamped("A.escapes"), Some(span(4, 1, 5, 1)));
        assert_eq!(clamped("overlaps"), Some(span(5, 1, 6, 1)));
    }

    #[test]
    fn disjoint_spans_collapse_inside_their_parent() {
        let class = node(NodeKind::Class, "A", span(10, 1, 20, 1)).with_children(vec![
            node(NodeKind::Method, "before", span(2, 1, 3, 1)),
            node(NodeKind::Method, "after", span(30, 1, 31, 1)),
            node(NodeKind::Method, "inside", span(12, 1, 13, 1)),
        ]);
        let result = build_module(vec![class]);
        let spans: Vec<_> = result.value.iter().skip(1).map(|s| s.span).collect();
        assert_eq!(
            spans,
            [span(10, 1, 10, 1), span(20, 1, 20, 1), span(20, 1, 20, 1)]
        );
        assert_eq!(result.value.symbol_count(), 4);
        assert!(
            result
                .diagnostics
                .iter()
                .all(|d| d.kind == DiagnosticKind::SpanAnomaly)
        );
    }

    #[test]
    fn empty_module_builds_empty_table() {
        let result = build(
            NormalizedNode::new(NodeKind::Module, None, span(1, 1, 1, 1))
                .with_meta(meta::DOCSTRING, ""),
            "empty.py",
            Language::Python,
            0,
        );
        assert!(result.diagnostics.is_empty());
        assert!(result.value.is_empty());
        assert_eq!(result.value.docstring(), None);
        assert_eq!(result.value.root().name, "empty");
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut nested = node(NodeKind::Function, "f0", span(1, 1, 1, 2));
        for depth in 1..1_000u32 {
            nested = node(NodeKind::Function, &format!("f{depth}"), span(1, 1, 1, 2))
                .with_children(vec![nested]);
        }
        let result = build_module(vec![nested]);
        assert_eq!(result.value.symbol_count(), 1_000);
        assert!(result.diagnostics.is_empty());
    }
}
