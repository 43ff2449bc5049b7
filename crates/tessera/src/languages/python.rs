//! Python normalization.
//!
//! Rules:
//! - `function_definition` is a Function, or a Method when directly inside a
//!   class body (control-flow wrappers in between do not change that).
//! - `decorated_definition` collapses into its definition, taking the
//!   wrapper's span and one Decorator child per `@...` line.
//! - Plain assignments are Variables at module level and Attributes at class
//!   level; only the first binding of a name in a scope is kept.
//! - A string literal as the first statement of a body is its docstring.
//! - `ERROR` regions are scanned for `def`/`class` headers so that a broken
//!   body still leaves a signature-only symbol behind.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tree_sitter::Node;

use super::LanguageSupport;
use super::tree_sitter_utils::{children, collapse_whitespace, named_children, node_span, source_extent};
use crate::diagnostics::Recovered;
use crate::normalize::{NormalizeContext, NormalizedNode, clean_docstring, meta};
use crate::parser::ParseTree;
use crate::types::{Language, NodeKind};

/// Tree-sitter node kind constants for the Python grammar.
mod node_kinds {
    pub const FUNCTION_DEFINITION: &str = "function_definition";
    pub const CLASS_DEFINITION: &str = "class_definition";
    pub const DECORATED_DEFINITION: &str = "decorated_definition";
    pub const DECORATOR: &str = "decorator";
    pub const EXPRESSION_STATEMENT: &str = "expression_statement";
    pub const ASSIGNMENT: &str = "assignment";
    pub const TYPE_ALIAS_STATEMENT: &str = "type_alias_statement";
    pub const BLOCK: &str = "block";
    pub const CASE_CLAUSE: &str = "case_clause";
    pub const STRING: &str = "string";
    pub const COMMENT: &str = "comment";
    pub const IDENTIFIER: &str = "identifier";
    pub const PATTERN_LIST: &str = "pattern_list";
    pub const TUPLE_PATTERN: &str = "tuple_pattern";
    pub const LIST_PATTERN: &str = "list_pattern";
    pub const LIST_SPLAT_PATTERN: &str = "list_splat_pattern";
    pub const ERROR: &str = "ERROR";

    /// Compound statements whose bodies may hold declarations.
    pub const CONTAINERS: &[&str] = &[
        "if_statement",
        "for_statement",
        "while_statement",
        "try_statement",
        "with_statement",
        "match_statement",
    ];
}

use node_kinds::{
    ASSIGNMENT, BLOCK, CASE_CLAUSE, CLASS_DEFINITION, COMMENT, CONTAINERS, DECORATED_DEFINITION,
    DECORATOR, ERROR, EXPRESSION_STATEMENT, FUNCTION_DEFINITION, IDENTIFIER, LIST_PATTERN,
    LIST_SPLAT_PATTERN, PATTERN_LIST, STRING, TUPLE_PATTERN, TYPE_ALIAS_STATEMENT,
};

/// Python language support.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonLanguage;

impl LanguageSupport for PythonLanguage {
    fn language(&self) -> Language {
        Language::Python
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn normalize(&self, tree: &ParseTree, cancel: &CancellationToken) -> Recovered<NormalizedNode> {
        let ctx = NormalizeContext::new(tree.source(), cancel);
        let root = tree.root_node();

        let mut module = NormalizedNode::new(NodeKind::Module, None, source_extent(tree.source()));
        module.set_meta_opt(meta::DOCSTRING, block_docstring(&root, &ctx));
        let mut scope = Scope::new(ScopeKind::Module);
        module.children = normalize_block(&root, &mut scope, &ctx);

        ctx.finish(module)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Class,
    Function,
}

/// Lexical scope being filled: decides Method vs Function and tracks
/// which names already have a binding.
struct Scope {
    kind: ScopeKind,
    bindings: HashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            bindings: HashSet::new(),
        }
    }
}

fn normalize_block(block: &Node<'_>, scope: &mut Scope, ctx: &NormalizeContext<'_>) -> Vec<NormalizedNode> {
    let mut out = Vec::new();
    for child in named_children(block) {
        if ctx.is_cancelled() {
            break;
        }
        normalize_statement(&child, scope, ctx, &mut out);
    }
    out
}

fn normalize_statement(
    node: &Node<'_>,
    scope: &mut Scope,
    ctx: &NormalizeContext<'_>,
    out: &mut Vec<NormalizedNode>,
) {
    match node.kind() {
        FUNCTION_DEFINITION => out.push(normalize_function(node, node, Vec::new(), scope.kind, ctx)),
        CLASS_DEFINITION => out.push(normalize_class(node, node, Vec::new(), ctx)),
        DECORATED_DEFINITION => {
            if let Some(normalized) = normalize_decorated(node, scope.kind, ctx) {
                out.push(normalized);
            }
        }
        EXPRESSION_STATEMENT if scope.kind != ScopeKind::Function => {
            normalize_assignment(node, scope, ctx, out);
        }
        TYPE_ALIAS_STATEMENT if scope.kind != ScopeKind::Function => out.push(ctx.gap(node)),
        CASE_CLAUSE => out.extend(normalize_container(node, scope, ctx)),
        ERROR => out.push(recover_error_region(node, scope, ctx)),
        kind if CONTAINERS.contains(&kind) => {
            let nested = normalize_container(node, scope, ctx);
            if !nested.is_empty() {
                out.push(NormalizedNode::unknown(kind, node_span(node)).with_children(nested));
            }
        }
        _ => {}
    }
}

/// Declarations inside the blocks and clauses of a compound statement.
fn normalize_container(node: &Node<'_>, scope: &mut Scope, ctx: &NormalizeContext<'_>) -> Vec<NormalizedNode> {
    let mut out = Vec::new();
    for child in named_children(node) {
        if child.kind() == BLOCK {
            out.extend(normalize_block(&child, scope, ctx));
        } else if child.kind().ends_with("_clause") {
            out.extend(normalize_container(&child, scope, ctx));
        }
    }
    out
}

fn normalize_decorated(node: &Node<'_>, scope: ScopeKind, ctx: &NormalizeContext<'_>) -> Option<NormalizedNode> {
    let definition = node.child_by_field_name("definition")?;
    let decorators: Vec<NormalizedNode> = named_children(node)
        .iter()
        .filter(|child| child.kind() == DECORATOR)
        .map(|decorator| decorator_node(decorator, ctx))
        .collect();

    match definition.kind() {
        FUNCTION_DEFINITION => Some(normalize_function(&definition, node, decorators, scope, ctx)),
        CLASS_DEFINITION => Some(normalize_class(&definition, node, decorators, ctx)),
        _ => None,
    }
}

fn decorator_node(decorator: &Node<'_>, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let text = ctx.text(decorator).trim();
    let name = text.strip_prefix('@').unwrap_or(text).trim();
    NormalizedNode::named(NodeKind::Decorator, name, node_span(decorator))
}

/// `outer` is the node whose span the symbol takes: the decorated wrapper
/// when there is one, otherwise the definition itself.
fn normalize_function(
    def: &Node<'_>,
    outer: &Node<'_>,
    decorators: Vec<NormalizedNode>,
    scope: ScopeKind,
    ctx: &NormalizeContext<'_>,
) -> NormalizedNode {
    let kind = if scope == ScopeKind::Class {
        NodeKind::Method
    } else {
        NodeKind::Function
    };
    let name = ctx.field_text(def, "name").map(str::to_string);
    let mut node = NormalizedNode::new(kind, name, node_span(outer));

    let header = header_text(def, &["name", "type_parameters", "parameters", "return_type"], ctx);
    node.set_meta(meta::SIGNATURE, header);
    node.set_meta_opt(meta::RETURN_TYPE, ctx.field_text(def, "return_type").map(str::to_string));

    node.children = decorators;
    if let Some(body) = def.child_by_field_name("body") {
        node.set_meta_opt(meta::DOCSTRING, block_docstring(&body, ctx));
        let mut scope = Scope::new(ScopeKind::Function);
        node.children.extend(normalize_block(&body, &mut scope, ctx));
    }
    node
}

fn normalize_class(
    def: &Node<'_>,
    outer: &Node<'_>,
    decorators: Vec<NormalizedNode>,
    ctx: &NormalizeContext<'_>,
) -> NormalizedNode {
    let name = ctx.field_text(def, "name").map(str::to_string);
    let mut node = NormalizedNode::new(NodeKind::Class, name, node_span(outer));
    node.set_meta(
        meta::SIGNATURE,
        header_text(def, &["name", "type_parameters", "superclasses"], ctx),
    );

    node.children = decorators;
    if let Some(body) = def.child_by_field_name("body") {
        node.set_meta_opt(meta::DOCSTRING, block_docstring(&body, ctx));
        let mut scope = Scope::new(ScopeKind::Class);
        node.children.extend(normalize_block(&body, &mut scope, ctx));
    }
    node
}

/// Declaration text from its first token through the last header field.
fn header_text(def: &Node<'_>, fields: &[&str], ctx: &NormalizeContext<'_>) -> String {
    let end = fields
        .iter()
        .filter_map(|field| def.child_by_field_name(field))
        .map(|child| child.end_byte())
        .max()
        .unwrap_or_else(|| def.end_byte());
    let text = ctx.source().get(def.start_byte()..end).unwrap_or_default();
    collapse_whitespace(text)
}

fn normalize_assignment(
    statement: &Node<'_>,
    scope: &mut Scope,
    ctx: &NormalizeContext<'_>,
    out: &mut Vec<NormalizedNode>,
) {
    let Some(assignment) = statement.named_child(0).filter(|n| n.kind() == ASSIGNMENT) else {
        return;
    };
    let kind = if scope.kind == ScopeKind::Class {
        NodeKind::Attribute
    } else {
        NodeKind::Variable
    };

    // `a = b = 1` nests assignments through the right-hand side.
    let mut targets = Vec::new();
    let mut current = Some(assignment);
    while let Some(step) = current.filter(|n| n.kind() == ASSIGNMENT) {
        if let Some(left) = step.child_by_field_name("left") {
            collect_targets(&left, &mut targets);
        }
        current = step.child_by_field_name("right");
    }

    let single = targets.len() == 1;
    let annotation = ctx.field_text(&assignment, "type");
    for target in targets {
        let name = ctx.text(&target).to_string();
        if !scope.bindings.insert(name.clone()) {
            tracing::trace!(%name, "Skipping rebinding");
            continue;
        }
        let span = if single {
            node_span(statement)
        } else {
            node_span(&target)
        };
        let mut node = NormalizedNode::named(kind, name, span);
        if single {
            node.set_meta_opt(meta::TYPE, annotation.map(str::to_string));
        }
        out.push(node);
    }
}

fn collect_targets<'t>(node: &Node<'t>, out: &mut Vec<Node<'t>>) {
    match node.kind() {
        IDENTIFIER => out.push(*node),
        PATTERN_LIST | TUPLE_PATTERN | LIST_PATTERN | LIST_SPLAT_PATTERN => {
            for child in named_children(node) {
                collect_targets(&child, out);
            }
        }
        _ => {}
    }
}

/// Docstring of a block: a string literal as its first statement.
fn block_docstring(block: &Node<'_>, ctx: &NormalizeContext<'_>) -> Option<String> {
    let first = named_children(block)
        .into_iter()
        .find(|child| child.kind() != COMMENT)?;
    if first.kind() != EXPRESSION_STATEMENT {
        return None;
    }
    let literal = first.named_child(0).filter(|n| n.kind() == STRING)?;
    let doc = clean_docstring(string_body(ctx.text(&literal)));
    (!doc.is_empty()).then_some(doc)
}

/// Strip prefix letters and quotes from a string literal.
fn string_body(literal: &str) -> &str {
    let unprefixed = literal.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if unprefixed.len() >= 2 * quote.len() {
            if let Some(inner) = unprefixed
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
            {
                return inner;
            }
        }
    }
    unprefixed
}

// ============================================================================
// Error recovery
// ============================================================================

/// A `def`/`class` header found inside an error region, still collecting
/// the statements that follow it at a deeper indentation.
struct PendingHeader {
    column: usize,
    node: NormalizedNode,
    scope: Scope,
}

/// Normalize an `ERROR` node into an `Unknown` wrapper.
///
/// Complete statements inside the region are normalized as usual. Bare
/// `def`/`class` keyword tokens followed by a name start a signature-only
/// symbol that absorbs the statements indented under it.
fn recover_error_region(error: &Node<'_>, scope: &mut Scope, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let mut wrapper = NormalizedNode::unknown(ERROR, node_span(error));
    let mut stack: Vec<PendingHeader> = Vec::new();
    let tokens = children(error);

    let mut i = 0;
    while i < tokens.len() {
        if ctx.is_cancelled() {
            break;
        }
        let token = tokens[i];
        let column = token.start_position().column;

        if let Some((header, consumed)) = recover_header(&tokens, i, &stack, scope.kind, ctx) {
            close_headers(&mut stack, &mut wrapper, column);
            stack.push(header);
            i += consumed;
            continue;
        }

        if token.is_named() {
            if token.kind() != BLOCK {
                close_headers(&mut stack, &mut wrapper, column);
            }
            let target = match stack.last_mut() {
                Some(pending) => &mut pending.scope,
                None => &mut *scope,
            };
            let produced = if token.kind() == BLOCK {
                normalize_block(&token, target, ctx)
            } else {
                let mut produced = Vec::new();
                normalize_statement(&token, target, ctx, &mut produced);
                produced
            };
            match stack.last_mut() {
                Some(pending) => pending.node.children.extend(produced),
                None => wrapper.children.extend(produced),
            }
        }
        extend_headers(&mut stack, &token);
        i += 1;
    }
    close_headers(&mut stack, &mut wrapper, 0);
    wrapper
}

/// Try to read a `[async] def name ...` or `class name ...` header at
/// `tokens[i]`. Returns the pending symbol and how many tokens it used.
fn recover_header(
    tokens: &[Node<'_>],
    i: usize,
    stack: &[PendingHeader],
    outer: ScopeKind,
    ctx: &NormalizeContext<'_>,
) -> Option<(PendingHeader, usize)> {
    let start = tokens[i];
    let keyword_index = if start.kind() == "async" { i + 1 } else { i };
    let keyword = tokens.get(keyword_index)?;
    let is_class = match keyword.kind() {
        "def" => false,
        "class" => true,
        _ => return None,
    };
    let name = tokens
        .get(keyword_index + 1)
        .filter(|n| n.kind() == IDENTIFIER)?;

    // Header runs to the `:` on the keyword's line, or to the end of an
    // open parameter list spanning several lines.
    let header_row = keyword.start_position().row;
    let mut depth = 0usize;
    let mut end = *name;
    let mut j = keyword_index + 2;
    while let Some(token) = tokens.get(j) {
        if depth == 0 && (token.kind() == ":" || token.start_position().row != header_row) {
            break;
        }
        if token.kind() == BLOCK || token.kind().ends_with("_statement") || token.kind().ends_with("_definition") {
            break;
        }
        match token.kind() {
            "(" | "[" => depth += 1,
            ")" | "]" => depth = depth.saturating_sub(1),
            _ => {}
        }
        end = *token;
        j += 1;
    }
    if tokens.get(j).is_some_and(|t| t.kind() == ":") {
        j += 1;
    }

    let enclosing = stack.last().map_or(outer, |pending| pending.scope.kind);
    let kind = match (is_class, enclosing) {
        (true, _) => NodeKind::Class,
        (false, ScopeKind::Class) => NodeKind::Method,
        (false, _) => NodeKind::Function,
    };
    let span = node_span(&start).cover(&node_span(&end));
    let signature = ctx
        .source()
        .get(start.start_byte()..end.end_byte())
        .map(collapse_whitespace)
        .unwrap_or_default();
    tracing::trace!(name = %ctx.text(name), %span, "Recovered declaration header");

    let node = NormalizedNode::named(kind, ctx.text(name), span)
        .with_meta(meta::SIGNATURE, signature)
        .with_meta(meta::CONSTRUCT, "recovered");
    let scope = Scope::new(if is_class {
        ScopeKind::Class
    } else {
        ScopeKind::Function
    });
    Some((
        PendingHeader {
            column: start.start_position().column,
            node,
            scope,
        },
        j - i,
    ))
}

/// Pop every pending header indented at or beyond `column`.
fn close_headers(stack: &mut Vec<PendingHeader>, wrapper: &mut NormalizedNode, column: usize) {
    while stack.last().is_some_and(|pending| pending.column >= column) {
        let Some(done) = stack.pop() else { break };
        match stack.last_mut() {
            Some(parent) => parent.node.children.push(done.node),
            None => wrapper.children.push(done.node),
        }
    }
}

/// Every open header extends at least to the end of `token`.
fn extend_headers(stack: &mut [PendingHeader], token: &Node<'_>) {
    let end = node_span(token);
    for pending in stack {
        pending.node.span = pending.node.span.cover(&end);
    }
}
