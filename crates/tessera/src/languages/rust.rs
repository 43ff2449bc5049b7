//! Rust language support.
//!
//! Normalizes tree-sitter-rust items:
//! - `fn` is a Function, or a Method inside `impl`/`trait` bodies
//! - `struct`, `enum`, `union`, `trait` are Classes; `impl` blocks are
//!   Classes named `<Type>` or `<Type as Trait>`
//! - `mod` is a Module
//! - `const`/`static` are Variables, or Attributes when associated
//! - named fields and enum variants are Attributes
//! - outer attributes (`#[...]`) become Decorator children
//! - `///` and `/** */` document the next item; `//!` and `/*! */` document
//!   the enclosing module

use tokio_util::sync::CancellationToken;
use tree_sitter::Node;

use super::LanguageSupport;
use super::tree_sitter_utils::{collapse_whitespace, named_children, node_span, source_extent, text_until};
use crate::diagnostics::Recovered;
use crate::normalize::{NormalizeContext, NormalizedNode, clean_block_comment, meta, trim_blank_lines};
use crate::parser::ParseTree;
use crate::types::{Language, NodeKind};

/// Tree-sitter node kind constants for Rust grammar.
///
/// These match the node types defined in tree-sitter-rust. Using constants
/// prevents typos and makes supported node types explicit.
mod node_kinds {
    // Item declarations
    pub const FUNCTION_ITEM: &str = "function_item";
    pub const FUNCTION_SIGNATURE_ITEM: &str = "function_signature_item";
    pub const STRUCT_ITEM: &str = "struct_item";
    pub const ENUM_ITEM: &str = "enum_item";
    pub const UNION_ITEM: &str = "union_item";
    pub const TRAIT_ITEM: &str = "trait_item";
    pub const IMPL_ITEM: &str = "impl_item";
    pub const CONST_ITEM: &str = "const_item";
    pub const STATIC_ITEM: &str = "static_item";
    pub const TYPE_ITEM: &str = "type_item";
    pub const ASSOCIATED_TYPE: &str = "associated_type";
    pub const MACRO_DEFINITION: &str = "macro_definition";
    pub const MOD_ITEM: &str = "mod_item";
    pub const FOREIGN_MOD_ITEM: &str = "foreign_mod_item";

    // Structure nodes
    pub const FIELD_DECLARATION_LIST: &str = "field_declaration_list";
    pub const ORDERED_FIELD_DECLARATION_LIST: &str = "ordered_field_declaration_list";
    pub const FIELD_DECLARATION: &str = "field_declaration";
    pub const ENUM_VARIANT_LIST: &str = "enum_variant_list";
    pub const ENUM_VARIANT: &str = "enum_variant";
    pub const DECLARATION_LIST: &str = "declaration_list";
    pub const VISIBILITY_MODIFIER: &str = "visibility_modifier";

    // Trivia
    pub const ATTRIBUTE_ITEM: &str = "attribute_item";
    pub const LINE_COMMENT: &str = "line_comment";
    pub const BLOCK_COMMENT: &str = "block_comment";
    pub const ERROR: &str = "ERROR";
}

/// Rust language support.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustLanguage;

impl LanguageSupport for RustLanguage {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn normalize(&self, tree: &ParseTree, cancel: &CancellationToken) -> Recovered<NormalizedNode> {
        let ctx = NormalizeContext::new(tree.source(), cancel);
        let root = tree.root_node();

        let members = normalize_items(&root, Scope::Module, &ctx);
        let mut module = NormalizedNode::new(NodeKind::Module, None, source_extent(tree.source()))
            .with_children(members.nodes);
        module.set_meta_opt(meta::DOCSTRING, members.inner_doc);

        ctx.finish(module)
    }
}

/// What kind of body the items being normalized live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Module,
    Impl,
    Trait,
    Function,
}

impl Scope {
    fn is_associated(self) -> bool {
        matches!(self, Self::Impl | Self::Trait)
    }
}

/// Normalized members of one container plus its inner documentation.
struct Members {
    nodes: Vec<NormalizedNode>,
    inner_doc: Option<String>,
}

enum DocComment {
    /// Documents the next item
    Outer(String),
    /// Documents the enclosing item
    Inner(String),
}

fn classify_comment(text: &str) -> Option<DocComment> {
    let text = text.trim_end();
    if let Some(rest) = text.strip_prefix("///") {
        if rest.starts_with('/') {
            return None;
        }
        return Some(DocComment::Outer(strip_one_space(rest).to_string()));
    }
    if let Some(rest) = text.strip_prefix("//!") {
        return Some(DocComment::Inner(strip_one_space(rest).to_string()));
    }
    if text.starts_with("/**") && !text.starts_with("/***") && text != "/**/" {
        return Some(DocComment::Outer(clean_block_comment(text, "/**")));
    }
    if text.starts_with("/*!") {
        return Some(DocComment::Inner(clean_block_comment(text, "/*!")));
    }
    None
}

fn strip_one_space(text: &str) -> &str {
    text.strip_prefix(' ').unwrap_or(text)
}

fn join_docs(fragments: &[String]) -> Option<String> {
    let lines: Vec<&str> = fragments.iter().map(String::as_str).collect();
    let doc = trim_blank_lines(&lines);
    (!doc.is_empty()).then_some(doc)
}

/// Walk the children of a container, attaching pending doc comments and
/// outer attributes to the member that follows them.
fn normalize_members(
    container: &Node<'_>,
    ctx: &NormalizeContext<'_>,
    convert: &dyn Fn(&Node<'_>) -> Option<NormalizedNode>,
) -> Members {
    use node_kinds::{ATTRIBUTE_ITEM, BLOCK_COMMENT, LINE_COMMENT};

    let mut nodes = Vec::new();
    let mut inner_docs: Vec<String> = Vec::new();
    let mut pending_docs: Vec<String> = Vec::new();
    let mut pending_attrs: Vec<Node<'_>> = Vec::new();

    for child in named_children(container) {
        if ctx.is_cancelled() {
            break;
        }
        match child.kind() {
            LINE_COMMENT | BLOCK_COMMENT => match classify_comment(ctx.text(&child)) {
                Some(DocComment::Outer(doc)) => pending_docs.push(doc),
                Some(DocComment::Inner(doc)) => inner_docs.push(doc),
                None => {}
            },
            ATTRIBUTE_ITEM => pending_attrs.push(child),
            _ => {
                let docs = std::mem::take(&mut pending_docs);
                let attrs = std::mem::take(&mut pending_attrs);
                let Some(mut node) = convert(&child) else {
                    continue;
                };
                if node.kind != NodeKind::Unknown {
                    node.set_meta_opt(meta::DOCSTRING, join_docs(&docs));
                    attach_attributes(&mut node, &attrs, ctx);
                }
                nodes.push(node);
            }
        }
    }

    Members {
        nodes,
        inner_doc: join_docs(&inner_docs),
    }
}

/// Outer attributes become leading Decorator children, and the item's span
/// grows to start at the first of them.
fn attach_attributes(node: &mut NormalizedNode, attrs: &[Node<'_>], ctx: &NormalizeContext<'_>) {
    let Some(first) = attrs.first() else {
        return;
    };
    node.span = node_span(first).cover(&node.span);
    let decorators = attrs.iter().map(|attr| {
        let text = ctx.text(attr).trim();
        let inner = text
            .strip_prefix("#[")
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(text)
            .trim();
        NormalizedNode::named(NodeKind::Decorator, inner, node_span(attr))
    });
    node.children.splice(0..0, decorators);
}

fn normalize_items(container: &Node<'_>, scope: Scope, ctx: &NormalizeContext<'_>) -> Members {
    normalize_members(container, ctx, &|item| normalize_item(item, scope, ctx))
}

fn normalize_item(node: &Node<'_>, scope: Scope, ctx: &NormalizeContext<'_>) -> Option<NormalizedNode> {
    use node_kinds::{
        ASSOCIATED_TYPE, CONST_ITEM, ENUM_ITEM, ERROR, FOREIGN_MOD_ITEM, FUNCTION_ITEM,
        FUNCTION_SIGNATURE_ITEM, IMPL_ITEM, MACRO_DEFINITION, MOD_ITEM, STATIC_ITEM, STRUCT_ITEM,
        TRAIT_ITEM, TYPE_ITEM, UNION_ITEM,
    };

    match node.kind() {
        FUNCTION_ITEM => Some(normalize_function(node, scope, ctx)),
        FUNCTION_SIGNATURE_ITEM => Some(normalize_function_signature(node, scope, ctx)),
        STRUCT_ITEM | ENUM_ITEM | UNION_ITEM | TRAIT_ITEM => Some(normalize_type(node, ctx)),
        IMPL_ITEM => Some(normalize_impl(node, ctx)),
        MOD_ITEM => Some(normalize_mod(node, ctx)),
        CONST_ITEM | STATIC_ITEM if scope != Scope::Function => Some(normalize_binding(node, scope, ctx)),
        TYPE_ITEM | ASSOCIATED_TYPE if scope.is_associated() => {
            let name = ctx.field_text(node, "name")?;
            Some(
                NormalizedNode::named(NodeKind::Attribute, name, node_span(node))
                    .with_meta(meta::CONSTRUCT, "type")
                    .with_meta(meta::SIGNATURE, declaration_text(node, ctx)),
            )
        }
        TYPE_ITEM | MACRO_DEFINITION if scope == Scope::Module => Some(ctx.gap(node)),
        FOREIGN_MOD_ITEM => {
            let body = node.child_by_field_name("body")?;
            let members = normalize_items(&body, Scope::Module, ctx);
            (!members.nodes.is_empty()).then(|| {
                NormalizedNode::unknown(FOREIGN_MOD_ITEM, node_span(node)).with_children(members.nodes)
            })
        }
        ERROR => {
            let members = normalize_items(node, scope, ctx);
            Some(NormalizedNode::unknown(ERROR, node_span(node)).with_children(members.nodes))
        }
        _ => None,
    }
}

fn visibility(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> Option<String> {
    named_children(node)
        .into_iter()
        .find(|child| child.kind() == node_kinds::VISIBILITY_MODIFIER)
        .map(|child| ctx.text(&child).to_string())
}

/// Whole declaration text without the trailing `;`.
fn declaration_text(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> String {
    let text = ctx.text(node).trim_end();
    collapse_whitespace(text.strip_suffix(';').unwrap_or(text))
}

/// Declaration text up to (not including) its body.
fn header_before(node: &Node<'_>, body: &Node<'_>, ctx: &NormalizeContext<'_>) -> String {
    collapse_whitespace(text_until(node, body.start_byte(), ctx.source()))
}

fn function_kind(scope: Scope) -> NodeKind {
    if scope.is_associated() {
        NodeKind::Method
    } else {
        NodeKind::Function
    }
}

fn normalize_function(node: &Node<'_>, scope: Scope, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let name = ctx.field_text(node, "name").map(str::to_string);
    let mut normalized = NormalizedNode::new(function_kind(scope), name, node_span(node));

    let body = node.child_by_field_name("body");
    let signature = match &body {
        Some(body) => header_before(node, body, ctx),
        None => declaration_text(node, ctx),
    };
    normalized.set_meta(meta::SIGNATURE, signature);
    normalized.set_meta_opt(meta::RETURN_TYPE, ctx.field_text(node, "return_type").map(str::to_string));
    normalized.set_meta_opt(meta::VISIBILITY, visibility(node, ctx));

    if let Some(body) = body {
        normalized.children = normalize_items(&body, Scope::Function, ctx).nodes;
    }
    normalized
}

/// Body-less `fn` declarations in traits and `extern` blocks.
fn normalize_function_signature(node: &Node<'_>, scope: Scope, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let name = ctx.field_text(node, "name").map(str::to_string);
    let mut normalized = NormalizedNode::new(function_kind(scope), name, node_span(node));
    normalized.set_meta(meta::SIGNATURE, declaration_text(node, ctx));
    normalized.set_meta_opt(meta::RETURN_TYPE, ctx.field_text(node, "return_type").map(str::to_string));
    normalized.set_meta_opt(meta::VISIBILITY, visibility(node, ctx));
    normalized
}

/// `struct`, `enum`, `union` and `trait` items.
fn normalize_type(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    use node_kinds::{
        DECLARATION_LIST, ENUM_VARIANT_LIST, FIELD_DECLARATION_LIST, ORDERED_FIELD_DECLARATION_LIST,
    };

    let name = ctx.field_text(node, "name").map(str::to_string);
    let construct = node.kind().trim_end_matches("_item");
    let mut normalized =
        NormalizedNode::new(NodeKind::Class, name, node_span(node)).with_meta(meta::CONSTRUCT, construct);
    normalized.set_meta_opt(meta::VISIBILITY, visibility(node, ctx));

    let body = node.child_by_field_name("body");
    let signature = match &body {
        Some(body) if body.kind() != ORDERED_FIELD_DECLARATION_LIST => header_before(node, body, ctx),
        _ => declaration_text(node, ctx),
    };
    normalized.set_meta(meta::SIGNATURE, signature);

    if let Some(body) = body {
        normalized.children = match body.kind() {
            FIELD_DECLARATION_LIST | ENUM_VARIANT_LIST => {
                normalize_members(&body, ctx, &|member| normalize_field(member, ctx)).nodes
            }
            DECLARATION_LIST => normalize_items(&body, Scope::Trait, ctx).nodes,
            _ => Vec::new(),
        };
    }
    normalized
}

/// Named struct fields and enum variants.
fn normalize_field(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> Option<NormalizedNode> {
    use node_kinds::{ENUM_VARIANT, FIELD_DECLARATION};

    let construct = match node.kind() {
        FIELD_DECLARATION => "field",
        ENUM_VARIANT => "variant",
        _ => return None,
    };
    let name = ctx.field_text(node, "name")?;
    let mut normalized =
        NormalizedNode::named(NodeKind::Attribute, name, node_span(node)).with_meta(meta::CONSTRUCT, construct);
    normalized.set_meta_opt(meta::TYPE, ctx.field_text(node, "type").map(str::to_string));
    normalized.set_meta_opt(meta::VISIBILITY, visibility(node, ctx));
    Some(normalized)
}

/// `impl` blocks, named after the type they implement for.
fn normalize_impl(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let self_type = ctx.field_text(node, "type").map(collapse_whitespace);
    let name = match (self_type, ctx.field_text(node, "trait").map(collapse_whitespace)) {
        (Some(ty), Some(tr)) => Some(format!("<{ty} as {tr}>")),
        (Some(ty), None) => Some(format!("<{ty}>")),
        (None, _) => None,
    };
    let mut normalized =
        NormalizedNode::new(NodeKind::Class, name, node_span(node)).with_meta(meta::CONSTRUCT, "impl");

    match node.child_by_field_name("body") {
        Some(body) => {
            normalized.set_meta(meta::SIGNATURE, header_before(node, &body, ctx));
            normalized.children = normalize_items(&body, Scope::Impl, ctx).nodes;
        }
        None => normalized.set_meta(meta::SIGNATURE, declaration_text(node, ctx)),
    }
    normalized
}

fn normalize_mod(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let name = ctx.field_text(node, "name").map(str::to_string);
    let mut normalized = NormalizedNode::new(NodeKind::Module, name, node_span(node));
    normalized.set_meta_opt(meta::VISIBILITY, visibility(node, ctx));

    match node.child_by_field_name("body") {
        Some(body) => {
            normalized.set_meta(meta::SIGNATURE, header_before(node, &body, ctx));
            let members = normalize_items(&body, Scope::Module, ctx);
            normalized.children = members.nodes;
            // Outer docs are attached later by the caller and take precedence.
            normalized.set_meta_opt(meta::DOCSTRING, members.inner_doc);
        }
        None => normalized.set_meta(meta::SIGNATURE, declaration_text(node, ctx)),
    }
    normalized
}

/// `const` and `static` items.
fn normalize_binding(node: &Node<'_>, scope: Scope, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let kind = if scope.is_associated() {
        NodeKind::Attribute
    } else {
        NodeKind::Variable
    };
    let name = ctx.field_text(node, "name").map(str::to_string);
    let mut normalized = NormalizedNode::new(kind, name, node_span(node));

    let signature = match node.child_by_field_name("type") {
        Some(ty) => collapse_whitespace(text_until(node, ty.end_byte(), ctx.source())),
        None => declaration_text(node, ctx),
    };
    normalized.set_meta(meta::SIGNATURE, signature);
    normalized.set_meta_opt(meta::TYPE, ctx.field_text(node, "type").map(str::to_string));
    normalized.set_meta_opt(meta::VISIBILITY, visibility(node, ctx));
    normalized
}
