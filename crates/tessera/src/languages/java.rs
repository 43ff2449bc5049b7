//! Java language support.
//!
//! Type declarations (class, interface, enum, record, annotation type) are
//! Classes, methods and constructors are Methods, fields and enum constants
//! are Attributes. Annotations become Decorator children and a `/** */`
//! comment directly before a member is its docstring. Anonymous class bodies
//! found in method bodies or field initializers are unnamed Classes.

use tokio_util::sync::CancellationToken;
use tree_sitter::Node;

use super::LanguageSupport;
use super::tree_sitter_utils::{children, collapse_whitespace, named_children, node_span, source_extent};
use crate::diagnostics::Recovered;
use crate::normalize::{NormalizeContext, NormalizedNode, clean_block_comment, meta};
use crate::parser::ParseTree;
use crate::types::{Language, NodeKind};

/// Tree-sitter node kind constants for the Java grammar.
mod node_kinds {
    // Type declarations
    pub const CLASS_DECLARATION: &str = "class_declaration";
    pub const INTERFACE_DECLARATION: &str = "interface_declaration";
    pub const ENUM_DECLARATION: &str = "enum_declaration";
    pub const RECORD_DECLARATION: &str = "record_declaration";
    pub const ANNOTATION_TYPE_DECLARATION: &str = "annotation_type_declaration";

    // Members
    pub const METHOD_DECLARATION: &str = "method_declaration";
    pub const CONSTRUCTOR_DECLARATION: &str = "constructor_declaration";
    pub const COMPACT_CONSTRUCTOR_DECLARATION: &str = "compact_constructor_declaration";
    pub const ANNOTATION_TYPE_ELEMENT_DECLARATION: &str = "annotation_type_element_declaration";
    pub const FIELD_DECLARATION: &str = "field_declaration";
    pub const CONSTANT_DECLARATION: &str = "constant_declaration";
    pub const ENUM_CONSTANT: &str = "enum_constant";
    pub const ENUM_BODY_DECLARATIONS: &str = "enum_body_declarations";
    pub const STATIC_INITIALIZER: &str = "static_initializer";
    pub const BLOCK: &str = "block";

    // Structure nodes
    pub const MODIFIERS: &str = "modifiers";
    pub const ANNOTATION: &str = "annotation";
    pub const MARKER_ANNOTATION: &str = "marker_annotation";
    pub const CLASS_BODY: &str = "class_body";
    pub const FORMAL_PARAMETER: &str = "formal_parameter";
    pub const OBJECT_CREATION_EXPRESSION: &str = "object_creation_expression";
    pub const BLOCK_COMMENT: &str = "block_comment";
    pub const ERROR: &str = "ERROR";

    pub const TYPE_DECLARATIONS: &[&str] = &[
        CLASS_DECLARATION,
        INTERFACE_DECLARATION,
        ENUM_DECLARATION,
        RECORD_DECLARATION,
        ANNOTATION_TYPE_DECLARATION,
    ];
}

use node_kinds::TYPE_DECLARATIONS;

/// Java language support.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaLanguage;

impl LanguageSupport for JavaLanguage {
    fn language(&self) -> Language {
        Language::Java
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn normalize(&self, tree: &ParseTree, cancel: &CancellationToken) -> Recovered<NormalizedNode> {
        let ctx = NormalizeContext::new(tree.source(), cancel);
        let root = tree.root_node();
        let module = NormalizedNode::new(NodeKind::Module, None, source_extent(tree.source()))
            .with_children(normalize_body(&root, &ctx));
        ctx.finish(module)
    }
}

/// Members of a program, class body or similar container, in source order.
fn normalize_body(container: &Node<'_>, ctx: &NormalizeContext<'_>) -> Vec<NormalizedNode> {
    use node_kinds::{BLOCK_COMMENT, ENUM_BODY_DECLARATIONS};

    let mut out = Vec::new();
    let mut pending_doc: Option<String> = None;
    for child in named_children(container) {
        if ctx.is_cancelled() {
            break;
        }
        match child.kind() {
            BLOCK_COMMENT => {
                let text = ctx.text(&child);
                if text.starts_with("/**") && text != "/**/" {
                    pending_doc = Some(clean_block_comment(text, "/**"));
                }
            }
            kind if kind.ends_with("comment") => {}
            ENUM_BODY_DECLARATIONS => out.extend(normalize_body(&child, ctx)),
            _ => {
                let doc = pending_doc.take().filter(|doc| !doc.is_empty());
                out.extend(normalize_member(&child, doc, ctx));
            }
        }
    }
    out
}

fn normalize_member(node: &Node<'_>, doc: Option<String>, ctx: &NormalizeContext<'_>) -> Vec<NormalizedNode> {
    use node_kinds::{
        ANNOTATION_TYPE_ELEMENT_DECLARATION, BLOCK, COMPACT_CONSTRUCTOR_DECLARATION, CONSTANT_DECLARATION,
        CONSTRUCTOR_DECLARATION, ENUM_CONSTANT, ERROR, FIELD_DECLARATION, METHOD_DECLARATION,
        STATIC_INITIALIZER,
    };

    let mut normalized = match node.kind() {
        kind if TYPE_DECLARATIONS.contains(&kind) => vec![normalize_type(node, ctx)],
        METHOD_DECLARATION
        | CONSTRUCTOR_DECLARATION
        | COMPACT_CONSTRUCTOR_DECLARATION
        | ANNOTATION_TYPE_ELEMENT_DECLARATION => vec![normalize_method(node, ctx)],
        FIELD_DECLARATION | CONSTANT_DECLARATION => normalize_fields(node, ctx),
        ENUM_CONSTANT => normalize_enum_constant(node, ctx).into_iter().collect(),
        STATIC_INITIALIZER | BLOCK => {
            let nested = scan_local_classes(node, ctx);
            if nested.is_empty() {
                Vec::new()
            } else {
                vec![NormalizedNode::unknown(node.kind(), node_span(node)).with_children(nested)]
            }
        }
        ERROR => vec![NormalizedNode::unknown(ERROR, node_span(node)).with_children(normalize_body(node, ctx))],
        _ => Vec::new(),
    };

    if let Some(doc) = doc {
        for member in normalized.iter_mut().filter(|m| m.kind != NodeKind::Unknown) {
            member.set_meta(meta::DOCSTRING, doc.clone());
        }
    }
    normalized
}

fn modifiers<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    named_children(node)
        .into_iter()
        .find(|child| child.kind() == node_kinds::MODIFIERS)
}

fn is_annotation(node: &Node<'_>) -> bool {
    matches!(node.kind(), node_kinds::ANNOTATION | node_kinds::MARKER_ANNOTATION)
}

/// Annotations on a declaration, as Decorator nodes.
fn decorators(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> Vec<NormalizedNode> {
    let Some(mods) = modifiers(node) else {
        return Vec::new();
    };
    named_children(&mods)
        .iter()
        .filter(|child| is_annotation(child))
        .map(|annotation| {
            let text = ctx.text(annotation).trim();
            let name = text.strip_prefix('@').unwrap_or(text).trim();
            NormalizedNode::named(NodeKind::Decorator, name, node_span(annotation))
        })
        .collect()
}

fn visibility(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> Option<String> {
    let mods = modifiers(node)?;
    children(&mods)
        .iter()
        .map(|child| ctx.text(child))
        .find(|text| matches!(*text, "public" | "protected" | "private"))
        .map(str::to_string)
}

/// Modifier keywords followed by the declaration text up to byte `end`,
/// with annotations left out.
fn signature(node: &Node<'_>, end: usize, ctx: &NormalizeContext<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut start = node.start_byte();
    if let Some(mods) = modifiers(node) {
        parts.extend(
            children(&mods)
                .iter()
                .filter(|child| !is_annotation(child) && !child.kind().ends_with("comment"))
                .map(|keyword| ctx.text(keyword)),
        );
        start = mods.end_byte();
    }
    let rest = ctx.source().get(start..end.max(start)).unwrap_or_default();
    let rest = rest.trim_end();
    parts.push(rest.strip_suffix(';').unwrap_or(rest));
    collapse_whitespace(&parts.join(" "))
}

fn normalize_type(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let name = ctx.field_text(node, "name").map(str::to_string);
    let construct = node.kind().trim_end_matches("_declaration");
    let mut normalized =
        NormalizedNode::new(NodeKind::Class, name, node_span(node)).with_meta(meta::CONSTRUCT, construct);
    normalized.set_meta_opt(meta::VISIBILITY, visibility(node, ctx));

    let body = node.child_by_field_name("body");
    let header_end = body.map_or_else(|| node.end_byte(), |body| body.start_byte());
    normalized.set_meta(meta::SIGNATURE, signature(node, header_end, ctx));

    let mut members = decorators(node, ctx);
    if let Some(parameters) = node.child_by_field_name("parameters") {
        members.extend(record_components(&parameters, ctx));
    }
    if let Some(body) = body {
        members.extend(normalize_body(&body, ctx));
    }
    normalized.children = members;
    normalized
}

fn record_components(parameters: &Node<'_>, ctx: &NormalizeContext<'_>) -> Vec<NormalizedNode> {
    named_children(parameters)
        .iter()
        .filter(|p| p.kind() == node_kinds::FORMAL_PARAMETER)
        .filter_map(|parameter| {
            let name = ctx.field_text(parameter, "name")?;
            let mut component = NormalizedNode::named(NodeKind::Attribute, name, node_span(parameter))
                .with_meta(meta::CONSTRUCT, "record_component");
            component.set_meta_opt(meta::TYPE, ctx.field_text(parameter, "type").map(str::to_string));
            Some(component)
        })
        .collect()
}

fn normalize_method(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let name = ctx.field_text(node, "name").map(str::to_string);
    let mut normalized = NormalizedNode::new(NodeKind::Method, name, node_span(node));
    if node.kind().contains("constructor") {
        normalized.set_meta(meta::CONSTRUCT, "constructor");
    }
    normalized.set_meta_opt(meta::VISIBILITY, visibility(node, ctx));
    normalized.set_meta_opt(meta::RETURN_TYPE, ctx.field_text(node, "type").map(str::to_string));

    let body = node.child_by_field_name("body");
    let header_end = body.map_or_else(|| node.end_byte(), |body| body.start_byte());
    normalized.set_meta(meta::SIGNATURE, signature(node, header_end, ctx));

    let mut members = decorators(node, ctx);
    if let Some(body) = body {
        members.extend(scan_local_classes(&body, ctx));
    }
    normalized.children = members;
    normalized
}

/// Fields and interface constants.
///
/// A declaration with one declarator is one Attribute spanning the whole
/// declaration. With several, each declarator gets its own span and the
/// annotations stay unattached, since they would overlap every sibling.
fn normalize_fields(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> Vec<NormalizedNode> {
    let declarators: Vec<Node<'_>> = {
        let mut cursor = node.walk();
        node.children_by_field_name("declarator", &mut cursor).collect()
    };
    let field_type = ctx.field_text(node, "type").map(str::to_string);
    let field_visibility = visibility(node, ctx);
    let single = declarators.len() == 1;

    declarators
        .iter()
        .filter_map(|declarator| {
            let name = ctx.field_text(declarator, "name")?;
            let span = if single { node_span(node) } else { node_span(declarator) };
            let mut field = NormalizedNode::named(NodeKind::Attribute, name, span);
            field.set_meta_opt(meta::TYPE, field_type.clone());
            field.set_meta_opt(meta::VISIBILITY, field_visibility.clone());
            if single {
                field.set_meta(meta::SIGNATURE, signature(node, node.end_byte(), ctx));
                field.children = decorators(node, ctx);
            }
            if let Some(value) = declarator.child_by_field_name("value") {
                field.children.extend(scan_local_classes(&value, ctx));
            }
            Some(field)
        })
        .collect()
}

fn normalize_enum_constant(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> Option<NormalizedNode> {
    let name = ctx.field_text(node, "name")?;
    let mut constant = NormalizedNode::named(NodeKind::Attribute, name, node_span(node))
        .with_meta(meta::CONSTRUCT, "enum_constant");
    constant.children = decorators(node, ctx);
    if let Some(body) = node.child_by_field_name("body") {
        constant.children.extend(normalize_body(&body, ctx));
    }
    Some(constant)
}

/// Local and anonymous classes anywhere below `node`.
fn scan_local_classes(node: &Node<'_>, ctx: &NormalizeContext<'_>) -> Vec<NormalizedNode> {
    use node_kinds::{CLASS_BODY, OBJECT_CREATION_EXPRESSION};

    let mut out = Vec::new();
    for child in named_children(node) {
        if ctx.is_cancelled() {
            break;
        }
        if TYPE_DECLARATIONS.contains(&child.kind()) {
            out.push(normalize_type(&child, ctx));
        } else if child.kind() == OBJECT_CREATION_EXPRESSION {
            for part in named_children(&child) {
                if part.kind() == CLASS_BODY {
                    out.push(anonymous_class(&child, &part, ctx));
                } else {
                    out.extend(scan_local_classes(&part, ctx));
                }
            }
        } else {
            out.extend(scan_local_classes(&child, ctx));
        }
    }
    out
}

/// `new Type(args) { ... }`: an unnamed Class spanning just the body, so
/// anonymous classes nested in the arguments stay separate siblings.
fn anonymous_class(creation: &Node<'_>, body: &Node<'_>, ctx: &NormalizeContext<'_>) -> NormalizedNode {
    let header = ctx
        .source()
        .get(creation.start_byte()..body.start_byte())
        .map(collapse_whitespace)
        .unwrap_or_default();
    NormalizedNode::new(NodeKind::Class, None, node_span(body))
        .with_meta(meta::CONSTRUCT, "anonymous")
        .with_meta(meta::SIGNATURE, header)
        .with_children(normalize_body(body, ctx))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parser::ParseOptions;

    fn normalize_java(code: &str) -> Recovered<NormalizedNode> {
        let tree = JavaLanguage
            .parse(Arc::from(code), &ParseOptions::default())
            .value
            .expect("java parse");
        JavaLanguage.normalize(&tree, &CancellationToken::new())
    }

    fn child<'a>(node: &'a NormalizedNode, name: &str) -> &'a NormalizedNode {
        node.children
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("no child named {name}"))
    }

    #[test]
    fn javadoc_and_annotations_attach_to_members() {
        let code = r"
/** A greeter. */
public class Greeter {
    /**
     * Says hello.
     */
    @Override
    @SuppressWarnings(value = {})
    public String toString() {
        return name;
    }

    private final String name = null;
}
";
        let root = normalize_java(code).value;
        let greeter = child(&root, "Greeter");
        assert_eq!(greeter.meta(meta::DOCSTRING), Some("A greeter."));
        assert_eq!(greeter.meta(meta::SIGNATURE), Some("public class Greeter"));
        assert_eq!(greeter.meta(meta::VISIBILITY), Some("public"));

        let method = child(greeter, "toString");
        assert_eq!(method.kind, NodeKind::Method);
        assert_eq!(method.meta(meta::DOCSTRING), Some("Says hello."));
        assert_eq!(method.meta(meta::SIGNATURE), Some("public String toString()"));
        assert_eq!(method.meta(meta::RETURN_TYPE), Some("String"));
        let decorators: Vec<_> = method.children.iter().filter_map(|c| c.name.as_deref()).collect();
        assert_eq!(decorators, ["Override", "SuppressWarnings(value = {})"]);

        let field = child(greeter, "name");
        assert_eq!(field.kind, NodeKind::Attribute);
        assert_eq!(field.meta(meta::TYPE), Some("String"));
        assert_eq!(field.meta(meta::DOCSTRING), None);
    }

    #[test]
    fn constructors_are_methods() {
        let root = normalize_java("class A {\n    A(int x) {}\n}\n").value;
        let constructor = child(child(&root, "A"), "A");
        assert_eq!(constructor.kind, NodeKind::Method);
        assert_eq!(constructor.meta(meta::CONSTRUCT), Some("constructor"));
        assert_eq!(constructor.meta(meta::SIGNATURE), Some("A(int x)"));
    }

    #[test]
    fn multiple_declarators_get_their_own_spans() {
        let root = normalize_java("class P {\n    @Deprecated int x, y;\n}\n").value;
        let p = child(&root, "P");
        let x = child(p, "x");
        let y = child(p, "y");
        assert!(x.span.precedes(&y.span));
        assert!(x.children.is_empty());
    }

    #[test]
    fn anonymous_classes_are_unnamed() {
        let code = "class Main {\n    void run() {\n        Runnable r = new Runnable() {\n            public void run() {}\n        };\n    }\n}\n";
        let root = normalize_java(code).value;
        let run = child(child(&root, "Main"), "run");
        assert_eq!(run.children.len(), 1);
        let anonymous = &run.children[0];
        assert_eq!(anonymous.kind, NodeKind::Class);
        assert_eq!(anonymous.name, None);
        assert_eq!(anonymous.meta(meta::SIGNATURE), Some("new Runnable()"));
        assert_eq!(child(anonymous, "run").kind, NodeKind::Method);
    }

    #[test]
    fn enums_interfaces_and_records() {
        let code = "enum Color { RED, GREEN; int code() { return 0; } }\ninterface Shape { int SIDES = 4; double area(); }\nrecord Pair(int left, int right) {}\n";
        let root = normalize_java(code).value;

        let color = child(&root, "Color");
        assert_eq!(color.meta(meta::CONSTRUCT), Some("enum"));
        let members: Vec<_> = color.children.iter().map(|c| (c.kind, c.name.as_deref())).collect();
        assert_eq!(
            members,
            [
                (NodeKind::Attribute, Some("RED")),
                (NodeKind::Attribute, Some("GREEN")),
                (NodeKind::Method, Some("code")),
            ]
        );

        let shape = child(&root, "Shape");
        assert_eq!(child(shape, "SIDES").kind, NodeKind::Attribute);
        assert_eq!(child(shape, "area").meta(meta::SIGNATURE), Some("double area()"));

        let pair = child(&root, "Pair");
        assert_eq!(pair.meta(meta::CONSTRUCT), Some("record"));
        assert_eq!(child(pair, "left").meta(meta::CONSTRUCT), Some("record_component"));
    }
}
