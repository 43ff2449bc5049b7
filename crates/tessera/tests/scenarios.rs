//! End-to-end extraction scenarios across the whole pipeline.

mod common;

use common::{assert_table_invariants, extract, extractor, outline};
use tessera::{DiagnosticKind, ExtractionInput, Language, SymbolKind};

const SCENARIO_A: &str = r#"def my_func(param):
    """Do the thing."""
    return param


class MyClass:
    """A class."""

    def __init__(self, name):
        """Store the name."""
        self.name = name

    def greet(self):
        return "hi " + self.name
"#;

#[test]
fn module_functions_classes_and_methods() {
    let output = extract("scenario_a.py", SCENARIO_A);
    let table = &output.symbol_table;

    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(table.language(), Language::Python);
    assert_eq!(
        outline(table),
        [
            ("my_func".to_string(), SymbolKind::Function),
            ("MyClass".to_string(), SymbolKind::Class),
            ("MyClass.__init__".to_string(), SymbolKind::Method),
            ("MyClass.greet".to_string(), SymbolKind::Method),
        ]
    );

    let docstring = |path: &str| {
        table
            .lookup(path)
            .and_then(|symbol| symbol.docstring.as_deref())
    };
    assert_eq!(docstring("my_func"), Some("Do the thing."));
    assert_eq!(docstring("MyClass"), Some("A class."));
    assert_eq!(docstring("MyClass.__init__"), Some("Store the name."));
    assert_eq!(docstring("MyClass.greet"), None);
    assert_table_invariants(table);
}

#[test]
fn syntax_error_in_method_body_keeps_the_declarations() {
    let code = "class Greeter:\n    def greet(self, name):\n        return name +\n";
    let output = extract("scenario_b.py", code);
    let table = &output.symbol_table;

    let greeter = table.lookup("Greeter").expect("class survives");
    assert_eq!(greeter.kind, SymbolKind::Class);
    let greet = table.lookup("Greeter.greet").expect("method survives");
    assert_eq!(greet.kind, SymbolKind::Method);
    assert_eq!(greet.signature.as_deref(), Some("def greet(self, name)"));

    assert_eq!(output.count(DiagnosticKind::SyntaxError), 1);
    let error = output
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::SyntaxError)
        .expect("syntax error");
    let span = error.span.expect("syntax errors carry a span");
    assert!(span.start_line <= 3 && 3 <= span.end_line, "span {span}");
    assert!(output.has_errors());
    assert_table_invariants(table);
}

#[test]
fn empty_source_yields_an_empty_table() {
    for code in ["", "\u{feff}"] {
        let output = extract("empty.py", code);
        assert!(output.symbol_table.is_empty());
        assert!(output.diagnostics.is_empty());
        assert_eq!(output.symbol_table.language(), Language::Python);
    }
}

#[test]
fn comment_only_source_has_no_symbols() {
    let output = extract("notes.rs", "// nothing to see\n/* still nothing */\n");
    assert!(output.symbol_table.is_empty());
    assert!(output.diagnostics.is_empty());
}

#[test]
fn unsupported_hint_reports_once_and_skips_parsing() {
    let input = ExtractionInput::text("script.py", "def f():\n    pass\n").with_hint("cobol");
    let output = extractor().extract(&input);

    assert!(output.symbol_table.is_empty());
    assert_eq!(output.symbol_table.language(), Language::Unknown);
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].kind, DiagnosticKind::UnsupportedLanguage);
}

#[test]
fn unknown_extension_without_hint_is_unsupported() {
    let output = extract("notes.txt", "plain text\n");
    assert_eq!(output.count(DiagnosticKind::UnsupportedLanguage), 1);
    assert!(output.symbol_table.is_empty());
}

#[test]
fn shebang_classifies_extensionless_scripts() {
    let output = extract("bin/tool", "#!/usr/bin/env python3\ndef main():\n    pass\n");
    assert_eq!(output.symbol_table.language(), Language::Python);
    assert!(output.symbol_table.lookup("main").is_some());
}

#[test]
fn invalid_utf8_is_an_io_error() {
    let input = ExtractionInput::bytes("broken.py", vec![0x64, 0x65, 0x66, 0xff, 0xfe]);
    let output = extractor().extract(&input);
    assert_eq!(output.count(DiagnosticKind::IoError), 1);
    assert!(output.symbol_table.is_empty());
}

#[test]
fn unavailable_content_is_an_io_error() {
    let input = ExtractionInput::unavailable("gone.java", "permission denied");
    let output = extractor().extract(&input);
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].kind, DiagnosticKind::IoError);
    assert!(output.diagnostics[0].message.contains("permission denied"));
}

#[test]
fn extraction_is_deterministic() {
    let input = ExtractionInput::text("scenario_a.py", SCENARIO_A);
    let first = serde_json::to_string(&extractor().extract(&input).to_record()).expect("json");
    let second = serde_json::to_string(&extractor().extract(&input).to_record()).expect("json");
    assert_eq!(first, second);
}

#[test]
fn serialized_output_uses_camel_case_and_omits_the_root() {
    let output = extract("scenario_a.py", SCENARIO_A);
    let value = serde_json::to_value(output.to_record()).expect("json");

    let symbols = value["symbolTable"]["symbols"]
        .as_array()
        .expect("symbols array");
    assert_eq!(symbols.len(), 4);
    assert_eq!(symbols[0]["qualifiedPath"], "my_func");
    assert_eq!(symbols[0]["kind"], "function");
    assert_eq!(value["symbolTable"]["language"], "python");
    assert!(value["diagnostics"].as_array().is_some_and(Vec::is_empty));
}
