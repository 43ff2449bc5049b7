//! Java extraction through the public API.

mod common;

use common::{assert_table_invariants, extract, outline, paths};
use tessera::{DiagnosticKind, SymbolKind};

const ACCOUNT: &str = r"package bank;

/** A bank account. */
public class Account {
    private long balance;

    /** Opens an empty account. */
    public Account() {
        this.balance = 0;
    }

    @Override
    public String toString() {
        return String.valueOf(balance);
    }

    static class Ledger {
        int entries;
    }

    enum State { OPEN, CLOSED }
}
";

#[test]
fn classes_members_and_nested_types() {
    let output = extract("Account.java", ACCOUNT);
    let table = &output.symbol_table;

    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(
        outline(table),
        [
            ("Account".to_string(), SymbolKind::Class),
            ("Account.balance".to_string(), SymbolKind::Attribute),
            ("Account.Account".to_string(), SymbolKind::Method),
            ("Account.toString".to_string(), SymbolKind::Method),
            ("Account.Ledger".to_string(), SymbolKind::Class),
            ("Account.Ledger.entries".to_string(), SymbolKind::Attribute),
            ("Account.State".to_string(), SymbolKind::Class),
            ("Account.State.OPEN".to_string(), SymbolKind::Attribute),
            ("Account.State.CLOSED".to_string(), SymbolKind::Attribute),
        ]
    );
    assert_table_invariants(table);
}

#[test]
fn javadoc_annotations_and_signatures() {
    let output = extract("Account.java", ACCOUNT);
    let table = &output.symbol_table;

    let account = table.lookup("Account").expect("Account");
    assert_eq!(account.docstring.as_deref(), Some("A bank account."));
    assert_eq!(account.signature.as_deref(), Some("public class Account"));

    let constructor = table.lookup("Account.Account").expect("constructor");
    assert_eq!(constructor.docstring.as_deref(), Some("Opens an empty account."));
    assert_eq!(constructor.signature.as_deref(), Some("public Account()"));
    assert_eq!(constructor.meta("construct"), Some("constructor"));

    let to_string = table.lookup("Account.toString").expect("toString");
    assert_eq!(to_string.decorators, ["Override"]);
    assert_eq!(to_string.meta("return_type"), Some("String"));
    assert_eq!(to_string.span.start(), (12, 5));
}

#[test]
fn overloads_get_suffixed_paths() {
    let code = "class Printer {\n    void print(int x) {}\n    void print(String s) {}\n}\n";
    let output = extract("Printer.java", code);
    let table = &output.symbol_table;

    assert_eq!(paths(table), ["Printer", "Printer.print", "Printer.print#2"]);
    assert_eq!(output.count(DiagnosticKind::DuplicatePath), 1);
    assert_eq!(
        table
            .lookup("Printer.print#2")
            .and_then(|symbol| symbol.signature.as_deref()),
        Some("void print(String s)")
    );
    assert_table_invariants(table);
}

#[test]
fn anonymous_classes_get_placeholder_names() {
    let code = "class Main {\n    void run() {\n        Runnable r = new Runnable() {\n            public void run() {}\n        };\n    }\n}\n";
    let output = extract("Main.java", code);
    let table = &output.symbol_table;

    assert_eq!(
        outline(table),
        [
            ("Main".to_string(), SymbolKind::Class),
            ("Main.run".to_string(), SymbolKind::Method),
            ("Main.run.<anonymous-class-1>".to_string(), SymbolKind::Class),
            ("Main.run.<anonymous-class-1>.run".to_string(), SymbolKind::Method),
        ]
    );
    let anonymous = table.lookup("Main.run.<anonymous-class-1>").expect("anonymous");
    assert_eq!(anonymous.name, "<anonymous-class-1>");
    assert_eq!(anonymous.signature.as_deref(), Some("new Runnable()"));
    assert_table_invariants(table);
}

#[test]
fn interfaces_and_records() {
    let code = "interface Shape {\n    double area();\n}\n\nrecord Pair(int left, int right) {}\n";
    let output = extract("Shapes.java", code);
    assert_eq!(
        outline(&output.symbol_table),
        [
            ("Shape".to_string(), SymbolKind::Class),
            ("Shape.area".to_string(), SymbolKind::Method),
            ("Pair".to_string(), SymbolKind::Class),
            ("Pair.left".to_string(), SymbolKind::Attribute),
            ("Pair.right".to_string(), SymbolKind::Attribute),
        ]
    );
}
