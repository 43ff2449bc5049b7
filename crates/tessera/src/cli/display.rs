//! Common display utilities for CLI commands.

use colored::Colorize;
use tessera::{Diagnostic, Severity, Span, Symbol, SymbolKind, SymbolTable};

const MAX_DISPLAY_DIAGNOSTICS: usize = 10;

/// `line:col` of a span start.
pub fn location(span: &Span) -> String {
    format!("{}:{}", span.start_line, span.start_col)
}

fn kind_label(kind: SymbolKind) -> colored::ColoredString {
    let label = format!("({kind})");
    match kind {
        SymbolKind::Class => label.yellow(),
        SymbolKind::Function | SymbolKind::Method => label.cyan(),
        SymbolKind::Module => label.magenta(),
        SymbolKind::Attribute | SymbolKind::Variable => label.dimmed(),
    }
}

/// One-line summary of a symbol.
pub fn symbol_line(symbol: &Symbol) -> String {
    format!(
        "{} {} {}",
        symbol.name.white().bold(),
        kind_label(symbol.kind),
        format!("- {}", location(&symbol.span)).dimmed()
    )
}

/// Print a table as an indented tree.
pub fn print_tree(table: &SymbolTable) {
    println!(
        "{} {}",
        table.source_id().white().bold(),
        format!("[{}]", table.language()).dimmed()
    );
    if let Some(doc) = table.docstring().and_then(|doc| doc.lines().next()) {
        println!("  {}", doc.dimmed());
    }

    let mut stack: Vec<_> = table
        .children(table.root().id)
        .map(|symbol| (symbol, 1usize))
        .collect();
    stack.reverse();
    while let Some((symbol, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        for decorator in &symbol.decorators {
            println!("{indent}{}", format!("@{decorator}").dimmed());
        }
        println!("{indent}{}", symbol_line(symbol));
        if let Some(signature) = &symbol.signature {
            println!("{indent}  {}", signature.dimmed());
        }
        let children: Vec<_> = table.children(symbol.id).collect();
        stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }
}

/// Print diagnostics with truncation.
pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics.iter().take(MAX_DISPLAY_DIAGNOSTICS) {
        let severity = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue(),
        };
        let at = diagnostic
            .span
            .map(|span| format!(" at {}", location(&span)))
            .unwrap_or_default();
        println!(
            "  {} {} {}{}: {}",
            "•".dimmed(),
            severity,
            format!("[{}]", diagnostic.kind).dimmed(),
            at,
            diagnostic.message
        );
    }
    if diagnostics.len() > MAX_DISPLAY_DIAGNOSTICS {
        println!(
            "  {} ... and {} more",
            "•".dimmed(),
            diagnostics.len() - MAX_DISPLAY_DIAGNOSTICS
        );
    }
}
