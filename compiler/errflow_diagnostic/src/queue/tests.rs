use pretty_assertions::assert_eq;

use errflow_ir::Span;

use crate::{DedupKey, Diagnostic, DiagnosticQueue};

fn key(unit: &str, start: u32, id: &str) -> DedupKey {
    (unit.to_owned(), Span::new(start, start + 1), id.to_owned())
}

#[test]
fn duplicate_key_is_rejected() {
    let mut queue = DiagnosticQueue::new();
    let diag = Diagnostic::new("app", Span::new(3, 4), "first");
    assert!(queue.push(key("app", 3, "lib.ErrA"), diag.clone()));
    assert!(!queue.push(key("app", 3, "lib.ErrA"), diag));
    assert_eq!(queue.len(), 1);
}

#[test]
fn same_span_different_identity_is_kept() {
    let mut queue = DiagnosticQueue::new();
    queue.push(key("app", 3, "lib.ErrA"), Diagnostic::new("app", Span::new(3, 4), "a"));
    queue.push(key("app", 3, "lib.ErrB"), Diagnostic::new("app", Span::new(3, 4), "b"));
    assert_eq!(queue.len(), 2);
}

#[test]
fn flush_sorts_and_keeps_dedup_memory() {
    let mut queue = DiagnosticQueue::new();
    queue.push(key("b", 1, "x"), Diagnostic::new("b", Span::new(1, 2), "late unit"));
    queue.push(key("a", 9, "x"), Diagnostic::new("a", Span::new(9, 10), "second"));
    queue.push(key("a", 2, "x"), Diagnostic::new("a", Span::new(2, 3), "first"));

    let flushed = queue.flush();
    let messages: Vec<&str> = flushed.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second", "late unit"]);
    assert!(queue.is_empty());

    assert!(!queue.push(key("a", 2, "x"), Diagnostic::new("a", Span::new(2, 3), "again")));
}

#[test]
fn display_includes_unit_and_span() {
    let diag = Diagnostic::new("app", Span::new(4, 8), "boom");
    assert_eq!(diag.to_string(), "app:4..8: boom");
}
