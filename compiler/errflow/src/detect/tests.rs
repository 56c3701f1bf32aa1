use pretty_assertions::assert_eq;

use errflow_facts::{
    BlobFactStore, EntityKey, ErrorIdentityFact, FactStore, MemoryBlobStore,
};
use errflow_ir::{GlobalDecl, GlobalRef, MethodDecl, Receiver, Signature, Span, Ty, TypeRef, Unit};

use super::{detect_declarations, is_sentinel_init};
use crate::config::AnalysisConfig;
use crate::test_helpers::{err_type, format_error, id, new_error, sentinel, var, STORE};

fn unit_with(globals: Vec<GlobalDecl>, types: Vec<errflow_ir::TypeDecl>) -> Unit {
    Unit {
        globals,
        types,
        ..Unit::new(STORE)
    }
}

#[test]
fn fixed_message_constructors_are_sentinels() {
    assert!(is_sentinel_init(&new_error("boom", 0)));
    assert!(is_sentinel_init(&format_error("no placeholder %d", vec![], 0)));
    assert!(!is_sentinel_init(&format_error("wraps %w", vec![var(0)], 0)));
    assert!(!is_sentinel_init(&errflow_ir::Expr::str("not an error")));
}

#[test]
fn only_the_construction_call_itself_is_a_sentinel() {
    let unit = unit_with(
        vec![
            sentinel(STORE, "ErrBase", true),
            // an alias of another sentinel declares nothing new
            GlobalDecl {
                global: GlobalRef::new(STORE, "ErrAlias"),
                exported: true,
                init: Some(errflow_ir::Expr::Global(GlobalRef::new(STORE, "ErrBase"))),
                span: Span::DUMMY,
            },
            // neither does a pointer to a constructed error
            GlobalDecl {
                global: GlobalRef::new(STORE, "ErrPtr"),
                exported: true,
                init: Some(errflow_ir::Expr::AddrOf(Box::new(new_error("ptr", 0)))),
                span: Span::DUMMY,
            },
        ],
        vec![],
    );
    let decls = detect_declarations(&unit, &AnalysisConfig::new());

    assert_eq!(decls.identities().collect::<Vec<_>>(), vec![id(STORE, "ErrBase")]);
}

#[test]
fn detects_sentinels_and_error_types() {
    let unit = unit_with(
        vec![
            sentinel(STORE, "ErrNotFound", true),
            sentinel(STORE, "errInternal", false),
            GlobalDecl {
                global: GlobalRef::new(STORE, "Limit"),
                exported: true,
                init: Some(errflow_ir::Expr::Lit(errflow_ir::Lit::Int(3))),
                span: Span::DUMMY,
            },
        ],
        vec![err_type(STORE, "TimeoutError", true)],
    );

    let decls = detect_declarations(&unit, &AnalysisConfig::new());

    assert_eq!(
        decls.identities().collect::<Vec<_>>(),
        vec![
            id(STORE, "ErrNotFound"),
            id(STORE, "errInternal"),
            id(STORE, "TimeoutError"),
        ]
    );
    assert_eq!(decls.sentinel("Limit"), None);
    assert_eq!(decls.error_type("TimeoutError"), Some(id(STORE, "TimeoutError")));
    assert!(decls.is_exported(&id(STORE, "ErrNotFound")));
    assert!(!decls.is_exported(&id(STORE, "errInternal")));
    assert!(decls.is_exported(&id("example.com/other", "errAnything")));
}

#[test]
fn error_method_must_match_the_contract() {
    let mut wrong = err_type(STORE, "Almost", true);
    wrong.methods = vec![MethodDecl {
        name: "Error".to_owned(),
        receiver: Receiver::Value,
        sig: Signature::new(vec![Ty::Int], vec![Ty::String]),
    }];
    let mut value_receiver = err_type(STORE, "ByValue", true);
    value_receiver.methods[0].receiver = Receiver::Value;

    let decls = detect_declarations(
        &unit_with(vec![], vec![wrong, value_receiver]),
        &AnalysisConfig::new(),
    );

    assert_eq!(decls.identities().collect::<Vec<_>>(), vec![id(STORE, "ByValue")]);
}

#[test]
fn exports_only_exported_identities() {
    let unit = unit_with(
        vec![
            sentinel(STORE, "ErrNotFound", true),
            sentinel(STORE, "errInternal", false),
        ],
        vec![err_type(STORE, "TimeoutError", true)],
    );
    let decls = detect_declarations(&unit, &AnalysisConfig::new());
    let mut store = BlobFactStore::new(MemoryBlobStore::new());

    let written = decls
        .export(&mut store)
        .unwrap_or_else(|e| panic!("export failed: {e}"));

    assert_eq!(written, 2);
    let fact = store
        .import_identity(&EntityKey::global(&GlobalRef::new(STORE, "ErrNotFound")))
        .unwrap_or_else(|e| panic!("import failed: {e}"));
    assert_eq!(
        fact,
        Some(ErrorIdentityFact {
            name: "ErrNotFound".to_owned(),
            unit: STORE.to_owned(),
        })
    );
    let hidden = store
        .import_identity(&EntityKey::global(&GlobalRef::new(STORE, "errInternal")))
        .unwrap_or_else(|e| panic!("import failed: {e}"));
    assert_eq!(hidden, None);
    let ty = store
        .import_identity(&EntityKey::type_decl(&TypeRef::new(STORE, "TimeoutError")))
        .unwrap_or_else(|e| panic!("import failed: {e}"));
    assert!(ty.is_some());
}

#[test]
fn ignored_units_declare_nothing() {
    let unit = unit_with(vec![sentinel(STORE, "ErrNotFound", true)], vec![]);
    let config = AnalysisConfig::with_ignore_list("example.com");

    assert!(detect_declarations(&unit, &config).is_empty());
}

#[test]
fn empty_unit_declares_nothing() {
    let decls = detect_declarations(&Unit::new(STORE), &AnalysisConfig::new());
    assert!(decls.is_empty());
    assert_eq!(decls.unit(), STORE);
}
