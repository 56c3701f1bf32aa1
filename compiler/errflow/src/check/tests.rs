use pretty_assertions::assert_eq;

use errflow_facts::DispatchStore;
use errflow_ir::{CasePattern, Expr, FuncRef, Lit, Ty, Unit};

use super::{check_function, FunctionCheck};
use crate::config::AnalysisConfig;
use crate::summarize::summarize_unit;
use crate::test_helpers::{
    assign, call_err, call_with, case, facts_of, format_error, func_lit, global, if_, is_error,
    loop_, ret, scope_of, sentinel, store_unit, switch, var, FnBuilder, APP, STORE,
};

/// The store unit plus `Wrap(err) error`, `RunWith(fn) error` and
/// `Handle(err)` checking both sentinels.
fn store_with_helpers() -> Unit {
    let mut unit = store_unit();
    unit.functions.push(
        FnBuilder::func(STORE, "Wrap")
            .param(0, Ty::Error)
            .returns_error()
            .body(vec![ret(vec![var(0)])])
            .build(),
    );
    unit.functions.push(
        FnBuilder::func(STORE, "RunWith")
            .param(0, Ty::func(vec![], vec![Ty::Error]))
            .returns_error()
            .body(vec![ret(vec![crate::test_helpers::invoke(0, 1)])])
            .build(),
    );
    unit.functions.push(
        FnBuilder::func(STORE, "Handle")
            .param(0, Ty::Error)
            .body(vec![
                if_(is_error(var(0), global(STORE, "ErrOne")), vec![], None),
                if_(Expr::eq(var(0), global(STORE, "ErrTwo")), vec![], None),
            ])
            .build(),
    );
    unit
}

fn two(arg: &str, span: u32) -> Expr {
    call_err(&FuncRef::func(STORE, "Two"), vec![Expr::str(arg)], span)
}

fn always() -> Expr {
    Expr::Lit(Lit::Bool(true))
}

/// Check `app.Caller` against the store unit's facts.
fn check_caller(caller: errflow_ir::Function) -> FunctionCheck {
    let app = Unit {
        globals: vec![sentinel(APP, "ErrX", true)],
        functions: vec![caller],
        ..Unit::new(APP)
    };
    let facts = facts_of(&[store_with_helpers()]);
    let config = AnalysisConfig::new();
    let scope = scope_of(&app, &config, &facts);
    let dispatch = DispatchStore::new();
    let summaries = summarize_unit(&scope, &dispatch);
    let func = app
        .function(&FuncRef::func(APP, "Caller"))
        .unwrap_or_else(|| panic!("no Caller"));
    check_function(func, &scope, &summaries, &dispatch)
}

/// `(span start, message)` of every report.
fn reports(check: &FunctionCheck) -> Vec<(u32, String)> {
    let mut reports: Vec<(u32, String)> = check
        .diagnostics
        .iter()
        .map(|(_, diag)| (diag.span.start, diag.message.clone()))
        .collect();
    reports.sort();
    reports
}

fn unhandled(unit: &str, name: &str) -> String {
    format!("error {unit}.{name} is neither checked nor propagated")
}

#[test]
fn partially_discriminated_result_reports_the_rest() {
    let caller = FnBuilder::func(APP, "Caller")
        .body(vec![
            assign(&[0], two("x", 10)),
            if_(is_error(var(0), global(STORE, "ErrOne")), vec![], None),
        ])
        .build();

    let check = check_caller(caller);

    assert_eq!(reports(&check), vec![(10, unhandled(STORE, "ErrTwo"))]);
    assert!(check.misses.is_empty());
}

#[test]
fn returning_the_result_propagates_everything() {
    let caller = FnBuilder::func(APP, "Caller")
        .returns_error()
        .body(vec![assign(&[0], two("x", 10)), ret(vec![var(0)])])
        .build();

    assert_eq!(reports(&check_caller(caller)), vec![]);
}

#[test]
fn returning_without_an_error_result_propagates_nothing() {
    let caller = FnBuilder::func(APP, "Caller")
        .returns(vec![Ty::Int])
        .body(vec![assign(&[0], two("x", 10)), ret(vec![Expr::Lit(Lit::Int(0))])])
        .build();

    assert_eq!(
        reports(&check_caller(caller)),
        vec![(10, unhandled(STORE, "ErrOne")), (10, unhandled(STORE, "ErrTwo"))]
    );
}

#[test]
fn parameter_flow_transfers_the_obligation() {
    let wrap = FuncRef::func(STORE, "Wrap");
    let direct = FnBuilder::func(APP, "Caller")
        .returns_error()
        .body(vec![
            assign(&[0], two("x", 10)),
            ret(vec![call_err(&wrap, vec![var(0)], 20)]),
        ])
        .build();
    assert_eq!(reports(&check_caller(direct)), vec![]);

    // the wrapped result carries the identities of its argument
    let rebound = FnBuilder::func(APP, "Caller")
        .body(vec![
            assign(&[0], two("x", 10)),
            assign(&[1], call_err(&wrap, vec![var(0)], 20)),
            if_(is_error(var(1), global(STORE, "ErrOne")), vec![], None),
        ])
        .build();
    assert_eq!(reports(&check_caller(rebound)), vec![(20, unhandled(STORE, "ErrTwo"))]);
}

#[test]
fn inline_callback_errors_are_reported_at_the_call() {
    let run_with = FuncRef::func(STORE, "RunWith");
    let caller = FnBuilder::func(APP, "Caller")
        .body(vec![assign(
            &[0],
            call_err(&run_with, vec![func_lit(vec![ret(vec![global(APP, "ErrX")])])], 30),
        )])
        .build();

    assert_eq!(reports(&check_caller(caller)), vec![(30, unhandled(APP, "ErrX"))]);
}

#[test]
fn branches_merge_optimistically() {
    let caller = FnBuilder::func(APP, "Caller")
        .body(vec![
            assign(&[0], two("x", 10)),
            if_(
                always(),
                vec![if_(is_error(var(0), global(STORE, "ErrOne")), vec![], None)],
                Some(vec![if_(
                    Expr::eq(var(0), global(STORE, "ErrTwo")),
                    vec![],
                    None,
                )]),
            ),
        ])
        .build();

    assert_eq!(reports(&check_caller(caller)), vec![]);
}

#[test]
fn reassignment_flushes_the_previous_binding() {
    let caller = FnBuilder::func(APP, "Caller")
        .body(vec![
            assign(&[0], two("x", 10)),
            assign(&[0], two("y", 20)),
            if_(is_error(var(0), global(STORE, "ErrOne")), vec![], None),
            if_(Expr::eq(var(0), global(STORE, "ErrTwo")), vec![], None),
        ])
        .build();

    assert_eq!(
        reports(&check_caller(caller)),
        vec![(10, unhandled(STORE, "ErrOne")), (10, unhandled(STORE, "ErrTwo"))]
    );
}

#[test]
fn narrowing_case_propagates_only_its_identity() {
    let narrowed = FnBuilder::func(APP, "Caller")
        .returns_error()
        .body(vec![
            assign(&[0], two("x", 10)),
            switch(
                Some(var(0)),
                vec![case(
                    vec![CasePattern::Value(global(STORE, "ErrOne"))],
                    vec![ret(vec![var(0)])],
                )],
            ),
            ret(vec![Expr::Nil]),
        ])
        .build();
    assert_eq!(reports(&check_caller(narrowed)), vec![(10, unhandled(STORE, "ErrTwo"))]);

    let with_default = FnBuilder::func(APP, "Caller")
        .returns_error()
        .body(vec![
            assign(&[0], two("x", 10)),
            switch(
                Some(var(0)),
                vec![
                    case(vec![CasePattern::Value(global(STORE, "ErrOne"))], vec![]),
                    case(vec![], vec![ret(vec![var(0)])]),
                ],
            ),
            ret(vec![Expr::Nil]),
        ])
        .build();
    assert_eq!(reports(&check_caller(with_default)), vec![]);
}

#[test]
fn reraise_with_wrap_verb_propagates() {
    let wrapped = FnBuilder::func(APP, "Caller")
        .returns_error()
        .body(vec![
            assign(&[0], two("x", 10)),
            ret(vec![format_error("load: %w", vec![var(0)], 20)]),
        ])
        .build();
    assert_eq!(reports(&check_caller(wrapped)), vec![]);

    let rebound = FnBuilder::func(APP, "Caller")
        .returns_error()
        .body(vec![
            assign(&[0], two("x", 10)),
            assign(&[0], format_error("load: %w", vec![var(0)], 20)),
            ret(vec![var(0)]),
        ])
        .build();
    assert_eq!(reports(&check_caller(rebound)), vec![]);

    let formatted = FnBuilder::func(APP, "Caller")
        .returns_error()
        .body(vec![
            assign(&[0], two("x", 10)),
            ret(vec![format_error("load: %v", vec![var(0)], 20)]),
        ])
        .build();
    assert_eq!(
        reports(&check_caller(formatted)),
        vec![(10, unhandled(STORE, "ErrOne")), (10, unhandled(STORE, "ErrTwo"))]
    );
}

#[test]
fn literal_discharges_captured_bindings() {
    let caller = FnBuilder::func(APP, "Caller")
        .body(vec![
            assign(&[0], two("x", 10)),
            assign(
                &[1],
                func_lit(vec![
                    if_(is_error(var(0), global(STORE, "ErrOne")), vec![], None),
                    ret(vec![Expr::Nil]),
                ]),
            ),
        ])
        .build();

    assert_eq!(reports(&check_caller(caller)), vec![(10, unhandled(STORE, "ErrTwo"))]);
}

#[test]
fn checked_parameters_discharge_at_the_call() {
    let handle = FuncRef::func(STORE, "Handle");
    let caller = FnBuilder::func(APP, "Caller")
        .body(vec![
            assign(&[0], two("x", 10)),
            errflow_ir::Stmt::Expr(call_with(&handle, vec![var(0)], vec![], 20)),
        ])
        .build();

    assert_eq!(reports(&check_caller(caller)), vec![]);
}

#[test]
fn loop_bodies_report_once() {
    let caller = FnBuilder::func(APP, "Caller")
        .body(vec![loop_(vec![
            assign(&[0], two("x", 10)),
            if_(is_error(var(0), global(STORE, "ErrOne")), vec![], None),
        ])])
        .build();

    assert_eq!(reports(&check_caller(caller)), vec![(10, unhandled(STORE, "ErrTwo"))]);
}

#[test]
fn aliasing_moves_the_binding() {
    let caller = FnBuilder::func(APP, "Caller")
        .returns_error()
        .body(vec![
            assign(&[0], two("x", 10)),
            assign(&[1], var(0)),
            ret(vec![var(1)]),
        ])
        .build();

    assert_eq!(reports(&check_caller(caller)), vec![]);
}

#[test]
fn unexported_local_identities_are_enforced() {
    let hidden = FnBuilder::func(APP, "hidden")
        .returns_error()
        .body(vec![ret(vec![global(APP, "errLocal")])])
        .build();
    let caller = FnBuilder::func(APP, "Caller")
        .body(vec![assign(
            &[0],
            call_err(&FuncRef::func(APP, "hidden"), vec![], 40),
        )])
        .build();
    let app = Unit {
        globals: vec![sentinel(APP, "errLocal", false)],
        functions: vec![hidden, caller],
        ..Unit::new(APP)
    };
    let facts = facts_of(&[]);
    let config = AnalysisConfig::new();
    let scope = scope_of(&app, &config, &facts);
    let dispatch = DispatchStore::new();
    let summaries = summarize_unit(&scope, &dispatch);
    let func = app
        .function(&FuncRef::func(APP, "Caller"))
        .unwrap_or_else(|| panic!("no Caller"));

    let check = check_function(func, &scope, &summaries, &dispatch);

    assert_eq!(reports(&check), vec![(40, unhandled(APP, "errLocal"))]);
}
