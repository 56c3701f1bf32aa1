//! Shared test utilities: unit, function and AST builders.
//!
//! Units built here pass [`Unit::validate`]: every declaration belongs to
//! the unit it is placed in, and [`FnBuilder::build`] sizes the locals
//! table to cover every local the body mentions. Only compiled in test
//! builds.

use errflow_facts::{ErrorIdentity, FactStore, MemoryBlobStore};
use errflow_ir::visitor::{walk_block, Visitor};
use errflow_ir::{
    Block, Builtin, Call, Callee, Expr, FuncLit, FuncRef, Function, GlobalDecl, GlobalRef,
    InterfaceDecl, InterfaceMethod, LocalId, MethodDecl, Param, Receiver, Signature, Span, Stmt,
    SwitchCase, Ty, TypeDecl, TypeRef, Unit, ValueGraph,
};

use crate::config::AnalysisConfig;
use crate::detect::detect_declarations;
use crate::scope::UnitScope;

pub(crate) const STORE: &str = "example.com/store";
pub(crate) const APP: &str = "example.com/app";

/// Shorthand for `LocalId::new(n)`.
pub(crate) fn l(n: u32) -> LocalId {
    LocalId::new(n)
}

/// `Expr::Local` of local `n`.
pub(crate) fn var(n: u32) -> Expr {
    Expr::Local(LocalId::new(n))
}

/// One-byte span at `at`.
pub(crate) fn at(at: u32) -> Span {
    Span::new(at, at + 1)
}

pub(crate) fn id(unit: &str, name: &str) -> ErrorIdentity {
    ErrorIdentity::new(unit, name)
}

// ── Declarations ────────────────────────────────────────────

/// `var Name = NewError("name")`.
pub(crate) fn sentinel(unit: &str, name: &str, exported: bool) -> GlobalDecl {
    GlobalDecl {
        global: GlobalRef::new(unit, name),
        exported,
        init: Some(new_error(name, 0)),
        span: Span::DUMMY,
    }
}

/// A type with `Error() string` on a pointer receiver.
pub(crate) fn err_type(unit: &str, name: &str, exported: bool) -> TypeDecl {
    TypeDecl {
        ty: TypeRef::new(unit, name),
        exported,
        methods: vec![MethodDecl {
            name: "Error".to_owned(),
            receiver: Receiver::Pointer,
            sig: Signature::new(vec![], vec![Ty::String]),
        }],
    }
}

/// An interface with one method `method() error`.
pub(crate) fn fetcher_iface(unit: &str, name: &str, method: &str) -> InterfaceDecl {
    InterfaceDecl {
        ty: TypeRef::new(unit, name),
        exported: true,
        methods: vec![InterfaceMethod {
            name: method.to_owned(),
            sig: Signature::new(vec![], vec![Ty::Error]),
        }],
    }
}

/// A concrete type whose only method is `method() error`.
pub(crate) fn fetcher_type(unit: &str, name: &str, method: &str) -> TypeDecl {
    TypeDecl {
        ty: TypeRef::new(unit, name),
        exported: true,
        methods: vec![MethodDecl {
            name: method.to_owned(),
            receiver: Receiver::Pointer,
            sig: Signature::new(vec![], vec![Ty::Error]),
        }],
    }
}

// ── Expressions ─────────────────────────────────────────────

pub(crate) fn global(unit: &str, name: &str) -> Expr {
    Expr::Global(GlobalRef::new(unit, name))
}

/// `&T{}`.
pub(crate) fn composite(unit: &str, name: &str) -> Expr {
    Expr::AddrOf(Box::new(Expr::Composite {
        ty: TypeRef::new(unit, name),
    }))
}

fn call_expr(callee: Callee, args: Vec<Expr>, results: Vec<Ty>, span: u32) -> Expr {
    Expr::call(Call {
        callee,
        receiver: None,
        args,
        results,
        span: at(span),
    })
}

/// Static call to a function returning only `error`.
pub(crate) fn call_err(func: &FuncRef, args: Vec<Expr>, span: u32) -> Expr {
    call_expr(Callee::Static(func.clone()), args, vec![Ty::Error], span)
}

/// Static call with explicit result types.
pub(crate) fn call_with(func: &FuncRef, args: Vec<Expr>, results: Vec<Ty>, span: u32) -> Expr {
    call_expr(Callee::Static(func.clone()), args, results, span)
}

/// Interface call `receiver.method()` returning `error`.
pub(crate) fn dyn_call_err(iface: &TypeRef, method: &str, receiver: Expr, span: u32) -> Expr {
    Expr::call(Call {
        callee: Callee::Dynamic {
            iface: iface.clone(),
            method: method.to_owned(),
        },
        receiver: Some(receiver),
        args: vec![],
        results: vec![Ty::Error],
        span: at(span),
    })
}

/// Invocation of a function-typed local returning `error`.
pub(crate) fn invoke(local: u32, span: u32) -> Expr {
    call_expr(Callee::Local(l(local)), vec![], vec![Ty::Error], span)
}

pub(crate) fn new_error(msg: &str, span: u32) -> Expr {
    call_expr(
        Callee::Builtin(Builtin::NewError),
        vec![Expr::str(msg)],
        vec![Ty::Error],
        span,
    )
}

pub(crate) fn format_error(template: &str, args: Vec<Expr>, span: u32) -> Expr {
    let mut all = vec![Expr::str(template)];
    all.extend(args);
    call_expr(Callee::Builtin(Builtin::FormatError), all, vec![Ty::Error], span)
}

/// `IsError(value, target)`.
pub(crate) fn is_error(value: Expr, target: Expr) -> Expr {
    call_expr(
        Callee::Builtin(Builtin::IsError),
        vec![value, target],
        vec![Ty::Bool],
        0,
    )
}

/// `AsError(value, &target)`.
pub(crate) fn as_error(value: Expr, target: u32) -> Expr {
    call_expr(
        Callee::Builtin(Builtin::AsError),
        vec![value, Expr::AddrOf(Box::new(var(target)))],
        vec![Ty::Bool],
        0,
    )
}

/// `func() error { body }`.
pub(crate) fn func_lit(body: Vec<Stmt>) -> Expr {
    Expr::FuncLit(Box::new(FuncLit {
        params: vec![],
        results: vec![Ty::Error],
        body: Block::new(body),
        span: Span::DUMMY,
    }))
}

// ── Statements ──────────────────────────────────────────────

/// `a, b := value`.
pub(crate) fn assign(targets: &[u32], value: Expr) -> Stmt {
    Stmt::Assign {
        targets: targets.iter().map(|&t| Some(l(t))).collect(),
        value,
        span: Span::DUMMY,
    }
}

pub(crate) fn ret(values: Vec<Expr>) -> Stmt {
    Stmt::Return {
        values,
        span: Span::DUMMY,
    }
}

pub(crate) fn if_(cond: Expr, then: Vec<Stmt>, otherwise: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If {
        init: None,
        cond,
        then_block: Block::new(then),
        else_block: otherwise.map(Block::new),
        span: Span::DUMMY,
    }
}

pub(crate) fn switch(subject: Option<Expr>, cases: Vec<SwitchCase>) -> Stmt {
    Stmt::Switch {
        init: None,
        subject,
        cases,
        span: Span::DUMMY,
    }
}

pub(crate) fn case(patterns: Vec<errflow_ir::CasePattern>, body: Vec<Stmt>) -> SwitchCase {
    SwitchCase {
        patterns,
        body: Block::new(body),
    }
}

pub(crate) fn loop_(body: Vec<Stmt>) -> Stmt {
    Stmt::Loop {
        body: Block::new(body),
        span: Span::DUMMY,
    }
}

// ── Functions ───────────────────────────────────────────────

/// Builder for [`Function`]s. Exported iff the name starts uppercase.
pub(crate) struct FnBuilder {
    func: Function,
}

impl FnBuilder {
    pub(crate) fn func(unit: &str, name: &str) -> Self {
        Self::with_ref(FuncRef::func(unit, name))
    }

    /// A method; the receiver is local `receiver` of type `*Recv`.
    pub(crate) fn method(unit: &str, recv: &str, name: &str, receiver: u32) -> Self {
        let mut builder = Self::with_ref(FuncRef::method(unit, recv, name));
        builder.func.receiver = Some(Param::new(receiver, Ty::ptr_to(TypeRef::new(unit, recv))));
        builder.set_local(receiver, Ty::ptr_to(TypeRef::new(unit, recv)));
        builder
    }

    fn with_ref(func: FuncRef) -> Self {
        let exported = func.name.starts_with(char::is_uppercase);
        FnBuilder {
            func: Function {
                func,
                exported,
                span: Span::DUMMY,
                receiver: None,
                params: vec![],
                results: vec![],
                locals: vec![],
                body: None,
                graph: None,
            },
        }
    }

    fn set_local(&mut self, local: u32, ty: Ty) {
        let index = local as usize;
        if self.func.locals.len() <= index {
            self.func.locals.resize(index + 1, Ty::Opaque);
        }
        self.func.locals[index] = ty;
    }

    pub(crate) fn param(mut self, local: u32, ty: Ty) -> Self {
        self.set_local(local, ty.clone());
        self.func.params.push(Param::new(local, ty));
        self
    }

    pub(crate) fn local(mut self, local: u32, ty: Ty) -> Self {
        self.set_local(local, ty);
        self
    }

    pub(crate) fn returns(mut self, results: Vec<Ty>) -> Self {
        self.func.results = results;
        self
    }

    pub(crate) fn returns_error(self) -> Self {
        self.returns(vec![Ty::Error])
    }

    pub(crate) fn body(mut self, stmts: Vec<Stmt>) -> Self {
        self.func.body = Some(Block::new(stmts));
        self
    }

    pub(crate) fn graph(mut self, graph: ValueGraph) -> Self {
        self.func.graph = Some(graph);
        self
    }

    pub(crate) fn build(mut self) -> Function {
        let mut max = MaxLocal(None);
        if let Some(body) = &self.func.body {
            walk_block(&mut max, body);
        }
        if let Some(highest) = max.0 {
            let needed = highest.index() + 1;
            if self.func.locals.len() < needed {
                self.func.locals.resize(needed, Ty::Opaque);
            }
        }
        self.func
    }
}

struct MaxLocal(Option<LocalId>);

impl Visitor<'_> for MaxLocal {
    fn visit_local(&mut self, local: LocalId) {
        if self.0.map_or(true, |max| local > max) {
            self.0 = Some(local);
        }
    }
}

// ── Units and scopes ────────────────────────────────────────

/// `store` unit: exported sentinels `ErrOne` and `ErrTwo`, and
/// `Two(id string) error` returning `ErrOne` for `""` and `ErrTwo` for
/// `"x"`.
pub(crate) fn store_unit() -> Unit {
    let two = FnBuilder::func(STORE, "Two")
        .param(0, Ty::String)
        .returns_error()
        .body(vec![
            if_(
                Expr::eq(var(0), Expr::str("")),
                vec![ret(vec![global(STORE, "ErrOne")])],
                None,
            ),
            if_(
                Expr::eq(var(0), Expr::str("x")),
                vec![ret(vec![global(STORE, "ErrTwo")])],
                None,
            ),
            ret(vec![Expr::Nil]),
        ])
        .build();
    Unit {
        globals: vec![
            sentinel(STORE, "ErrOne", true),
            sentinel(STORE, "ErrTwo", true),
        ],
        functions: vec![two],
        ..Unit::new(STORE)
    }
}

/// Resolve a scope for `unit`, panicking on store failures.
pub(crate) fn scope_of<'a>(
    unit: &'a Unit,
    config: &'a AnalysisConfig,
    store: &dyn FactStore,
) -> UnitScope<'a> {
    let decls = detect_declarations(unit, config);
    UnitScope::build(unit, config, decls, store)
        .unwrap_or_else(|e| panic!("scope of {}: {e}", unit.path))
}

/// A fact store holding what `units` export, analyzed in order.
pub(crate) fn facts_of(units: &[Unit]) -> errflow_facts::BlobFactStore<MemoryBlobStore> {
    let mut session = crate::Session::new(AnalysisConfig::new(), MemoryBlobStore::new());
    session
        .run(units)
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    session.into_facts()
}
