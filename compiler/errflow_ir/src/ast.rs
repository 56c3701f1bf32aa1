//! Typed AST of function bodies.
//!
//! This is the statement-level view the host frontend hands over: enough
//! structure for the syntax-directed return walk and for the flow-sensitive
//! call-site checker. Names and types are already resolved; locals are
//! numbered densely per function ([`LocalId`]), and function literals share
//! the numbering of their enclosing function.

use crate::span::Span;
use crate::ty::{Ty, TypeRef};
use crate::unit::{FuncRef, GlobalRef, LocalId, Param};

/// A sequence of statements in execution order.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block { stmts }
    }
}

impl From<Vec<Stmt>> for Block {
    fn from(stmts: Vec<Stmt>) -> Self {
        Block { stmts }
    }
}

/// A statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// `a, b = value` (also covers short variable declarations).
    ///
    /// `None` targets are blank (`_`). A single call with several results
    /// binds result `i` to target `i`.
    Assign {
        targets: Vec<Option<LocalId>>,
        value: Expr,
        span: Span,
    },
    /// An expression evaluated for its effects.
    Expr(Expr),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
        span: Span,
    },
    /// Multi-way branch. A missing subject makes every case expression a
    /// boolean condition; a subject plus [`CasePattern::Type`] patterns is a
    /// type switch.
    Switch {
        init: Option<Box<Stmt>>,
        subject: Option<Expr>,
        cases: Vec<SwitchCase>,
        span: Span,
    },
    /// Any loop; the body may run zero or more times.
    Loop { body: Block, span: Span },
    Return { values: Vec<Expr>, span: Span },
    /// A nested lexical block.
    Block(Block),
}

/// One arm of a [`Stmt::Switch`]. No patterns means `default`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchCase {
    pub patterns: Vec<CasePattern>,
    pub body: Block,
}

impl SwitchCase {
    pub fn is_default(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CasePattern {
    /// A value compared against the subject, or a condition when the switch
    /// has no subject.
    Value(Expr),
    /// A type tested against the subject's dynamic type.
    Type(Ty),
}

/// An expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Local(LocalId),
    /// Reference to unit-level storage (possibly of another unit).
    Global(GlobalRef),
    /// A function used as a value.
    Func(FuncRef),
    Lit(Lit),
    Nil,
    Call(Box<Call>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    /// Composite literal of a declared type.
    Composite { ty: TypeRef },
    AddrOf(Box<Expr>),
    /// `value.(ty)`: the type-based extraction form.
    TypeAssert { value: Box<Expr>, ty: Ty },
    FuncLit(Box<FuncLit>),
    /// Field selection; the analysis never tracks through it.
    Field { base: Box<Expr>, name: String },
    /// Collection lookup; the analysis never tracks through it.
    Index { base: Box<Expr>, index: Box<Expr> },
}

impl Expr {
    pub fn call(call: Call) -> Expr {
        Expr::Call(Box::new(call))
    }

    pub fn str(s: impl Into<String>) -> Expr {
        Expr::Lit(Lit::Str(s.into()))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op: BinOp::Eq,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op: BinOp::Ne,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// The local this expression names directly, if any.
    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            Expr::Local(local) => Some(*local),
            _ => None,
        }
    }

    /// Strip address-of operators.
    pub fn peel_addr(&self) -> &Expr {
        let mut expr = self;
        while let Expr::AddrOf(inner) = expr {
            expr = inner;
        }
        expr
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lit {
    Str(String),
    Int(i64),
    Bool(bool),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Eq,
    Ne,
    And,
    Or,
    /// Arithmetic and ordering; irrelevant to error flow.
    Other,
}

/// A call expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub callee: Callee,
    /// The receiver of a method call (static or dynamic).
    pub receiver: Option<Expr>,
    /// Arguments, receiver excluded.
    pub args: Vec<Expr>,
    /// Result types as resolved by the frontend.
    pub results: Vec<Ty>,
    pub span: Span,
}

impl Call {
    /// Indices of error-typed result slots.
    pub fn error_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, ty)| ty.is_error())
            .map(|(i, _)| i)
    }

    /// Whether the call has at least one error-typed result.
    pub fn returns_error(&self) -> bool {
        self.results.iter().any(Ty::is_error)
    }
}

/// What a call invokes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Callee {
    /// A function or a method on a concrete type.
    Static(FuncRef),
    /// A method called through an interface value.
    Dynamic { iface: TypeRef, method: String },
    /// A function-typed local or parameter.
    Local(LocalId),
    Builtin(Builtin),
}

/// Error-handling primitives the frontend recognizes by name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Fixed-message constructor: `NewError("msg")`.
    NewError,
    /// Template formatter: `FormatError("ctx: %w", err)`.
    FormatError,
    /// Identity test: `IsError(err, Sentinel)`.
    IsError,
    /// Type extraction: `AsError(err, &target)`.
    AsError,
}

/// A function literal (closure).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuncLit {
    pub params: Vec<Param>,
    pub results: Vec<Ty>,
    pub body: Block,
    pub span: Span,
}

impl FuncLit {
    pub fn has_error_result(&self) -> bool {
        self.results.iter().any(Ty::is_error)
    }
}
