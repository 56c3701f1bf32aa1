//! Host frontend interface for the errflow analysis.
//!
//! errflow does not parse or type-check anything. A host frontend lowers
//! each compilation unit into the structures defined here:
//!
//! - **[`Unit`]**: declarations of one compilation unit: unit-level
//!   globals, concrete types with their method sets, interfaces, functions,
//!   plus the types and interfaces of dependencies visible from the unit.
//! - **Typed AST** ([`Block`], [`Stmt`], [`Expr`], [`Call`]): the statement
//!   view of each function body, consumed by the syntax-directed return walk
//!   and the call-site checker.
//! - **Value-dataflow graph** ([`ValueGraph`], [`ValueKind`]): the SSA-like
//!   view, consumed by backward value tracing.
//!
//! [`Unit::validate`] rejects input the analysis cannot work with; that is
//! the only failure mode attributable to the host.

pub mod ast;
pub mod dataflow;
mod span;
mod ty;
mod unit;
mod validate;
pub mod visitor;

pub use ast::{BinOp, Block, Builtin, Call, Callee, CasePattern, Expr, FuncLit, Lit, Stmt, SwitchCase};
pub use dataflow::{GraphCallee, ReturnInst, ValueGraph, ValueId, ValueKind};
pub use span::Span;
pub use ty::{Signature, Ty, TypeRef};
pub use unit::{
    FuncRef, Function, GlobalDecl, GlobalRef, InterfaceDecl, InterfaceMethod, LocalId, MethodDecl,
    Param, Receiver, TypeDecl, Unit,
};
pub use validate::IrError;
