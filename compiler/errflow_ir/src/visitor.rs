//! AST visitor.
//!
//! Default implementations call `walk_*` functions that traverse children.
//! Override `visit_*` methods to add behavior at specific nodes and call the
//! matching `walk_*` to keep descending.

use crate::ast::{Block, Call, Callee, CasePattern, Expr, FuncLit, Stmt};
use crate::unit::LocalId;

pub trait Visitor<'ast> {
    fn visit_block(&mut self, block: &'ast Block) {
        walk_block(self, block);
    }

    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        walk_expr(self, expr);
    }

    fn visit_call(&mut self, call: &'ast Call) {
        walk_call(self, call);
    }

    fn visit_func_lit(&mut self, lit: &'ast FuncLit) {
        walk_func_lit(self, lit);
    }

    /// Called for every local mentioned anywhere (reads, writes, callees,
    /// literal parameters).
    fn visit_local(&mut self, local: LocalId) {
        let _ = local;
    }
}

pub fn walk_block<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, block: &'ast Block) {
    for stmt in &block.stmts {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, stmt: &'ast Stmt) {
    match stmt {
        Stmt::Assign { targets, value, .. } => {
            for local in targets.iter().flatten() {
                visitor.visit_local(*local);
            }
            visitor.visit_expr(value);
        }
        Stmt::Expr(expr) => visitor.visit_expr(expr),
        Stmt::If {
            init,
            cond,
            then_block,
            else_block,
            ..
        } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            visitor.visit_expr(cond);
            visitor.visit_block(then_block);
            if let Some(else_block) = else_block {
                visitor.visit_block(else_block);
            }
        }
        Stmt::Switch {
            init,
            subject,
            cases,
            ..
        } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            if let Some(subject) = subject {
                visitor.visit_expr(subject);
            }
            for case in cases {
                for pattern in &case.patterns {
                    if let CasePattern::Value(expr) = pattern {
                        visitor.visit_expr(expr);
                    }
                }
                visitor.visit_block(&case.body);
            }
        }
        Stmt::Loop { body, .. } => visitor.visit_block(body),
        Stmt::Return { values, .. } => {
            for value in values {
                visitor.visit_expr(value);
            }
        }
        Stmt::Block(block) => visitor.visit_block(block),
    }
}

pub fn walk_expr<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, expr: &'ast Expr) {
    match expr {
        Expr::Local(local) => visitor.visit_local(*local),
        Expr::Call(call) => visitor.visit_call(call),
        Expr::Binary { lhs, rhs, .. } => {
            visitor.visit_expr(lhs);
            visitor.visit_expr(rhs);
        }
        Expr::Not(inner) | Expr::AddrOf(inner) => visitor.visit_expr(inner),
        Expr::TypeAssert { value, .. } => visitor.visit_expr(value),
        Expr::FuncLit(lit) => visitor.visit_func_lit(lit),
        Expr::Field { base, .. } => visitor.visit_expr(base),
        Expr::Index { base, index } => {
            visitor.visit_expr(base);
            visitor.visit_expr(index);
        }
        Expr::Global(_) | Expr::Func(_) | Expr::Lit(_) | Expr::Nil | Expr::Composite { .. } => {}
    }
}

pub fn walk_call<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, call: &'ast Call) {
    if let Callee::Local(local) = &call.callee {
        visitor.visit_local(*local);
    }
    if let Some(receiver) = &call.receiver {
        visitor.visit_expr(receiver);
    }
    for arg in &call.args {
        visitor.visit_expr(arg);
    }
}

pub fn walk_func_lit<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, lit: &'ast FuncLit) {
    for param in &lit.params {
        visitor.visit_local(param.local);
    }
    visitor.visit_block(&lit.body);
}
