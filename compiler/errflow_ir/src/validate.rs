//! Structural validation of host input.
//!
//! A unit that fails validation is a host frontend failure: the analysis of
//! that unit cannot proceed. Validation only checks what the analysis relies
//! on (ID ranges, ownership of declarations), not language-level typing.

use rustc_hash::FxHashSet;

use crate::dataflow::{ValueGraph, ValueId, ValueKind};
use crate::unit::{Function, LocalId, Unit};
use crate::visitor::{walk_block, Visitor};

/// Why a unit was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    #[error("unit has an empty path")]
    EmptyPath,

    #[error("duplicate function `{0}`")]
    DuplicateFunction(String),

    #[error("`{item}` is declared in unit `{unit}` but belongs to `{owner}`")]
    ForeignDeclaration {
        item: String,
        unit: String,
        owner: String,
    },

    #[error("function `{func}` references local {local} but declares only {count} locals")]
    LocalOutOfRange {
        func: String,
        local: u32,
        count: usize,
    },

    #[error("function `{func}`: value {value} reads undefined value {operand}")]
    DanglingValue {
        func: String,
        value: usize,
        operand: u32,
    },

    #[error("function `{func}`: return operand {operand} is undefined")]
    DanglingReturn { func: String, operand: u32 },

    #[error("function `{func}`: graph parameter {index} exceeds {count} parameters")]
    GraphParamOutOfRange {
        func: String,
        index: u32,
        count: usize,
    },

    #[error("function `{func}`: graph exceeds u32::MAX values")]
    GraphTooLarge { func: String },
}

impl Unit {
    /// Check that the unit is well-formed enough to analyze.
    pub fn validate(&self) -> Result<(), IrError> {
        if self.path.is_empty() {
            return Err(IrError::EmptyPath);
        }

        for decl in &self.globals {
            self.check_owner(&decl.global.unit, &decl.global.to_string())?;
        }
        for decl in &self.types {
            self.check_owner(&decl.ty.unit, &decl.ty.to_string())?;
        }
        for decl in &self.interfaces {
            self.check_owner(&decl.ty.unit, &decl.ty.to_string())?;
        }

        let mut seen = FxHashSet::default();
        for func in &self.functions {
            self.check_owner(&func.func.unit, &func.func.to_string())?;
            if !seen.insert(&func.func) {
                return Err(IrError::DuplicateFunction(func.func.to_string()));
            }
            validate_locals(func)?;
            if let Some(graph) = &func.graph {
                validate_graph(func, graph)?;
            }
        }
        Ok(())
    }

    fn check_owner(&self, owner: &str, item: &str) -> Result<(), IrError> {
        if owner == self.path {
            Ok(())
        } else {
            Err(IrError::ForeignDeclaration {
                item: item.to_owned(),
                unit: self.path.clone(),
                owner: owner.to_owned(),
            })
        }
    }
}

/// Collects the first local that is out of range.
struct LocalRange {
    count: usize,
    bad: Option<LocalId>,
}

impl Visitor<'_> for LocalRange {
    fn visit_local(&mut self, local: LocalId) {
        if self.bad.is_none() && local.index() >= self.count {
            self.bad = Some(local);
        }
    }
}

fn validate_locals(func: &Function) -> Result<(), IrError> {
    let mut range = LocalRange {
        count: func.locals.len(),
        bad: None,
    };
    for param in func.receiver.iter().chain(&func.params) {
        range.visit_local(param.local);
    }
    if let Some(body) = &func.body {
        walk_block(&mut range, body);
    }
    match range.bad {
        Some(local) => Err(IrError::LocalOutOfRange {
            func: func.func.to_string(),
            local: local.raw(),
            count: func.locals.len(),
        }),
        None => Ok(()),
    }
}

fn validate_graph(func: &Function, graph: &ValueGraph) -> Result<(), IrError> {
    let name = || func.func.to_string();
    if u32::try_from(graph.values.len()).is_err() {
        return Err(IrError::GraphTooLarge { func: name() });
    }

    let count = graph.values.len();
    let defined = |id: ValueId| id.index() < count;
    let param_count = func.params.len() + func.receiver_offset();

    for (value, kind) in graph.values.iter().enumerate() {
        if let ValueKind::Param(index) = kind {
            if *index as usize >= param_count {
                return Err(IrError::GraphParamOutOfRange {
                    func: name(),
                    index: *index,
                    count: param_count,
                });
            }
        }
        for operand in ValueGraph::operands(kind) {
            if !defined(operand) {
                return Err(IrError::DanglingValue {
                    func: name(),
                    value,
                    operand: operand.raw(),
                });
            }
        }
    }

    for ret in &graph.returns {
        for &operand in &ret.operands {
            if !defined(operand) {
                return Err(IrError::DanglingReturn {
                    func: name(),
                    operand: operand.raw(),
                });
            }
        }
    }
    Ok(())
}
