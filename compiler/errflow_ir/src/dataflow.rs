//! Value-dataflow graph: the SSA-like view of a function body.
//!
//! Every value is defined exactly once and referenced by [`ValueId`]. The
//! graph carries no control flow beyond merge points ([`ValueKind::Phi`]);
//! the summarizer only ever walks it backward from return operands.
//!
//! # Receiver convention
//!
//! For methods, parameter 0 of the graph is the receiver and ordinary
//! parameters start at 1. Calls to methods likewise pass the receiver as
//! argument 0. Flow summaries exclude the receiver, so the offset must be
//! added back when mapping a summary onto graph arguments.

use crate::ast::{Builtin, Lit};
use crate::ty::TypeRef;
use crate::unit::{FuncRef, GlobalRef};

/// Value ID within one [`ValueGraph`]. IDs are allocated sequentially
/// starting from 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    /// Create a new value ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The sealed node taxonomy of the value-dataflow graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// Incoming parameter `index` (receiver-inclusive numbering).
    Param(u32),
    /// Call result. For multi-result calls this is the result tuple.
    Call {
        callee: GraphCallee,
        args: Vec<ValueId>,
    },
    /// Component `index` of a multi-result call.
    Extract { tuple: ValueId, index: u32 },
    /// Merge of values from several predecessors.
    Phi(Vec<ValueId>),
    /// Load through a pointer.
    Deref(ValueId),
    /// Heap allocation of a declared type.
    Alloc(TypeRef),
    /// Address of unit-level storage.
    Global(GlobalRef),
    /// Conversion of a concrete value into an interface value.
    MakeInterface(ValueId),
    /// A function used as a value (including lifted function literals).
    Function(FuncRef),
    /// Address of an aggregate field. Tracing stops here.
    FieldAddr { base: ValueId, field: u32 },
    /// Collection lookup. Tracing stops here.
    Lookup { collection: ValueId, key: ValueId },
    Const(Lit),
    Nil,
    /// Anything the host does not model.
    Opaque,
}

/// Callee of a [`ValueKind::Call`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphCallee {
    Static(FuncRef),
    /// Interface dispatch; argument 0 is the interface value.
    Dynamic { iface: TypeRef, method: String },
    /// Indirect call through a function value.
    Value(ValueId),
    Builtin(Builtin),
}

/// One return instruction: its operands in result-slot order.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ReturnInst {
    pub operands: Vec<ValueId>,
}

/// The value-dataflow graph of one function.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ValueGraph {
    /// Value definitions, indexed by [`ValueId::index`].
    pub values: Vec<ValueKind>,
    pub returns: Vec<ReturnInst>,
}

impl ValueGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value definition and return its ID.
    pub fn push(&mut self, kind: ValueKind) -> ValueId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "graphs with more than u32::MAX values are rejected by validation"
        )]
        let id = ValueId::new(self.values.len() as u32);
        self.values.push(kind);
        id
    }

    /// Record a return instruction.
    pub fn ret(&mut self, operands: Vec<ValueId>) {
        self.returns.push(ReturnInst { operands });
    }

    /// Look up a value definition.
    #[inline]
    pub fn get(&self, id: ValueId) -> Option<&ValueKind> {
        self.values.get(id.index())
    }

    /// All value IDs a definition reads.
    pub fn operands(kind: &ValueKind) -> Vec<ValueId> {
        match kind {
            ValueKind::Call { callee, args } => {
                let mut ops = args.clone();
                if let GraphCallee::Value(f) = callee {
                    ops.push(*f);
                }
                ops
            }
            ValueKind::Extract { tuple, .. } => vec![*tuple],
            ValueKind::Phi(edges) => edges.clone(),
            ValueKind::Deref(v) | ValueKind::MakeInterface(v) => vec![*v],
            ValueKind::FieldAddr { base, .. } => vec![*base],
            ValueKind::Lookup { collection, key } => vec![*collection, *key],
            ValueKind::Param(_)
            | ValueKind::Alloc(_)
            | ValueKind::Global(_)
            | ValueKind::Function(_)
            | ValueKind::Const(_)
            | ValueKind::Nil
            | ValueKind::Opaque => Vec::new(),
        }
    }
}
