//! Compilation units and their declarations.

use std::fmt;

use crate::ast::{Block, Expr};
use crate::dataflow::ValueGraph;
use crate::span::Span;
use crate::ty::{Signature, Ty, TypeRef};

/// Local variable ID within one function (function literals included).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct LocalId(u32);

impl LocalId {
    /// Create a new local ID from a raw index.
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

/// Reference to unit-level storage: `unit.Name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalRef {
    pub unit: String,
    pub name: String,
}

impl GlobalRef {
    pub fn new(unit: impl Into<String>, name: impl Into<String>) -> Self {
        GlobalRef {
            unit: unit.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.unit, self.name)
    }
}

/// Reference to a function or to a method of a concrete type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncRef {
    pub unit: String,
    /// Receiver type name for methods.
    pub receiver: Option<String>,
    pub name: String,
}

impl FuncRef {
    pub fn func(unit: impl Into<String>, name: impl Into<String>) -> Self {
        FuncRef {
            unit: unit.into(),
            receiver: None,
            name: name.into(),
        }
    }

    pub fn method(unit: impl Into<String>, receiver: impl Into<String>, name: impl Into<String>) -> Self {
        FuncRef {
            unit: unit.into(),
            receiver: Some(receiver.into()),
            name: name.into(),
        }
    }

    #[inline]
    pub fn is_method(&self) -> bool {
        self.receiver.is_some()
    }
}

impl fmt::Display for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.receiver {
            Some(recv) => write!(f, "{}.{}.{}", self.unit, recv, self.name),
            None => write!(f, "{}.{}", self.unit, self.name),
        }
    }
}

/// A parameter bound to a local.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Param {
    pub local: LocalId,
    pub ty: Ty,
}

impl Param {
    pub fn new(local: u32, ty: Ty) -> Self {
        Param {
            local: LocalId::new(local),
            ty,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Receiver {
    Value,
    Pointer,
}

/// A method in a declared type's method set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub receiver: Receiver,
    pub sig: Signature,
}

/// A declared concrete type with its methods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDecl {
    pub ty: TypeRef,
    pub exported: bool,
    pub methods: Vec<MethodDecl>,
}

impl TypeDecl {
    /// Find a method in the pointer method set (value and pointer receivers).
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Reference to the concrete method `name` of this type.
    pub fn method_ref(&self, name: &str) -> FuncRef {
        FuncRef::method(self.ty.unit.clone(), self.ty.name.clone(), name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceMethod {
    pub name: String,
    pub sig: Signature,
}

/// A declared interface (abstract type).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceDecl {
    pub ty: TypeRef,
    pub exported: bool,
    pub methods: Vec<InterfaceMethod>,
}

/// Unit-level constant or variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalDecl {
    pub global: GlobalRef,
    pub exported: bool,
    pub init: Option<Expr>,
    pub span: Span,
}

/// A function or method with its body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub func: FuncRef,
    pub exported: bool,
    pub span: Span,
    pub receiver: Option<Param>,
    pub params: Vec<Param>,
    pub results: Vec<Ty>,
    /// Types of every local, indexed by [`LocalId::index`].
    pub locals: Vec<Ty>,
    /// `None` for declarations without a body.
    pub body: Option<Block>,
    /// `None` when the host did not build a dataflow graph.
    pub graph: Option<ValueGraph>,
}

impl Function {
    /// The signature, receiver excluded.
    pub fn signature(&self) -> Signature {
        Signature::new(
            self.params.iter().map(|p| p.ty.clone()).collect(),
            self.results.clone(),
        )
    }

    /// Whether at least one result slot carries an error.
    pub fn has_error_result(&self) -> bool {
        self.results.iter().any(Ty::is_error)
    }

    /// Whether at least one parameter carries an error.
    pub fn has_error_param(&self) -> bool {
        self.params.iter().any(|p| p.ty.is_error())
    }

    /// Index of `local` among the ordinary parameters (receiver excluded).
    pub fn param_index(&self, local: LocalId) -> Option<usize> {
        self.params.iter().position(|p| p.local == local)
    }

    /// Number of graph parameters that precede ordinary parameters.
    #[inline]
    pub fn receiver_offset(&self) -> usize {
        usize::from(self.receiver.is_some())
    }

    /// Type of a local, if in range.
    pub fn local_ty(&self, local: LocalId) -> Option<&Ty> {
        self.locals.get(local.index())
    }
}

/// One compilation unit as handed over by the host frontend.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Unit {
    /// Stable unit path, e.g. `example.com/store`.
    pub path: String,
    pub globals: Vec<GlobalDecl>,
    pub types: Vec<TypeDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub functions: Vec<Function>,
    /// Concrete types of dependencies visible from this unit.
    pub imported_types: Vec<TypeDecl>,
    /// Interfaces of dependencies referenced by this unit.
    pub imported_interfaces: Vec<InterfaceDecl>,
}

impl Unit {
    pub fn new(path: impl Into<String>) -> Self {
        Unit {
            path: path.into(),
            ..Unit::default()
        }
    }

    /// Look up a function of this unit.
    pub fn function(&self, func: &FuncRef) -> Option<&Function> {
        self.functions.iter().find(|f| &f.func == func)
    }

    /// Look up a declared or imported concrete type.
    pub fn type_decl(&self, ty: &TypeRef) -> Option<&TypeDecl> {
        self.types
            .iter()
            .chain(&self.imported_types)
            .find(|decl| &decl.ty == ty)
    }

    /// Look up a declared or imported interface.
    pub fn interface(&self, ty: &TypeRef) -> Option<&InterfaceDecl> {
        self.interfaces
            .iter()
            .chain(&self.imported_interfaces)
            .find(|decl| &decl.ty == ty)
    }

    /// Every concrete type in visible scope.
    pub fn visible_types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.types.iter().chain(&self.imported_types)
    }

    /// Every interface in reach.
    pub fn reachable_interfaces(&self) -> impl Iterator<Item = &InterfaceDecl> {
        self.interfaces.iter().chain(&self.imported_interfaces)
    }
}
