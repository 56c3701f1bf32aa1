//! Types as seen by the analysis.
//!
//! The host frontend resolves every type; errflow only needs to know which
//! slots carry errors, which carry functions, and which named type a value
//! has. Everything else collapses to [`Ty::Opaque`].

use std::fmt;

/// A reference to a declared (nominal) type: `unit.Name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    /// Path of the declaring compilation unit.
    pub unit: String,
    /// Declared name within that unit.
    pub name: String,
}

impl TypeRef {
    pub fn new(unit: impl Into<String>, name: impl Into<String>) -> Self {
        TypeRef {
            unit: unit.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.unit, self.name)
    }
}

/// A resolved type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// The error contract interface itself.
    Error,
    String,
    Bool,
    Int,
    /// A declared struct-like type.
    Named(TypeRef),
    /// A declared interface type other than the error contract.
    Interface(TypeRef),
    Pointer(Box<Ty>),
    Func(Box<Signature>),
    /// Anything the analysis does not distinguish.
    Opaque,
}

impl Ty {
    /// Shorthand for `Ty::Pointer(Box::new(Ty::Named(..)))`.
    pub fn ptr_to(ty: TypeRef) -> Ty {
        Ty::Pointer(Box::new(Ty::Named(ty)))
    }

    /// Shorthand for a function type.
    pub fn func(params: Vec<Ty>, results: Vec<Ty>) -> Ty {
        Ty::Func(Box::new(Signature::new(params, results)))
    }

    /// Whether a slot of this type carries an error value.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    /// The signature, if this is a function type.
    pub fn as_func(&self) -> Option<&Signature> {
        match self {
            Ty::Func(sig) => Some(sig),
            _ => None,
        }
    }

    /// The named type behind at most one level of pointer indirection.
    pub fn nominal(&self) -> Option<&TypeRef> {
        match self {
            Ty::Named(ty) => Some(ty),
            Ty::Pointer(inner) => match inner.as_ref() {
                Ty::Named(ty) => Some(ty),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A function or method signature (receiver excluded).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub params: Vec<Ty>,
    pub results: Vec<Ty>,
}

impl Signature {
    pub fn new(params: Vec<Ty>, results: Vec<Ty>) -> Self {
        Signature { params, results }
    }

    /// Indices of error-typed result slots.
    pub fn error_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, ty)| ty.is_error())
            .map(|(i, _)| i)
    }

    /// Whether at least one result slot carries an error.
    pub fn has_error_result(&self) -> bool {
        self.results.iter().any(Ty::is_error)
    }

    /// The error contract's method shape: no parameters, one `string` result.
    pub fn is_error_contract(&self) -> bool {
        self.params.is_empty() && self.results == [Ty::String]
    }
}
