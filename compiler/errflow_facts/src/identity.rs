//! Error identities and the entity keys facts are attached to.

use std::fmt;

use errflow_ir::{FuncRef, GlobalRef, TypeRef};

/// A uniquely named error-producing entity: a sentinel value or a nominal
/// error type. Equality, ordering and hashing are by `(unit, name)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ErrorIdentity {
    /// Path of the defining unit.
    pub unit: String,
    pub name: String,
}

impl ErrorIdentity {
    pub fn new(unit: impl Into<String>, name: impl Into<String>) -> Self {
        ErrorIdentity {
            unit: unit.into(),
            name: name.into(),
        }
    }
}

impl From<&GlobalRef> for ErrorIdentity {
    fn from(global: &GlobalRef) -> Self {
        ErrorIdentity::new(global.unit.clone(), global.name.clone())
    }
}

impl From<&TypeRef> for ErrorIdentity {
    fn from(ty: &TypeRef) -> Self {
        ErrorIdentity::new(ty.unit.clone(), ty.name.clone())
    }
}

impl fmt::Display for ErrorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.unit, self.name)
    }
}

/// Stable cross-unit identifier of a declared entity.
///
/// `unit.Name` for globals, types and functions; `unit.Type.Method` for
/// methods.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn global(global: &GlobalRef) -> Self {
        EntityKey(global.to_string())
    }

    pub fn type_decl(ty: &TypeRef) -> Self {
        EntityKey(ty.to_string())
    }

    pub fn func(func: &FuncRef) -> Self {
        EntityKey(func.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
