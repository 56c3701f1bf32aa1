//! Declaration detection: which unit-level entities are error identities.
//!
//! Two shapes qualify:
//!
//! - **Sentinels**: unit-level globals initialized by a fixed-message
//!   constructor (`NewError("..")`), or by a format call whose template has
//!   no re-raise placeholder. The value's identity is then independent of
//!   any argument.
//! - **Error types**: declared types with a method `Error()` taking nothing
//!   and returning `string`, on a value or pointer receiver.
//!
//! Exported identities are published as [`ErrorIdentityFact`]s under the
//! declaring entity's key; unexported ones live only in [`Declarations`].

use std::collections::BTreeMap;

use errflow_facts::{EntityKey, ErrorIdentity, ErrorIdentityFact, Fact, FactError, FactStore};
use errflow_ir::{Builtin, Callee, Expr, GlobalRef, Lit, TypeDecl, TypeRef, Unit};

use crate::config::AnalysisConfig;
use crate::wrap::reraised_args;

/// Error identities declared by one unit, with their visibility.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Declarations {
    unit: String,
    /// Sentinel global name → exported.
    sentinels: BTreeMap<String, bool>,
    /// Error type name → exported.
    types: BTreeMap<String, bool>,
}

impl Declarations {
    pub fn new(unit: impl Into<String>) -> Self {
        Declarations {
            unit: unit.into(),
            ..Declarations::default()
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// The identity of global `name` of this unit, if it is a sentinel.
    pub fn sentinel(&self, name: &str) -> Option<ErrorIdentity> {
        self.sentinels
            .contains_key(name)
            .then(|| ErrorIdentity::new(self.unit.clone(), name))
    }

    /// The identity of type `name` of this unit, if it is an error type.
    pub fn error_type(&self, name: &str) -> Option<ErrorIdentity> {
        self.types
            .contains_key(name)
            .then(|| ErrorIdentity::new(self.unit.clone(), name))
    }

    /// Whether `identity` may appear in facts seen by other units.
    ///
    /// Identities of other units reached this unit through facts, so they
    /// are visible by construction.
    pub fn is_exported(&self, identity: &ErrorIdentity) -> bool {
        if identity.unit != self.unit {
            return true;
        }
        self.sentinels
            .get(&identity.name)
            .or_else(|| self.types.get(&identity.name))
            .copied()
            .unwrap_or(false)
    }

    /// Every declared identity, sentinels first, each group sorted by name.
    pub fn identities(&self) -> impl Iterator<Item = ErrorIdentity> + '_ {
        self.sentinels
            .keys()
            .chain(self.types.keys())
            .map(|name| ErrorIdentity::new(self.unit.clone(), name.clone()))
    }

    pub fn len(&self) -> usize {
        self.sentinels.len() + self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentinels.is_empty() && self.types.is_empty()
    }

    /// Publish every exported identity. Returns the number of facts written.
    pub fn export(&self, store: &mut dyn FactStore) -> Result<usize, FactError> {
        let mut written = 0;
        for (name, _) in self.sentinels.iter().filter(|(_, exported)| **exported) {
            let key = EntityKey::global(&GlobalRef::new(self.unit.clone(), name.clone()));
            store.export_fact(&key, Fact::ErrorIdentity(self.fact(name)))?;
            written += 1;
        }
        for (name, _) in self.types.iter().filter(|(_, exported)| **exported) {
            let key = EntityKey::type_decl(&TypeRef::new(self.unit.clone(), name.clone()));
            store.export_fact(&key, Fact::ErrorIdentity(self.fact(name)))?;
            written += 1;
        }
        Ok(written)
    }

    fn fact(&self, name: &str) -> ErrorIdentityFact {
        ErrorIdentityFact {
            name: name.to_owned(),
            unit: self.unit.clone(),
        }
    }
}

/// Find the error identities `unit` declares.
///
/// Ignored units declare nothing.
#[tracing::instrument(level = "debug", skip_all, fields(unit = %unit.path))]
pub fn detect_declarations(unit: &Unit, config: &AnalysisConfig) -> Declarations {
    let mut decls = Declarations::new(unit.path.clone());
    if config.is_ignored(&unit.path) {
        return decls;
    }

    for global in &unit.globals {
        if global.global.unit == unit.path && global.init.as_ref().is_some_and(is_sentinel_init) {
            decls.sentinels.insert(global.global.name.clone(), global.exported);
        }
    }
    for decl in &unit.types {
        if decl.ty.unit == unit.path && is_error_type(decl) {
            decls.types.insert(decl.ty.name.clone(), decl.exported);
        }
    }

    tracing::debug!(
        sentinels = decls.sentinels.len(),
        types = decls.types.len(),
        "declarations detected"
    );
    decls
}

/// Whether a global initializer builds an error whose identity does not
/// depend on any argument.
pub fn is_sentinel_init(init: &Expr) -> bool {
    let Expr::Call(call) = init else {
        return false;
    };
    match call.callee {
        Callee::Builtin(Builtin::NewError) => true,
        Callee::Builtin(Builtin::FormatError) => match call.args.first() {
            Some(Expr::Lit(Lit::Str(template))) => reraised_args(template).is_empty(),
            _ => false,
        },
        _ => false,
    }
}

/// Whether `decl` has the error contract's method in its pointer method set.
pub fn is_error_type(decl: &TypeDecl) -> bool {
    decl.method("Error")
        .is_some_and(|method| method.sig.is_error_contract())
}

#[cfg(test)]
mod tests;
