//! Fact records exchanged between compilation units.
//!
//! These are the persisted shapes. They round-trip through the host's blob
//! store unchanged; the in-memory lattice forms live in [`crate::summary`].

use std::fmt;

use crate::ErrorIdentity;

/// An exported error identity, attached to its declaring entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ErrorIdentityFact {
    pub name: String,
    pub unit: String,
}

impl ErrorIdentityFact {
    pub fn identity(&self) -> ErrorIdentity {
        ErrorIdentity::new(self.unit.clone(), self.name.clone())
    }
}

/// One identity reachable at a return slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ReachedIdentity {
    pub unit: String,
    pub name: String,
    /// Opaquely re-raised rather than returned verbatim. Display only.
    pub wrapped: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct FunctionErrorFact {
    pub identities: Vec<ReachedIdentity>,
}

/// A flow from parameter `index` (receiver excluded) to a return slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Flow {
    pub index: u32,
    pub wrapped: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct ParameterFlowFact {
    pub flows: Vec<Flow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct CallbackFlowFact {
    pub flows: Vec<Flow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CheckedParam {
    pub index: u32,
    pub identities: Vec<ErrorIdentity>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct CheckedParamFact {
    pub per_index: Vec<CheckedParam>,
}

/// Any fact, as stored.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Fact {
    ErrorIdentity(ErrorIdentityFact),
    FunctionError(FunctionErrorFact),
    ParameterFlow(ParameterFlowFact),
    CallbackFlow(CallbackFlowFact),
    CheckedParam(CheckedParamFact),
}

impl Fact {
    pub fn kind(&self) -> FactKind {
        match self {
            Fact::ErrorIdentity(_) => FactKind::ErrorIdentity,
            Fact::FunctionError(_) => FactKind::FunctionError,
            Fact::ParameterFlow(_) => FactKind::ParameterFlow,
            Fact::CallbackFlow(_) => FactKind::CallbackFlow,
            Fact::CheckedParam(_) => FactKind::CheckedParam,
        }
    }
}

/// Discriminant of [`Fact`], used as the second half of a store key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FactKind {
    ErrorIdentity,
    FunctionError,
    ParameterFlow,
    CallbackFlow,
    CheckedParam,
}

impl FactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FactKind::ErrorIdentity => "error-identity",
            FactKind::FunctionError => "function-error",
            FactKind::ParameterFlow => "parameter-flow",
            FactKind::CallbackFlow => "callback-flow",
            FactKind::CheckedParam => "checked-param",
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
