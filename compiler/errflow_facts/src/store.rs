//! Fact store: cross-unit persistence of facts.
//!
//! The host owns persistence and exposes it as an opaque key→blob map
//! ([`BlobStore`]). [`BlobFactStore`] layers typed facts on top of it,
//! encoding each fact with bincode under the key `"{entity}#{kind}"`.
//!
//! # Store Layout
//!
//! ```text
//! example.com/store.ErrNotFound#error-identity   → ErrorIdentityFact
//! example.com/store.Get#function-error           → FunctionErrorFact
//! example.com/store.Mem.Get#parameter-flow       → ParameterFlowFact
//! ```

use rustc_hash::FxHashMap;

use crate::facts::{ErrorIdentityFact, Fact, FactKind};
use crate::summary::{CheckedSummary, ErrorSummary, FlowSummary, FunctionSummary};
use crate::EntityKey;

/// Failure to move a fact through the blob store.
#[derive(Debug, thiserror::Error)]
pub enum FactError {
    #[error("failed to encode {kind} fact for `{key}`: {source}")]
    Encode {
        key: String,
        kind: FactKind,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to decode {kind} fact for `{key}`: {source}")]
    Decode {
        key: String,
        kind: FactKind,
        #[source]
        source: bincode::Error,
    },

    #[error("blob for `{key}` holds a {found} fact, expected {expected}")]
    KindMismatch {
        key: String,
        expected: FactKind,
        found: FactKind,
    },
}

/// Typed fact persistence keyed by stable entity identifiers.
pub trait FactStore {
    /// Attach `fact` to `key`, replacing any fact of the same kind.
    fn export_fact(&mut self, key: &EntityKey, fact: Fact) -> Result<(), FactError>;

    /// Fetch the fact of `kind` attached to `key`, if any.
    fn import_fact(&self, key: &EntityKey, kind: FactKind) -> Result<Option<Fact>, FactError>;

    /// Fetch an exported error identity.
    fn import_identity(&self, key: &EntityKey) -> Result<Option<ErrorIdentityFact>, FactError> {
        match self.import_fact(key, FactKind::ErrorIdentity)? {
            Some(Fact::ErrorIdentity(fact)) => Ok(Some(fact)),
            Some(other) => Err(mismatch(key, FactKind::ErrorIdentity, &other)),
            None => Ok(None),
        }
    }

    /// Fetch every function fact of `key` as one summary. Missing facts
    /// leave the corresponding component empty. Returns `None` only when no
    /// function fact at all is attached.
    fn import_summary(&self, key: &EntityKey) -> Result<Option<FunctionSummary>, FactError> {
        let mut summary = FunctionSummary::default();
        let mut found = false;

        if let Some(fact) = self.import_fact(key, FactKind::FunctionError)? {
            let Fact::FunctionError(fact) = &fact else {
                return Err(mismatch(key, FactKind::FunctionError, &fact));
            };
            summary.errors = ErrorSummary::from_fact(fact);
            found = true;
        }
        if let Some(fact) = self.import_fact(key, FactKind::ParameterFlow)? {
            let Fact::ParameterFlow(fact) = &fact else {
                return Err(mismatch(key, FactKind::ParameterFlow, &fact));
            };
            summary.param_flows = FlowSummary::from_param_fact(fact);
            found = true;
        }
        if let Some(fact) = self.import_fact(key, FactKind::CallbackFlow)? {
            let Fact::CallbackFlow(fact) = &fact else {
                return Err(mismatch(key, FactKind::CallbackFlow, &fact));
            };
            summary.callback_flows = FlowSummary::from_callback_fact(fact);
            found = true;
        }
        if let Some(fact) = self.import_fact(key, FactKind::CheckedParam)? {
            let Fact::CheckedParam(fact) = &fact else {
                return Err(mismatch(key, FactKind::CheckedParam, &fact));
            };
            summary.checked = CheckedSummary::from_fact(fact);
            found = true;
        }

        Ok(found.then_some(summary))
    }
}

fn mismatch(key: &EntityKey, expected: FactKind, found: &Fact) -> FactError {
    FactError::KindMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

/// The host's opaque cross-unit persistence.
pub trait BlobStore {
    fn put(&mut self, key: String, blob: Vec<u8>);
    fn get(&self, key: &str) -> Option<&[u8]>;
}

/// In-process [`BlobStore`], for single-process drivers and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    blobs: FxHashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&mut self, key: String, blob: Vec<u8>) {
        self.blobs.insert(key, blob);
    }

    fn get(&self, key: &str) -> Option<&[u8]> {
        self.blobs.get(key).map(Vec::as_slice)
    }
}

/// [`FactStore`] over any [`BlobStore`], bincode-encoded.
#[derive(Clone, Debug, Default)]
pub struct BlobFactStore<B> {
    blobs: B,
}

impl<B: BlobStore> BlobFactStore<B> {
    pub fn new(blobs: B) -> Self {
        BlobFactStore { blobs }
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn into_inner(self) -> B {
        self.blobs
    }

    fn blob_key(key: &EntityKey, kind: FactKind) -> String {
        format!("{key}#{kind}")
    }
}

impl<B: BlobStore> FactStore for BlobFactStore<B> {
    fn export_fact(&mut self, key: &EntityKey, fact: Fact) -> Result<(), FactError> {
        let kind = fact.kind();
        let blob = bincode::serialize(&fact).map_err(|source| FactError::Encode {
            key: key.to_string(),
            kind,
            source,
        })?;
        tracing::trace!(entity = %key, %kind, bytes = blob.len(), "exporting fact");
        self.blobs.put(Self::blob_key(key, kind), blob);
        Ok(())
    }

    fn import_fact(&self, key: &EntityKey, kind: FactKind) -> Result<Option<Fact>, FactError> {
        let Some(blob) = self.blobs.get(&Self::blob_key(key, kind)) else {
            return Ok(None);
        };
        let fact: Fact = bincode::deserialize(blob).map_err(|source| FactError::Decode {
            key: key.to_string(),
            kind,
            source,
        })?;
        if fact.kind() == kind {
            Ok(Some(fact))
        } else {
            Err(mismatch(key, kind, &fact))
        }
    }
}

#[cfg(test)]
mod tests;
