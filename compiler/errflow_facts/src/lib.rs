//! Cross-unit knowledge for the errflow analysis.
//!
//! This crate provides:
//!
//! - **Identities and keys** ([`ErrorIdentity`], [`EntityKey`]): what is
//!   tracked, and the stable identifiers facts are attached to.
//! - **Fact records** ([`Fact`] and friends): the persisted, serde-encoded
//!   descriptions of an entity's error-flow behavior.
//! - **Summaries** ([`FunctionSummary`], [`aggregate`]): the in-memory
//!   lattice the summarizer iterates on, with union for reachability and
//!   intersection for the flow-style facts.
//! - **Stores**: [`FactStore`] over the host's opaque [`BlobStore`], the
//!   process-wide [`DispatchStore`], and the [`DeferredQueue`].

mod dispatch;
pub mod facts;
mod identity;
mod store;
pub mod summary;

pub use dispatch::{Deferred, DeferredQueue, DispatchEntry, DispatchKey, DispatchStore};
pub use facts::{
    CallbackFlowFact, CheckedParam, CheckedParamFact, ErrorIdentityFact, Fact, FactKind, Flow,
    FunctionErrorFact, ParameterFlowFact, ReachedIdentity,
};
pub use identity::{EntityKey, ErrorIdentity};
pub use store::{BlobFactStore, BlobStore, FactError, FactStore, MemoryBlobStore};
pub use summary::{aggregate, CheckedSummary, ErrorSummary, FlowSummary, FunctionSummary};
