//! Process-wide dispatch-summary store and deferred-recheck queue.
//!
//! A unit that only imports an abstract type cannot see the units that
//! implement it. Implementations are therefore published here as each unit
//! is processed, and consumers that found no entry queue their function for
//! a later recheck.
//!
//! Both structures are shared across units, possibly analyzed on several
//! threads, and are guarded by a `parking_lot::Mutex`. Lock scopes never
//! call back into analysis code.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use errflow_ir::{FuncRef, TypeRef};

use crate::summary::{aggregate, FunctionSummary};

/// `(abstract type unit, abstract type name, method name)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchKey {
    pub unit: String,
    pub iface: String,
    pub method: String,
}

impl DispatchKey {
    pub fn new(iface: &TypeRef, method: impl Into<String>) -> Self {
        DispatchKey {
            unit: iface.unit.clone(),
            iface: iface.name.clone(),
            method: method.into(),
        }
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.unit, self.iface, self.method)
    }
}

/// Known implementations of one abstract method.
///
/// Implementations accumulate (union) as units are processed; the
/// aggregated summary is recomputed on read, so intersection facts stay
/// correct when a later unit contributes an implementation that disagrees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchEntry {
    implementations: BTreeMap<FuncRef, FunctionSummary>,
}

impl DispatchEntry {
    /// Merge one implementation's summary; returns `true` if changed.
    pub fn merge(&mut self, implementation: FuncRef, summary: &FunctionSummary) -> bool {
        match self.implementations.get_mut(&implementation) {
            Some(existing) => existing.union(summary),
            None => {
                self.implementations.insert(implementation, summary.clone());
                true
            }
        }
    }

    pub fn implementations(&self) -> impl Iterator<Item = &FuncRef> {
        self.implementations.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FuncRef, &FunctionSummary)> {
        self.implementations.iter()
    }

    pub fn summary(&self) -> FunctionSummary {
        aggregate(self.implementations.values())
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    /// The implementations declared outside `unit`.
    #[must_use]
    pub fn excluding_unit(&self, unit: &str) -> DispatchEntry {
        DispatchEntry {
            implementations: self
                .implementations
                .iter()
                .filter(|(implementation, _)| implementation.unit != unit)
                .map(|(implementation, summary)| (implementation.clone(), summary.clone()))
                .collect(),
        }
    }
}

/// Global key→summary store for abstract methods.
#[derive(Debug, Default)]
pub struct DispatchStore {
    entries: Mutex<FxHashMap<DispatchKey, DispatchEntry>>,
}

impl DispatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish one implementation of `key`. Returns `true` if the store
    /// changed.
    pub fn merge(&self, key: DispatchKey, implementation: FuncRef, summary: &FunctionSummary) -> bool {
        let mut entries = self.entries.lock();
        let changed = entries
            .entry(key.clone())
            .or_default()
            .merge(implementation, summary);
        if changed {
            tracing::debug!(%key, "dispatch summary updated");
        }
        changed
    }

    /// The aggregated summary of `key`, or `None` if no implementation has
    /// been published yet.
    pub fn get(&self, key: &DispatchKey) -> Option<FunctionSummary> {
        self.entries.lock().get(key).map(DispatchEntry::summary)
    }

    /// A snapshot of the implementations published for `key`.
    pub fn entry(&self, key: &DispatchKey) -> Option<DispatchEntry> {
        self.entries.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &DispatchKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A function waiting for dispatch summaries that were missing when it was
/// checked.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Deferred {
    /// Path of the unit declaring the function.
    pub unit: String,
    pub func: FuncRef,
}

/// Work-list of deferred rechecks. Pushing an item already queued is a
/// no-op.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    inner: Mutex<QueueInner>,
}

#[derive(Debug, Default)]
struct QueueInner {
    items: Vec<Deferred>,
    queued: FxHashSet<Deferred>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `item`; returns `false` if it was already queued.
    pub fn push(&self, item: Deferred) -> bool {
        let mut inner = self.inner.lock();
        if !inner.queued.insert(item.clone()) {
            return false;
        }
        inner.items.push(item);
        true
    }

    /// Take every queued item, in insertion order.
    pub fn drain(&self) -> Vec<Deferred> {
        let mut inner = self.inner.lock();
        inner.queued.clear();
        std::mem::take(&mut inner.items)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}

#[cfg(test)]
mod tests;
