//! Dispatch resolution and aggregation.
//!
//! For every interface in reach of a unit (declared or imported), the
//! concrete types in visible scope that satisfy it are its
//! implementations. A type satisfies an interface when every interface
//! method has a same-named method with an identical signature in the
//! type's pointer method set.
//!
//! The unit's own view ([`DispatchTable`]) is rebuilt from current
//! summaries on every fixpoint pass and read merged with the global
//! [`DispatchStore`] ([`DispatchView`]). After convergence the table is
//! published so that units importing only the interface can see it.
//!
//! The unit's own earlier publications are left out of the global side of
//! the view: they are the local table of a previous run.

use std::cell::RefCell;
use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use errflow_facts::{DispatchEntry, DispatchKey, DispatchStore, FunctionSummary};
use errflow_ir::{InterfaceDecl, TypeDecl};

use crate::env::DispatchSource;
use crate::scope::UnitScope;
use crate::summarize::UnitSummaries;

/// Whether `decl` structurally implements `iface`.
pub fn satisfies(decl: &TypeDecl, iface: &InterfaceDecl) -> bool {
    iface.methods.iter().all(|required| {
        decl.method(&required.name)
            .is_some_and(|method| method.sig == required.sig)
    })
}

/// Implementations of the abstract methods in reach of one unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchTable {
    entries: FxHashMap<DispatchKey, DispatchEntry>,
}

impl DispatchTable {
    /// Collect implementations with the summaries currently known for them.
    ///
    /// An implementation without any summary still counts, as an empty
    /// one: it contributes no identities and empties every intersection.
    pub fn build(scope: &UnitScope<'_>, summaries: &UnitSummaries) -> Self {
        let unit = scope.unit();
        let mut entries: FxHashMap<DispatchKey, DispatchEntry> = FxHashMap::default();

        for iface in unit.reachable_interfaces() {
            for decl in unit.visible_types().filter(|decl| satisfies(decl, iface)) {
                for method in &iface.methods {
                    let implementation = decl.method_ref(&method.name);
                    let summary = if implementation.unit == unit.path {
                        summaries.get(&implementation)
                    } else {
                        scope.imported_summary(&implementation)
                    };
                    let summary = summary.cloned().unwrap_or_default();
                    entries
                        .entry(DispatchKey::new(&iface.ty, method.name.clone()))
                        .or_default()
                        .merge(implementation, &summary);
                }
            }
        }

        DispatchTable { entries }
    }

    pub fn get(&self, key: &DispatchKey) -> Option<&DispatchEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge every implementation into the global store. Returns the number
    /// of keys that changed.
    pub fn publish(&self, store: &DispatchStore) -> usize {
        let mut changed = 0;
        for (key, entry) in &self.entries {
            let mut key_changed = false;
            for (implementation, summary) in entry.iter() {
                key_changed |= store.merge(key.clone(), implementation.clone(), summary);
            }
            changed += usize::from(key_changed);
        }
        tracing::debug!(keys = self.entries.len(), changed, "dispatch table published");
        changed
    }
}

/// Implementations of `key` published by units other than `unit`.
pub fn foreign_entry(
    store: &DispatchStore,
    key: &DispatchKey,
    unit: &str,
) -> Option<DispatchEntry> {
    store
        .entry(key)
        .map(|entry| entry.excluding_unit(unit))
        .filter(|entry| !entry.is_empty())
}

/// What a unit saw of the global store while it was summarized.
pub type DispatchReads = BTreeMap<DispatchKey, Option<DispatchEntry>>;

/// A unit's own dispatch table read together with what other units
/// published to the global store.
///
/// Every global read is remembered, so that the driver can tell when a
/// later publication makes the unit's summaries outdated.
pub struct DispatchView<'a> {
    local: &'a DispatchTable,
    global: &'a DispatchStore,
    unit: &'a str,
    reads: RefCell<DispatchReads>,
}

impl<'a> DispatchView<'a> {
    pub fn new(local: &'a DispatchTable, global: &'a DispatchStore, unit: &'a str) -> Self {
        DispatchView {
            local,
            global,
            unit,
            reads: RefCell::new(DispatchReads::new()),
        }
    }

    pub fn into_reads(self) -> DispatchReads {
        self.reads.into_inner()
    }
}

impl DispatchSource for DispatchView<'_> {
    fn dispatch_summary(&self, key: &DispatchKey) -> Option<FunctionSummary> {
        let foreign = foreign_entry(self.global, key, self.unit);
        self.reads.borrow_mut().insert(key.clone(), foreign.clone());
        match (self.local.get(key), foreign) {
            (None, None) => None,
            (Some(local), None) => Some(local.summary()),
            (None, Some(foreign)) => Some(foreign.summary()),
            (Some(local), Some(mut merged)) => {
                for (implementation, summary) in local.iter() {
                    merged.merge(implementation.clone(), summary);
                }
                Some(merged.summary())
            }
        }
    }
}
