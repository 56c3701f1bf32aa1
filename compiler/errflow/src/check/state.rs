//! Per-variable obligation state threaded through the checker.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use errflow_facts::ErrorIdentity;
use errflow_ir::{LocalId, Span};

/// Sorted, deduplicated identities. Obligations rarely carry more than a
/// handful.
pub type IdentitySet = SmallVec<[ErrorIdentity; 4]>;

fn insert_sorted(set: &mut IdentitySet, identity: ErrorIdentity) -> bool {
    match set.binary_search(&identity) {
        Ok(_) => false,
        Err(pos) => {
            set.insert(pos, identity);
            true
        }
    }
}

/// Collect identities into a sorted set.
pub fn identity_set<'a>(identities: impl IntoIterator<Item = &'a ErrorIdentity>) -> IdentitySet {
    let mut set = IdentitySet::new();
    for identity in identities {
        insert_sorted(&mut set, identity.clone());
    }
    set
}

/// What one binding of a tracked variable still owes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Obligation {
    /// Position of the call whose result created the binding.
    pub origin: Span,
    pub errors: IdentitySet,
    pub discharged: IdentitySet,
    /// Inside a narrowing switch case: the identities forwarding the
    /// variable propagates.
    pub restricted: Option<IdentitySet>,
}

impl Obligation {
    pub fn new(origin: Span, errors: IdentitySet) -> Self {
        Obligation {
            origin,
            errors,
            discharged: IdentitySet::new(),
            restricted: None,
        }
    }

    /// Discharge `identity` if this binding carries it.
    pub fn discharge(&mut self, identity: &ErrorIdentity) -> bool {
        if self.errors.binary_search(identity).is_err() {
            return false;
        }
        insert_sorted(&mut self.discharged, identity.clone())
    }

    pub fn discharge_all(&mut self) {
        self.discharged = self.errors.clone();
    }

    /// Forward the binding to the caller: everything, or only the
    /// restricted identities inside a narrowing case.
    pub fn propagate(&mut self) {
        match self.restricted.clone() {
            Some(restricted) => {
                for identity in &restricted {
                    self.discharge(identity);
                }
            }
            None => self.discharge_all(),
        }
    }

    /// Narrow to `identity` for the current case.
    pub fn restrict(&mut self, identity: ErrorIdentity) {
        insert_sorted(self.restricted.get_or_insert_with(IdentitySet::new), identity);
    }

    /// Identities not discharged yet.
    pub fn remaining(&self) -> impl Iterator<Item = &ErrorIdentity> {
        self.errors
            .iter()
            .filter(|identity| self.discharged.binary_search(identity).is_err())
    }

    pub fn is_clear(&self) -> bool {
        self.remaining().next().is_none()
    }

    /// OR-merge: discharged on either side stays discharged.
    pub fn merge(&mut self, other: &Obligation) {
        for identity in &other.discharged {
            self.discharge(identity);
        }
    }
}

/// Flow state: the live binding of each tracked variable, plus bindings
/// detached when branches disagreed about which binding a variable holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowState {
    vars: FxHashMap<LocalId, Obligation>,
    orphans: SmallVec<[Obligation; 2]>,
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, local: LocalId) -> Option<&Obligation> {
        self.vars.get(&local)
    }

    pub fn get_mut(&mut self, local: LocalId) -> Option<&mut Obligation> {
        self.vars.get_mut(&local)
    }

    pub fn is_tracked(&self, local: LocalId) -> bool {
        self.vars.contains_key(&local)
    }

    /// Bind `local`, returning the binding it replaces.
    pub fn bind(&mut self, local: LocalId, obligation: Obligation) -> Option<Obligation> {
        self.vars.insert(local, obligation)
    }

    pub fn unbind(&mut self, local: LocalId) -> Option<Obligation> {
        self.vars.remove(&local)
    }

    pub fn clear_restrictions(&mut self) {
        for obligation in self.vars.values_mut() {
            obligation.restricted = None;
        }
    }

    /// OR-merge another branch into this one.
    ///
    /// Bindings with the same origin merge their discharges. When the
    /// branches hold different bindings for one variable, the later binding
    /// stays live and the earlier one becomes an orphan, reported at the end
    /// of the body like any other binding.
    pub fn merge(&mut self, other: FlowState) {
        let mut displaced = Vec::new();
        for (local, theirs) in other.vars {
            match self.vars.entry(local) {
                Entry::Occupied(mut entry) => {
                    let mine = entry.get_mut();
                    if mine.origin == theirs.origin {
                        mine.merge(&theirs);
                    } else if theirs.origin > mine.origin {
                        displaced.push(std::mem::replace(mine, theirs));
                    } else {
                        displaced.push(theirs);
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(theirs);
                }
            }
        }
        for orphan in displaced.into_iter().chain(other.orphans) {
            self.adopt(orphan);
        }
    }

    fn adopt(&mut self, orphan: Obligation) {
        match self.orphans.iter_mut().find(|o| o.origin == orphan.origin) {
            Some(existing) => existing.merge(&orphan),
            None => self.orphans.push(orphan),
        }
    }

    /// Fold the state left by a function literal back into the enclosing
    /// state.
    ///
    /// Discharges on bindings the literal captured flow back out. Bindings
    /// created inside the literal end with it and are returned for
    /// reporting.
    pub fn absorb_literal(&mut self, inner: FlowState) -> Vec<Obligation> {
        let mut ended = Vec::new();
        for (local, obligation) in inner.vars {
            match self.vars.get_mut(&local) {
                Some(outer) if outer.origin == obligation.origin => outer.merge(&obligation),
                _ => ended.push(obligation),
            }
        }
        for orphan in inner.orphans {
            if !self.orphans.iter().any(|o| o.origin == orphan.origin) {
                ended.push(orphan);
            }
        }
        ended
    }

    /// Take every binding and orphan, in origin order.
    ///
    /// Bindings sharing an origin (the same call result reached through
    /// different variables) are OR-merged first.
    pub fn drain(&mut self) -> Vec<Obligation> {
        let mut all: Vec<Obligation> = self.vars.drain().map(|(_, o)| o).collect();
        all.extend(self.orphans.drain(..));
        all.sort_by_key(|o| o.origin);

        let mut merged: Vec<Obligation> = Vec::with_capacity(all.len());
        for obligation in all {
            match merged.last_mut() {
                Some(last) if last.origin == obligation.origin => last.merge(&obligation),
                _ => merged.push(obligation),
            }
        }
        merged
    }
}
