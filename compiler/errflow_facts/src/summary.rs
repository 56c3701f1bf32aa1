//! In-memory summaries and their lattice operations.
//!
//! Every summary is a finite map ordered by key, so the exported fact form
//! is canonical (sorted and deduplicated) without an extra pass. All
//! `union`/`insert` operations return whether anything changed; the
//! summarizer's fixpoint stops on the first pass where nothing did.
//!
//! The `wrapped` tag is ordered *absent < wrapped < verbatim*: reaching an
//! identity verbatim on any path clears the tag. This keeps the lattice
//! monotone while the tag itself stays display-only.

use std::collections::{BTreeMap, BTreeSet};

use crate::facts::{
    CallbackFlowFact, CheckedParam, CheckedParamFact, Flow, FunctionErrorFact, ParameterFlowFact,
    ReachedIdentity,
};
use crate::ErrorIdentity;

/// Error identities reachable at a function's error-typed return slots.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ErrorSummary(BTreeMap<ErrorIdentity, bool>);

impl ErrorSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `identity`; returns `true` if the summary changed.
    pub fn insert(&mut self, identity: ErrorIdentity, wrapped: bool) -> bool {
        match self.0.get_mut(&identity) {
            Some(existing) => {
                if *existing && !wrapped {
                    *existing = false;
                    true
                } else {
                    false
                }
            }
            None => {
                self.0.insert(identity, wrapped);
                true
            }
        }
    }

    /// Union `other` into `self`; returns `true` if `self` changed.
    pub fn union(&mut self, other: &ErrorSummary) -> bool {
        let mut changed = false;
        for (identity, &wrapped) in &other.0 {
            changed |= self.insert(identity.clone(), wrapped);
        }
        changed
    }

    /// Keep only identities accepted by `keep`.
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(&ErrorIdentity) -> bool) -> ErrorSummary {
        ErrorSummary(
            self.0
                .iter()
                .filter(|(id, _)| keep(id))
                .map(|(id, &w)| (id.clone(), w))
                .collect(),
        )
    }

    pub fn contains(&self, identity: &ErrorIdentity) -> bool {
        self.0.contains_key(identity)
    }

    /// Whether `identity` is present and only ever reached wrapped.
    pub fn is_wrapped(&self, identity: &ErrorIdentity) -> bool {
        self.0.get(identity).copied().unwrap_or(false)
    }

    pub fn identities(&self) -> impl Iterator<Item = &ErrorIdentity> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ErrorIdentity, bool)> {
        self.0.iter().map(|(id, &w)| (id, w))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_fact(&self) -> FunctionErrorFact {
        FunctionErrorFact {
            identities: self
                .0
                .iter()
                .map(|(id, &wrapped)| ReachedIdentity {
                    unit: id.unit.clone(),
                    name: id.name.clone(),
                    wrapped,
                })
                .collect(),
        }
    }

    pub fn from_fact(fact: &FunctionErrorFact) -> Self {
        let mut summary = ErrorSummary::new();
        for reached in &fact.identities {
            summary.insert(
                ErrorIdentity::new(reached.unit.clone(), reached.name.clone()),
                reached.wrapped,
            );
        }
        summary
    }
}

impl FromIterator<(ErrorIdentity, bool)> for ErrorSummary {
    fn from_iter<I: IntoIterator<Item = (ErrorIdentity, bool)>>(iter: I) -> Self {
        let mut summary = ErrorSummary::new();
        for (identity, wrapped) in iter {
            summary.insert(identity, wrapped);
        }
        summary
    }
}

/// Parameter indices (receiver excluded) whose value or invocation result
/// reaches a return slot. Used for both parameter and callback flows.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FlowSummary(BTreeMap<u32, bool>);

impl FlowSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a flow from parameter `index`; returns `true` if changed.
    pub fn insert(&mut self, index: u32, wrapped: bool) -> bool {
        match self.0.get_mut(&index) {
            Some(existing) => {
                if *existing && !wrapped {
                    *existing = false;
                    true
                } else {
                    false
                }
            }
            None => {
                self.0.insert(index, wrapped);
                true
            }
        }
    }

    pub fn union(&mut self, other: &FlowSummary) -> bool {
        let mut changed = false;
        for (&index, &wrapped) in &other.0 {
            changed |= self.insert(index, wrapped);
        }
        changed
    }

    /// Flows present in both. The tag is kept if either side wrapped.
    #[must_use]
    pub fn intersect(&self, other: &FlowSummary) -> FlowSummary {
        FlowSummary(
            self.0
                .iter()
                .filter_map(|(&index, &wrapped)| {
                    other.0.get(&index).map(|&theirs| (index, wrapped || theirs))
                })
                .collect(),
        )
    }

    /// The `wrapped` tag for `index`, or `None` if there is no flow.
    pub fn get(&self, index: u32) -> Option<bool> {
        self.0.get(&index).copied()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.0.contains_key(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, bool)> + '_ {
        self.0.iter().map(|(&i, &w)| (i, w))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn flows(&self) -> Vec<Flow> {
        self.0
            .iter()
            .map(|(&index, &wrapped)| Flow { index, wrapped })
            .collect()
    }

    fn from_flows(flows: &[Flow]) -> Self {
        let mut summary = FlowSummary::new();
        for flow in flows {
            summary.insert(flow.index, flow.wrapped);
        }
        summary
    }

    pub fn to_param_fact(&self) -> ParameterFlowFact {
        ParameterFlowFact {
            flows: self.flows(),
        }
    }

    pub fn to_callback_fact(&self) -> CallbackFlowFact {
        CallbackFlowFact {
            flows: self.flows(),
        }
    }

    pub fn from_param_fact(fact: &ParameterFlowFact) -> Self {
        Self::from_flows(&fact.flows)
    }

    pub fn from_callback_fact(fact: &CallbackFlowFact) -> Self {
        Self::from_flows(&fact.flows)
    }
}

/// Error parameter index → identities the function discriminates on it.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CheckedSummary(BTreeMap<u32, BTreeSet<ErrorIdentity>>);

impl CheckedSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u32, identity: ErrorIdentity) -> bool {
        self.0.entry(index).or_default().insert(identity)
    }

    pub fn union(&mut self, other: &CheckedSummary) -> bool {
        let mut changed = false;
        for (&index, identities) in &other.0 {
            for identity in identities {
                changed |= self.insert(index, identity.clone());
            }
        }
        changed
    }

    /// Per index, identities checked by both sides; empty indices dropped.
    #[must_use]
    pub fn intersect(&self, other: &CheckedSummary) -> CheckedSummary {
        CheckedSummary(
            self.0
                .iter()
                .filter_map(|(&index, mine)| {
                    let theirs = other.0.get(&index)?;
                    let common: BTreeSet<ErrorIdentity> =
                        mine.intersection(theirs).cloned().collect();
                    (!common.is_empty()).then_some((index, common))
                })
                .collect(),
        )
    }

    /// Identities checked on parameter `index`.
    pub fn get(&self, index: u32) -> Option<&BTreeSet<ErrorIdentity>> {
        self.0.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &BTreeSet<ErrorIdentity>)> {
        self.0.iter().map(|(&index, ids)| (index, ids))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    /// Keep only identities accepted by `keep`; empty indices dropped.
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(&ErrorIdentity) -> bool) -> CheckedSummary {
        CheckedSummary(
            self.0
                .iter()
                .filter_map(|(&index, ids)| {
                    let kept: BTreeSet<ErrorIdentity> =
                        ids.iter().filter(|id| keep(id)).cloned().collect();
                    (!kept.is_empty()).then_some((index, kept))
                })
                .collect(),
        )
    }

    pub fn to_fact(&self) -> CheckedParamFact {
        CheckedParamFact {
            per_index: self
                .0
                .iter()
                .filter(|(_, ids)| !ids.is_empty())
                .map(|(&index, ids)| CheckedParam {
                    index,
                    identities: ids.iter().cloned().collect(),
                })
                .collect(),
        }
    }

    pub fn from_fact(fact: &CheckedParamFact) -> Self {
        let mut summary = CheckedSummary::new();
        for entry in &fact.per_index {
            for identity in &entry.identities {
                summary.insert(entry.index, identity.clone());
            }
        }
        summary
    }
}

/// Everything known about one function (or one abstract method).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FunctionSummary {
    pub errors: ErrorSummary,
    pub param_flows: FlowSummary,
    pub callback_flows: FlowSummary,
    pub checked: CheckedSummary,
}

impl FunctionSummary {
    /// Union every component; returns `true` if anything changed.
    pub fn union(&mut self, other: &FunctionSummary) -> bool {
        let mut changed = self.errors.union(&other.errors);
        changed |= self.param_flows.union(&other.param_flows);
        changed |= self.callback_flows.union(&other.callback_flows);
        changed |= self.checked.union(&other.checked);
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
            && self.param_flows.is_empty()
            && self.callback_flows.is_empty()
            && self.checked.is_empty()
    }
}

/// Aggregate the summaries of every implementation of one abstract method.
///
/// Reachability is the union (any implementation might run); the three
/// flow-style facts are the intersection (the call site cannot know which
/// implementation runs), so one implementation lacking a fact empties it.
/// No implementations yields the empty summary.
pub fn aggregate<'a>(impls: impl IntoIterator<Item = &'a FunctionSummary>) -> FunctionSummary {
    let mut iter = impls.into_iter();
    let Some(first) = iter.next() else {
        return FunctionSummary::default();
    };
    let mut result = first.clone();
    for summary in iter {
        result.errors.union(&summary.errors);
        result.param_flows = result.param_flows.intersect(&summary.param_flows);
        result.callback_flows = result.callback_flows.intersect(&summary.callback_flows);
        result.checked = result.checked.intersect(&summary.checked);
    }
    result
}
