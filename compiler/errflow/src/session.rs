//! Whole-run driver: units through every component, deferred rechecks,
//! diagnostics.
//!
//! Units are processed one at a time in the order the host lists them. For
//! each unit:
//!
//! 1. validate the unit,
//! 2. detect and export its error identities,
//! 3. resolve its imports and run the summarizer fixpoint,
//! 4. export the summaries and publish its dispatch table,
//! 5. check every function body.
//!
//! A function whose check needed a dispatch summary nobody had published
//! yet is queued instead of reported. The queue is retried after every unit
//! and once more, unconditionally, when the run finishes; by then a missing
//! summary means the method has no implementation anywhere in the run.
//!
//! Summaries go out of date the same way: a unit summarized before the
//! implementations of an interface it calls were published is summarized,
//! exported and published again once they are, and so is every analyzed
//! unit importing the summaries that changed.
//!
//! The dispatch store and the deferred queue sit behind `Arc` so that a
//! driver running units on several threads can share them between
//! sessions (see [`Session::with_shared`]). Queued functions are keyed by
//! unit path; a session hands back the ones it did not analyze.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use errflow_diagnostic::{Diagnostic, DiagnosticQueue};
use errflow_facts::{BlobFactStore, BlobStore, Deferred, DeferredQueue, DispatchStore};
use errflow_ir::{FuncRef, Function, Unit};

use crate::check::{check_function, FunctionCheck};
use crate::config::AnalysisConfig;
use crate::detect::detect_declarations;
use crate::dispatch::DispatchTable;
use crate::error::AnalysisError;
use crate::scope::{summary_dependencies, UnitScope};
use crate::summarize::{export_summaries, summarize_unit, UnitSummaries};

/// State of one analysis run.
pub struct Session<B> {
    config: AnalysisConfig,
    facts: BlobFactStore<B>,
    dispatch: Arc<DispatchStore>,
    deferred: Arc<DeferredQueue>,
    diagnostics: DiagnosticQueue,
    /// Converged summaries of analyzed units, by unit index.
    summaries: FxHashMap<usize, UnitSummaries>,
}

impl<B: BlobStore> Session<B> {
    pub fn new(config: AnalysisConfig, blobs: B) -> Self {
        Self::with_shared(
            config,
            blobs,
            Arc::new(DispatchStore::new()),
            Arc::new(DeferredQueue::new()),
        )
    }

    /// A session publishing to, and deferring through, shared structures.
    pub fn with_shared(
        config: AnalysisConfig,
        blobs: B,
        dispatch: Arc<DispatchStore>,
        deferred: Arc<DeferredQueue>,
    ) -> Self {
        Session {
            config,
            facts: BlobFactStore::new(blobs),
            dispatch,
            deferred,
            diagnostics: DiagnosticQueue::new(),
            summaries: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn dispatch(&self) -> &Arc<DispatchStore> {
        &self.dispatch
    }

    pub fn deferred(&self) -> &Arc<DeferredQueue> {
        &self.deferred
    }

    pub fn facts(&self) -> &BlobFactStore<B> {
        &self.facts
    }

    pub fn into_facts(self) -> BlobFactStore<B> {
        self.facts
    }

    /// Summaries computed for the unit at `index`, once analyzed.
    pub fn summaries(&self, index: usize) -> Option<&UnitSummaries> {
        self.summaries.get(&index)
    }

    /// Analyze every unit, then finish the run.
    pub fn run(&mut self, units: &[Unit]) -> Result<Vec<Diagnostic>, AnalysisError> {
        for index in 0..units.len() {
            self.analyze_unit(units, index)?;
        }
        self.finish(units)
    }

    /// Run every component over `units[index]`.
    ///
    /// Facts of the units it imports must already be in the store; units it
    /// only reaches through interfaces need not be. Later calls must pass
    /// the same unit list.
    #[tracing::instrument(level = "debug", skip_all, fields(index = index))]
    pub fn analyze_unit(&mut self, units: &[Unit], index: usize) -> Result<(), AnalysisError> {
        let unit = units.get(index).ok_or(AnalysisError::UnknownUnit(index))?;
        unit.validate()
            .map_err(|source| AnalysisError::MalformedUnit {
                unit: unit.path.clone(),
                source,
            })?;
        if self.config.is_ignored(&unit.path) {
            tracing::debug!(unit = %unit.path, "unit ignored");
            return Ok(());
        }

        self.process(unit, index)?;
        self.retry_deferred(units, false)
    }

    /// Final recheck of everything still deferred, then every diagnostic of
    /// the run, sorted.
    pub fn finish(&mut self, units: &[Unit]) -> Result<Vec<Diagnostic>, AnalysisError> {
        self.retry_deferred(units, true)?;
        Ok(self.diagnostics.flush())
    }

    /// Detect, summarize, export, publish and check one unit.
    ///
    /// Returns `true` if its function summaries differ from the ones of the
    /// previous run over the same unit.
    fn process(&mut self, unit: &Unit, index: usize) -> Result<bool, AnalysisError> {
        let decls = detect_declarations(unit, &self.config);
        decls.export(&mut self.facts)?;

        let scope = UnitScope::build(unit, &self.config, decls, &self.facts)?;
        let summaries = summarize_unit(&scope, &self.dispatch);
        export_summaries(&scope, &summaries, &mut self.facts)?;
        DispatchTable::build(&scope, &summaries).publish(&self.dispatch);

        for func in unit.functions.iter().filter(|f| f.body.is_some()) {
            let check = check_function(func, &scope, &summaries, &self.dispatch);
            settle(
                &mut self.diagnostics,
                &self.deferred,
                deferred_item(unit, func),
                check,
                false,
            );
        }

        tracing::debug!(
            unit = %unit.path,
            functions = unit.functions.len(),
            pending = self.diagnostics.len(),
            "unit analyzed"
        );
        let changed = self
            .summaries
            .get(&index)
            .map_or(true, |previous| !previous.same_functions(&summaries));
        self.summaries.insert(index, summaries);
        Ok(changed)
    }

    /// Recheck deferred functions until a round makes no progress.
    ///
    /// Every round first brings outdated summaries up to date. With
    /// `last_round`, a missing dispatch summary is final and the function
    /// is reported with what is known.
    fn retry_deferred(&mut self, units: &[Unit], last_round: bool) -> Result<(), AnalysisError> {
        loop {
            let refreshed = self.refresh_outdated(units)?;

            let mut by_unit: BTreeMap<usize, Vec<FuncRef>> = BTreeMap::new();
            let mut foreign = Vec::new();
            for item in self.deferred.drain() {
                match self.owner(units, &item.unit) {
                    Some(index) => by_unit.entry(index).or_default().push(item.func),
                    None => foreign.push(item),
                }
            }

            let mut resolved = 0_usize;
            let mut requeued = 0_usize;
            for (index, funcs) in by_unit {
                let (Some(unit), Some(summaries)) = (units.get(index), self.summaries.get(&index))
                else {
                    continue;
                };
                let decls = detect_declarations(unit, &self.config);
                let scope = UnitScope::build(unit, &self.config, decls, &self.facts)?;

                for func in funcs.iter().filter_map(|f| unit.function(f)) {
                    let check = check_function(func, &scope, summaries, &self.dispatch);
                    let item = deferred_item(unit, func);
                    if settle(&mut self.diagnostics, &self.deferred, item, check, last_round) {
                        resolved += 1;
                    } else {
                        requeued += 1;
                    }
                }
            }

            // Another session's functions wait for that session.
            let handed_back = foreign.len();
            for item in foreign {
                self.deferred.push(item);
            }

            tracing::debug!(
                refreshed,
                resolved,
                requeued,
                handed_back,
                last_round,
                "deferred rechecks"
            );
            if refreshed == 0 && (resolved == 0 || requeued == 0) {
                return Ok(());
            }
        }
    }

    /// Run the pipeline again over every analyzed unit whose summaries were
    /// computed against dispatch summaries that have changed since, and
    /// over every unit importing summaries that changed as a result.
    /// Returns the number of units processed.
    fn refresh_outdated(&mut self, units: &[Unit]) -> Result<usize, AnalysisError> {
        let mut pending = self.outdated_units(units);
        let mut refreshed = 0_usize;
        while let Some(index) = pending.pop_first() {
            let unit = units.get(index).ok_or(AnalysisError::UnknownUnit(index))?;
            tracing::debug!(unit = %unit.path, "summaries outdated");
            refreshed += 1;
            if self.process(unit, index)? {
                pending.extend(self.importers_of(units, &unit.path));
            }
            if pending.is_empty() {
                pending = self.outdated_units(units);
            }
        }
        Ok(refreshed)
    }

    fn outdated_units(&self, units: &[Unit]) -> BTreeSet<usize> {
        self.summaries
            .iter()
            .filter(|(&index, summaries)| {
                units.get(index).is_some_and(|unit| {
                    summaries
                        .stale_keys(&unit.path, &self.dispatch)
                        .next()
                        .is_some()
                })
            })
            .map(|(&index, _)| index)
            .collect()
    }

    /// Analyzed units importing function summaries from `path`.
    fn importers_of(&self, units: &[Unit], path: &str) -> Vec<usize> {
        self.summaries
            .keys()
            .copied()
            .filter(|&index| {
                units
                    .get(index)
                    .is_some_and(|unit| summary_dependencies(unit).contains(path))
            })
            .collect()
    }

    /// Index of the unit at `path`, if this session analyzed it.
    fn owner(&self, units: &[Unit], path: &str) -> Option<usize> {
        units
            .iter()
            .position(|unit| unit.path == path)
            .filter(|index| self.summaries.contains_key(index))
    }
}

fn deferred_item(unit: &Unit, func: &Function) -> Deferred {
    Deferred {
        unit: unit.path.clone(),
        func: func.func.clone(),
    }
}

/// Report a finished check, or queue it again while dispatch summaries are
/// missing. Returns `true` if the check was reported.
fn settle(
    diagnostics: &mut DiagnosticQueue,
    deferred: &DeferredQueue,
    item: Deferred,
    check: FunctionCheck,
    last_round: bool,
) -> bool {
    if check.is_deferrable() && !last_round {
        tracing::trace!(func = %item.func, misses = check.misses.len(), "check deferred");
        deferred.push(item);
        return false;
    }
    for (key, diagnostic) in check.diagnostics {
        diagnostics.push(key, diagnostic);
    }
    true
}
