//! Interprocedural error-flow exhaustiveness analysis.
//!
//! Finds call sites where an error returned by a callee can carry a known
//! error identity that the caller neither discriminates nor propagates.
//!
//! This crate provides:
//!
//! - **Declaration detection** ([`detect_declarations`]): sentinel globals
//!   and error types of one unit, exported as identity facts.
//! - **Summarization** ([`summarize_unit`]): per-function error-flow
//!   summaries by fixpoint over the unit's call graph, combining a return
//!   walk over the body with a trace over the value graph.
//! - **Dispatch resolution** ([`DispatchTable`]): summaries of interface
//!   methods aggregated over every visible implementation and published to a
//!   process-wide store.
//! - **Call-site checking** ([`check_function`]): flow-sensitive tracking
//!   of what each bound error still owes.
//! - **Driving** ([`Session`]): the per-unit pipeline with deferred
//!   rechecks for dispatch facts published out of dependency order.
//!
//! # Crate Dependencies
//!
//! `errflow` sits on `errflow_ir` (the host-built unit model),
//! `errflow_facts` (identities, facts, summaries, stores) and
//! `errflow_diagnostic`. It never parses source; the host frontend hands
//! over typed units.

pub mod check;
pub mod config;
pub mod detect;
pub mod discriminate;
pub mod dispatch;
pub mod env;
mod error;
pub mod scope;
pub mod session;
mod stack;
pub mod summarize;
pub mod wrap;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use check::{check_function, FunctionCheck};
pub use config::AnalysisConfig;
pub use detect::{detect_declarations, Declarations};
pub use dispatch::{satisfies, DispatchTable, DispatchView};
pub use error::AnalysisError;
pub use scope::UnitScope;
pub use session::Session;
pub use summarize::{export_summaries, summarize_unit, UnitSummaries, MAX_TRACE_DEPTH};

pub use errflow_diagnostic::Diagnostic;
use errflow_facts::MemoryBlobStore;
use errflow_ir::Unit;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=errflow=debug` or `RUST_LOG=errflow=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// Analyze a closure of units with an in-memory fact store.
///
/// Units are processed in the order given; a unit's imports should precede
/// it.
pub fn analyze(units: &[Unit], config: AnalysisConfig) -> Result<Vec<Diagnostic>, AnalysisError> {
    Session::new(config, MemoryBlobStore::new()).run(units)
}
