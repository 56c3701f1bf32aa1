use errflow_facts::FactError;
use errflow_ir::IrError;

/// Failure of an analysis run.
///
/// Unchecked errors in the analyzed code are not failures; they are
/// reported as diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The host frontend handed over a unit the analysis cannot work with.
    #[error("malformed unit `{unit}`: {source}")]
    MalformedUnit {
        unit: String,
        #[source]
        source: IrError,
    },

    #[error(transparent)]
    Fact(#[from] FactError),

    /// A unit index outside the unit list the driver passed in.
    #[error("no unit at index {0}")]
    UnknownUnit(usize),
}
