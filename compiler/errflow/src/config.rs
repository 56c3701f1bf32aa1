//! Analysis configuration.

use serde::Deserialize;

/// Options recognized by the analysis.
///
/// Loading is the host's business; the type derives `Deserialize` so it can
/// come from whatever format the host uses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnalysisConfig {
    /// Unit-path prefixes treated as opaque: their identities are never
    /// tracked and the units themselves are neither summarized nor checked.
    pub ignore_units: Vec<String>,
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config with the ignore list parsed from a comma-separated flag value.
    pub fn with_ignore_list(list: &str) -> Self {
        AnalysisConfig {
            ignore_units: Self::parse_ignore_list(list),
        }
    }

    /// Split a comma-separated list of unit prefixes. Blank entries are
    /// dropped and surrounding whitespace trimmed.
    pub fn parse_ignore_list(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Whether `unit` falls under an ignored prefix.
    ///
    /// A prefix matches the unit itself and units below it
    /// (`example.com/gen` matches `example.com/gen/api` but not
    /// `example.com/generic`).
    pub fn is_ignored(&self, unit: &str) -> bool {
        self.ignore_units.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            unit.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}
