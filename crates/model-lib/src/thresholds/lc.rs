//! Latency-critical utilization ceiling

use serde::{Deserialize, Serialize};

use crate::metric::Metric;
use crate::table::TelemetryTable;

/// Job name tagging aggregated latency-critical rows in the utilization table
pub const DEFAULT_LC_TAG: &str = "lcs";

/// Which utilization rows the ceiling is taken over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LcScope {
    /// Only rows whose job name is the latency-critical tag
    #[default]
    Tagged,
    /// Every row of the utilization table
    All,
}

/// Highest observed CPU utilization in scope, truncated to a whole number
///
/// Returns `None` when no row in scope carries a utilization value.
pub fn extract_lc_utilization_max(table: &TelemetryTable, scope: LcScope, tag: &str) -> Option<f64> {
    let rows = match scope {
        LcScope::Tagged => table.for_job(tag),
        LcScope::All => table.clone(),
    };

    rows.values(Metric::CpuUtilization)?
        .into_iter()
        .reduce(f64::max)
        .map(f64::trunc)
}
