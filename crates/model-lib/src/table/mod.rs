//! In-memory telemetry tables
//!
//! A table is column-oriented: one job name per row plus any number of
//! numeric columns keyed by metric identifier. Missing cells are stored as
//! `NaN` so that every column has one value per row.

mod csv;

pub use csv::{load_csv, parse_csv};

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::metric::Metric;

/// Errors raised while building or loading a telemetry table
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("table has no header row")]
    MissingHeader,

    #[error("table has no '{0}' column")]
    MissingJobColumn(&'static str),

    #[error("line {line}: expected {expected} fields, got {got}")]
    RaggedRow {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("column '{column}' has {got} values, table has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },
}

/// Column-oriented table of telemetry samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryTable {
    jobs: Vec<String>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl TelemetryTable {
    /// Create a table with one row per job entry and no metric columns
    pub fn new(jobs: Vec<String>) -> Self {
        Self {
            jobs,
            columns: BTreeMap::new(),
        }
    }

    /// Add a metric column; the column must have one value per row
    pub fn with_column(mut self, metric: Metric, values: Vec<f64>) -> Result<Self, TableError> {
        self.insert_column(metric.as_str(), values)?;
        Ok(self)
    }

    /// Add a column by raw name
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), TableError> {
        let name = name.into();
        if values.len() != self.jobs.len() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.jobs.len(),
                got: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Distinct job names in order of first appearance
    pub fn job_names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.jobs
            .iter()
            .filter(|job| seen.insert(job.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn has_column(&self, metric: Metric) -> bool {
        self.columns.contains_key(metric.as_str())
    }

    pub fn column(&self, metric: Metric) -> Option<&[f64]> {
        self.columns.get(metric.as_str()).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Finite values of a column; missing cells are skipped
    pub fn values(&self, metric: Metric) -> Option<Vec<f64>> {
        self.column(metric)
            .map(|values| values.iter().copied().filter(|v| v.is_finite()).collect())
    }

    /// Rows belonging to one job
    ///
    /// Columns with no value at all for this job are dropped, so column
    /// presence can be probed per job.
    pub fn for_job(&self, job: &str) -> TelemetryTable {
        let mut subset = self.select(|row| self.jobs[row] == job);
        subset.columns.retain(|_, values| values.iter().any(|v| !v.is_nan()));
        subset
    }

    /// Rows whose value in `metric` satisfies the predicate
    ///
    /// Returns an empty table (keeping the column set) when the column is absent.
    pub fn filter_by(&self, metric: Metric, predicate: impl Fn(f64) -> bool) -> TelemetryTable {
        match self.column(metric) {
            Some(values) => self.select(|row| predicate(values[row])),
            None => self.select(|_| false),
        }
    }

    fn select(&self, keep: impl Fn(usize) -> bool) -> TelemetryTable {
        let rows: Vec<usize> = (0..self.jobs.len()).filter(|&row| keep(row)).collect();
        TelemetryTable {
            jobs: rows.iter().map(|&row| self.jobs[row].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| {
                    (name.clone(), rows.iter().map(|&row| values[row]).collect())
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TelemetryTable {
        TelemetryTable::new(vec!["a".into(), "b".into(), "a".into(), "c".into()])
            .with_column(Metric::CpuUtilization, vec![100.0, 150.0, 200.0, 50.0])
            .unwrap()
            .with_column(
                Metric::StallsMemLoadPerKiloInstruction,
                vec![f64::NAN, 3.0, f64::NAN, 4.0],
            )
            .unwrap()
    }

    #[test]
    fn test_job_names_preserve_first_appearance() {
        assert_eq!(table().job_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_for_job_drops_empty_columns() {
        let t = table();
        let a = t.for_job("a");
        assert_eq!(a.len(), 2);
        assert!(a.has_column(Metric::CpuUtilization));
        assert!(!a.has_column(Metric::StallsMemLoadPerKiloInstruction));

        let b = t.for_job("b");
        assert!(b.has_column(Metric::StallsMemLoadPerKiloInstruction));
    }

    #[test]
    fn test_filter_by_keeps_columns() {
        let filtered = table().filter_by(Metric::CpuUtilization, |u| u >= 150.0);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.column(Metric::CpuUtilization).unwrap(), &[150.0, 200.0]);
        assert!(filtered.has_column(Metric::StallsMemLoadPerKiloInstruction));
    }

    #[test]
    fn test_filter_by_missing_column_is_empty() {
        let filtered = table().filter_by(Metric::NormalizedFrequency, |_| true);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_values_skip_missing_cells() {
        let values = table()
            .values(Metric::StallsMemLoadPerKiloInstruction)
            .unwrap();
        assert_eq!(values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = TelemetryTable::new(vec!["a".into()])
            .with_column(Metric::CpuUtilization, vec![1.0, 2.0]);
        assert!(matches!(result, Err(TableError::LengthMismatch { .. })));
    }
}
