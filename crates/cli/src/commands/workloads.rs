//! Workload metadata and partition preview commands

use anyhow::{Context, Result};
use model_lib::partition::partition_utilization;
use model_lib::WorkloadMetadata;
use std::path::Path;
use tabled::Tabled;

use crate::output::{format_band, print_json, print_table, OutputFormat};

/// Row for workloads table
#[derive(Tabled)]
struct WorkloadRow {
    #[tabled(rename = "Job")]
    job: String,
    #[tabled(rename = "CPUs")]
    cpus: u32,
    #[tabled(rename = "Utilization range")]
    range: String,
}

/// Row for partition table
#[derive(Tabled)]
struct BandRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Start")]
    start: f64,
    #[tabled(rename = "End")]
    end: f64,
}

fn workload_rows(metadata: &WorkloadMetadata) -> Vec<WorkloadRow> {
    metadata
        .iter()
        .map(|(job, info)| {
            let cpus = f64::from(info.cpus);
            WorkloadRow {
                job: job.clone(),
                cpus: info.cpus,
                range: format_band(cpus * 50.0, (cpus + 1.0) * 100.0),
            }
        })
        .collect()
}

/// List workload metadata
pub fn list(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let path = path.context("No workload file given (use --workloads or PENV_WORKLOAD_FILE)")?;
    let metadata = WorkloadMetadata::load(path)
        .with_context(|| format!("Failed to load workloads from {}", path.display()))?;

    match format {
        OutputFormat::Table => print_table(&workload_rows(&metadata)),
        OutputFormat::Json => print_json(&metadata)?,
    }

    Ok(())
}

/// Preview the utilization bands for a CPU allocation
pub fn show_partition(cpus: u32, step: f64, format: OutputFormat) -> Result<()> {
    let bands = partition_utilization(cpus, step)?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<BandRow> = bands
                .iter()
                .enumerate()
                .map(|(index, band)| BandRow {
                    index,
                    start: band.start,
                    end: band.end,
                })
                .collect();
            print_table(&rows);
        }
        OutputFormat::Json => print_json(&bands)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_rows() {
        let metadata =
            WorkloadMetadata::from_json(r#"{"redis": {"cpus": 2}, "idle": {"cpus": 0}}"#).unwrap();
        let rows = workload_rows(&metadata);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].job, "idle");
        assert_eq!(rows[0].range, "0-100");
        assert_eq!(rows[1].job, "redis");
        assert_eq!(rows[1].range, "100-300");
    }

    #[test]
    fn test_list_requires_path() {
        assert!(list(None, OutputFormat::Table).is_err());
    }

    #[test]
    fn test_partition_rejects_bad_step() {
        assert!(show_partition(2, 0.0, OutputFormat::Table).is_err());
    }
}
