//! Threshold inspection commands

use anyhow::Result;
use model_lib::{BandThreshold, ThresholdModel, ThresholdStore};
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_flag, format_band, format_optional, format_value, print_info, print_json, print_table,
    print_warning, OutputFormat,
};

/// Row for band thresholds table
#[derive(Tabled)]
struct BandRow {
    #[tabled(rename = "Utilization")]
    band: String,
    #[tabled(rename = "CPI")]
    cpi: String,
    #[tabled(rename = "MPKI")]
    mpki: String,
    #[tabled(rename = "MB")]
    mb: String,
    #[tabled(rename = "L2SPKI")]
    l2spki: String,
    #[tabled(rename = "MSPKI")]
    mspki: String,
}

impl From<&BandThreshold> for BandRow {
    fn from(band: &BandThreshold) -> Self {
        Self {
            band: format_band(band.util_start, band.util_end),
            cpi: format_value(band.cpi),
            mpki: format_value(band.mpki),
            mb: format_value(band.mb),
            l2spki: format_optional(band.l2spki),
            mspki: format_optional(band.mspki),
        }
    }
}

/// Row for the per-job summary table
#[derive(Tabled)]
struct JobSummaryRow {
    #[tabled(rename = "Job")]
    job: String,
    #[tabled(rename = "Bands")]
    bands: usize,
    #[tabled(rename = "Utilization")]
    range: String,
    #[tabled(rename = "TDP")]
    tdp: String,
}

/// Row for the TDP table
#[derive(Tabled)]
struct TdpRow {
    #[tabled(rename = "Job")]
    job: String,
    #[tabled(rename = "Cutoff")]
    util: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std")]
    std: String,
    #[tabled(rename = "Floor")]
    bar: String,
}

fn summarize(model: &ThresholdModel) -> Vec<JobSummaryRow> {
    model
        .jobs()
        .map(|(job, thresholds)| {
            let range = match (thresholds.thresh.first(), thresholds.thresh.last()) {
                (Some(first), Some(last)) => format_band(first.util_start, last.util_end),
                _ => "-".to_string(),
            };
            JobSummaryRow {
                job: job.clone(),
                bands: thresholds.thresh.len(),
                range,
                tdp: color_flag(thresholds.tdp.is_some()),
            }
        })
        .collect()
}

/// Show band thresholds of one job, or a summary of every job
pub fn show(path: &Path, job: Option<&str>, format: OutputFormat) -> Result<()> {
    let store = ThresholdStore::open(path);
    if store.is_empty() {
        print_warning(&format!("No threshold model at {}", path.display()));
        return Ok(());
    }

    match job {
        Some(job) => {
            let bands = store.thresholds(job);
            match format {
                OutputFormat::Table => {
                    if bands.is_empty() {
                        print_warning(&format!("No band thresholds for job '{}'", job));
                        return Ok(());
                    }
                    let rows: Vec<BandRow> = bands.iter().map(BandRow::from).collect();
                    print_table(&rows);
                }
                OutputFormat::Json => print_json(bands)?,
            }
        }
        None => {
            let rows = summarize(store.model());
            match format {
                OutputFormat::Table => {
                    print_table(&rows);
                    if store.model().has_lcutilmax() {
                        print_info(&format!("LC utilization ceiling: {}", store.lcutilmax()));
                    }
                }
                OutputFormat::Json => print_json(store.model())?,
            }
        }
    }

    Ok(())
}

/// Show the TDP frequency floor of a job
pub fn show_tdp(path: &Path, job: &str, format: OutputFormat) -> Result<()> {
    let store = ThresholdStore::open(path);
    let tdp = store.tdp(job);

    match format {
        OutputFormat::Table => match tdp {
            Some(tdp) => print_table(&[TdpRow {
                job: job.to_string(),
                util: format_value(tdp.util),
                mean: format_value(tdp.mean),
                std: format_value(tdp.std),
                bar: format_value(tdp.bar),
            }]),
            None => print_warning(&format!("No TDP threshold for job '{}'", job)),
        },
        OutputFormat::Json => print_json(&tdp)?,
    }

    Ok(())
}
