//! CSV loading for telemetry tables
//!
//! Expected layout: a header row, a `name` column with the job identity, and
//! one column per metric. Empty cells are missing values. Columns that hold
//! any non-numeric cell (timestamps, host names) are not metric columns and
//! are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use super::{TableError, TelemetryTable};
use crate::metric::JOB_COLUMN;

/// Load a telemetry table from a CSV file
pub fn load_csv(path: &Path) -> Result<TelemetryTable, TableError> {
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = parse_csv(BufReader::new(file)).map_err(|e| match e {
        TableError::Io { source, .. } => TableError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;

    debug!(
        path = %path.display(),
        rows = table.len(),
        "Loaded telemetry table"
    );
    Ok(table)
}

/// Parse a telemetry table from CSV text
pub fn parse_csv<R: BufRead>(reader: R) -> Result<TelemetryTable, TableError> {
    let mut lines = reader.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line.map_err(io_error)?;
                if !line.trim().is_empty() {
                    break split_fields(&line);
                }
            }
            None => return Err(TableError::MissingHeader),
        }
    };

    let job_index = header
        .iter()
        .position(|h| h == JOB_COLUMN)
        .ok_or(TableError::MissingJobColumn(JOB_COLUMN))?;

    let mut jobs = Vec::new();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); header.len()];

    for (line_num, line) in lines {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_fields(&line);
        if fields.len() != header.len() {
            return Err(TableError::RaggedRow {
                line: line_num + 1,
                expected: header.len(),
                got: fields.len(),
            });
        }

        for (index, field) in fields.into_iter().enumerate() {
            if index == job_index {
                jobs.push(field);
            } else {
                cells[index].push(field);
            }
        }
    }

    let mut table = TelemetryTable::new(jobs);
    for (index, name) in header.iter().enumerate() {
        if index == job_index {
            continue;
        }
        match parse_numeric(&cells[index]) {
            Some(values) => table.insert_column(name.clone(), values)?,
            None => debug!(column = %name, "Skipping non-numeric column"),
        }
    }

    Ok(table)
}

fn io_error(source: std::io::Error) -> TableError {
    TableError::Io {
        path: Default::default(),
        source,
    }
}

/// Split one record, honouring double-quoted fields
///
/// Commas inside quotes do not separate fields and `""` inside quotes is a
/// literal quote.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

/// Parse a whole column, or `None` if any non-empty cell is not a number
fn parse_numeric(cells: &[String]) -> Option<Vec<f64>> {
    cells
        .iter()
        .map(|cell| {
            if cell.is_empty() {
                Some(f64::NAN)
            } else {
                cell.parse::<f64>().ok()
            }
        })
        .collect()
}
