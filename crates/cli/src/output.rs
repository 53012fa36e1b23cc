//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a threshold value with fixed precision
pub fn format_value(value: f64) -> String {
    format!("{:.3}", value)
}

/// Format an optional threshold, `-` when absent
pub fn format_optional(value: Option<f64>) -> String {
    value.map(format_value).unwrap_or_else(|| "-".dimmed().to_string())
}

/// Format a utilization band as `start-end`
pub fn format_band(start: f64, end: f64) -> String {
    format!("{}-{}", start, end)
}

/// Color a yes/no flag
pub fn color_flag(present: bool) -> String {
    if present {
        "yes".green().to_string()
    } else {
        "no".yellow().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1.23456), "1.235");
        assert_eq!(format_value(100.0), "100.000");
    }

    #[test]
    fn test_format_band() {
        assert_eq!(format_band(100.0, 150.0), "100-150");
        assert_eq!(format_band(37.5, 62.5), "37.5-62.5");
    }

    #[test]
    fn test_format_optional_present() {
        assert_eq!(format_optional(Some(2.0)), "2.000");
    }
}
