//! Output formatting module
//!
//! Table and JSON rendering for CLI commands.

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::fmt::Display;
use tabled::{Table, Tabled};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Key/value row for detail views
#[derive(Debug, Serialize, Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl FieldRow {
    pub fn new(field: &str, value: impl Display) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Print rows in the specified format
pub fn print_output<T>(data: &[T], format: OutputFormat) -> anyhow::Result<()>
where
    T: Serialize + Tabled,
{
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("No items found.");
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => print_json(data)?,
    }
    Ok(())
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print a success message (respects quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message.green());
    }
}

/// Print a soft-success message, e.g. work that was queued (respects quiet mode)
pub fn print_pending(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message.yellow());
    }
}

/// Print an info message (respects quiet mode)
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}

/// Placeholder for absent values in tables
pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}
