//! Output formatting utilities

use colored::*;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::error::{CliError, CliResult};

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Render a single item in the specified format
pub fn render<T: Serialize>(data: &T, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            serde_json::to_string_pretty(data).map_err(|e| CliError::Output(e.to_string()))
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(data).map_err(|e| CliError::Output(e.to_string()))
        }
    }
}

pub fn render_table<T: Tabled>(rows: Vec<T>) -> String {
    if rows.is_empty() {
        "No results".dimmed().to_string()
    } else {
        Table::new(rows).to_string()
    }
}

/// Print a vector of rows in the specified format
pub fn print_output<T: Serialize + Tabled>(rows: Vec<T>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => println!("{}", render_table(rows)),
        OutputFormat::Json | OutputFormat::Yaml => println!("{}", render(&rows, format)?),
    }
    Ok(())
}

pub fn print_single<T: Serialize>(data: &T, format: OutputFormat) -> CliResult<()> {
    println!("{}", render(data, format)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Tabled)]
    struct Row {
        account: String,
        balance: u64,
    }

    #[test]
    fn test_output_format_default() {
        assert!(matches!(OutputFormat::default(), OutputFormat::Table));
    }

    #[test]
    fn test_render_yaml() {
        let rendered = render(&vec![1u64, 2], OutputFormat::Yaml).unwrap();
        assert!(rendered.contains("- 1"));
    }

    #[test]
    fn test_render_table_has_headers() {
        let table = render_table(vec![Row {
            account: "alice".into(),
            balance: 9_400,
        }]);
        assert!(table.contains("account"));
        assert!(table.contains("balance"));
        assert!(table.contains("9400"));
    }
}
