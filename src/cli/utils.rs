//! Shared utilities for CLI commands

use serde_json::Value;
use tabled::{Table, builder::Builder, settings::Style};

use crate::cli::error::{CliError, CliResult};
use crate::db::{Record, record_from_value};

/// Truncate a string with ellipsis if it exceeds max length
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Render a field value for a table cell. Strings print bare, missing values as `-`.
pub fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => truncate_with_ellipsis(s, 40),
        Some(other) => truncate_with_ellipsis(&other.to_string(), 40),
    }
}

/// Parse a JSON object argument into a record
pub fn parse_record(json: &str) -> CliResult<Record> {
    let value: Value = serde_json::from_str(json)?;
    record_from_value(value).ok_or_else(|| CliError::InvalidJson {
        message: "expected a JSON object".to_string(),
    })
}

/// Parse comma-separated field names
pub fn parse_fields(fields: Option<&str>) -> Option<Vec<String>> {
    fields.map(|f| {
        f.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Build a table whose columns are every field seen, in first-seen order
pub fn records_table(records: &[Record]) -> Table {
    let mut columns: Vec<&str> = vec![];
    for record in records {
        for key in record.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(|c| c.to_string()));
    for record in records {
        builder.push_record(columns.iter().map(|c| format_cell(record.get(*c))));
    }

    let mut table = builder.build();
    apply_table_style(&mut table);
    table
}

/// Apply consistent table styling
pub fn apply_table_style(table: &mut Table) {
    table.with(Style::rounded());
}
