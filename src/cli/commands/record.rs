use serde_json::{Value, json};
use tabled::builder::Builder;

use crate::cli::commands::PageParams;
use crate::cli::error::{CliError, CliResult};
use crate::cli::utils::{apply_table_style, format_cell, parse_record, records_table};
use crate::db::{Backend, PersistenceAdapter, SaveOperation, stringify_id};

fn check_format(format: &str) -> CliResult<bool> {
    match format {
        "table" => Ok(false),
        "json" => Ok(true),
        other => Err(CliError::InvalidArgument {
            message: format!("unknown format '{}' (expected table or json)", other),
        }),
    }
}

/// List records matching an optional JSON query
pub async fn find_records<B: Backend>(
    adapter: &PersistenceAdapter<B>,
    query: Option<&str>,
    page: PageParams<'_>,
    format: &str,
) -> CliResult<String> {
    let as_json = check_format(format)?;
    let query = query.map(parse_record).transpose()?;
    let options = page.to_find_options()?;

    let records = adapter.find_all(query.as_ref(), Some(&options)).await?;

    if as_json {
        return Ok(serde_json::to_string_pretty(&records)?);
    }
    if records.is_empty() {
        return Ok(format!("No {} records found.", adapter.resource()));
    }
    Ok(records_table(&records).to_string())
}

/// Show one record by id
pub async fn get_record<B: Backend>(
    adapter: &PersistenceAdapter<B>,
    id: &str,
    format: &str,
) -> CliResult<String> {
    let as_json = check_format(format)?;

    let record = adapter
        .find_by_id(id)
        .await?
        .ok_or_else(|| CliError::NotFound {
            resource: adapter.resource().to_string(),
            id: id.to_string(),
        })?;

    if as_json {
        return Ok(serde_json::to_string_pretty(&record)?);
    }

    let mut builder = Builder::default();
    builder.push_record(["Field".to_string(), "Value".to_string()]);
    for (field, value) in &record {
        builder.push_record([field.clone(), format_cell(Some(value))]);
    }
    let mut table = builder.build();
    apply_table_style(&mut table);
    Ok(table.to_string())
}

/// Insert or update a record given as a JSON object
pub async fn save_record<B: Backend>(
    adapter: &PersistenceAdapter<B>,
    record: &str,
    format: &str,
) -> CliResult<String> {
    let as_json = check_format(format)?;
    let record = parse_record(record)?;

    let outcome = adapter.save(record).await?;

    if as_json {
        let output = json!({
            "operation": outcome.operation,
            "id": outcome.id,
            "record": outcome.record,
        });
        return Ok(serde_json::to_string_pretty(&output)?);
    }

    let verb = match outcome.operation {
        SaveOperation::Insert => "Inserted",
        SaveOperation::Update => "Updated",
    };
    Ok(format!(
        "{} {} {}",
        verb,
        adapter.resource(),
        outcome.id_string().unwrap_or_default()
    ))
}

/// Delete a record by id
pub async fn remove_record<B: Backend>(
    adapter: &PersistenceAdapter<B>,
    id: &str,
) -> CliResult<String> {
    adapter.remove(id).await?;
    Ok(format!("Removed {} {}", adapter.resource(), id))
}

/// List the distinct values of one field
pub async fn distinct_values<B: Backend>(
    adapter: &PersistenceAdapter<B>,
    field: &str,
    query: Option<&str>,
    format: &str,
) -> CliResult<String> {
    let as_json = check_format(format)?;
    let query = query.map(parse_record).transpose()?;

    let values = adapter.distinct(field, query.as_ref()).await?;

    if as_json {
        return Ok(serde_json::to_string_pretty(&values)?);
    }

    let mut builder = Builder::default();
    builder.push_record([field.to_string()]);
    for value in &values {
        let cell = match value {
            Value::Object(_) => stringify_id(value).unwrap_or_else(|| value.to_string()),
            other => format_cell(Some(other)),
        };
        builder.push_record([cell]);
    }
    let mut table = builder.build();
    apply_table_style(&mut table);
    Ok(table.to_string())
}
