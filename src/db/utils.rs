//! Record matching, ordering and projection shared by the backends.

use std::cmp::Ordering;

use serde_json::Value;

use crate::db::{FindOptions, Record, SortOrder};

/// Returns true if every field in `query` is present in `record` with an equal value.
///
/// A `null` in the query also matches a missing field.
pub fn matches_query(record: &Record, query: &Record) -> bool {
    query.iter().all(|(field, expected)| match record.get(field) {
        Some(actual) => actual == expected,
        None => expected.is_null(),
    })
}

// Null < numbers < strings < objects < arrays < booleans
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total ordering over JSON values used for sorting.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Keep only `fields` (plus the primary key) in `record`, preserving order.
pub fn project_fields(record: Record, fields: &[String], primary_key: &str) -> Record {
    record
        .into_iter()
        .filter(|(name, _)| name == primary_key || fields.iter().any(|f| f == name))
        .collect()
}

/// Apply sort, skip, limit and projection to an already-filtered result set.
pub fn apply_find_options(
    mut records: Vec<Record>,
    options: &FindOptions,
    primary_key: &str,
) -> Vec<Record> {
    if let Some(sort) = &options.sort {
        records.sort_by(|a, b| {
            let ordering = compare_values(
                a.get(&sort.field).unwrap_or(&Value::Null),
                b.get(&sort.field).unwrap_or(&Value::Null),
            );
            match sort.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    let skip = options.skip.unwrap_or(0);
    let limit = options.limit.unwrap_or(usize::MAX);
    let page = records.into_iter().skip(skip).take(limit);

    match &options.fields {
        Some(fields) => page
            .map(|r| project_fields(r, fields, primary_key))
            .collect(),
        None => page.collect(),
    }
}

/// Distinct values of `field` across `records`, in first-seen order.
///
/// Records without the field are ignored.
pub fn distinct_values<'a, I>(records: I, field: &str) -> Vec<Value>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut values: Vec<Value> = Vec::new();
    for value in records.into_iter().filter_map(|r| r.get(field)) {
        if !values.contains(value) {
            values.push(value.clone());
        }
    }
    values
}
