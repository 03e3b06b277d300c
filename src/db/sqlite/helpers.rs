//! Shared SQL building helpers for the SQLite backend.

use serde_json::Value;
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;

use crate::db::{DbError, DbResult, FindOptions, Record, SortOrder};

/// Integer primary-key column of every resource table.
pub const ID_COLUMN: &str = "id";
/// JSON column holding every other field.
pub const DOC_COLUMN: &str = "doc";

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

/// Validate a table name: ASCII letters, digits and `_`, not starting with a digit.
pub fn validate_identifier(name: &str) -> DbResult<&str> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(name)
    } else {
        Err(DbError::InvalidData {
            message: format!("'{}' is not a valid name", name),
            help: "Use ASCII letters, digits and underscores, starting with a letter or underscore"
                .to_string(),
        })
    }
}

/// Quoted table name for `resource`.
pub fn quote_table(resource: &str) -> DbResult<String> {
    Ok(format!("\"{}\"", validate_identifier(resource)?))
}

/// SQL expression reading one top-level field of the document column.
///
/// The field name is bound to the `?` as-is and compared against the
/// object's keys, so any string that is a valid JSON key can be addressed.
pub fn field_value() -> String {
    format!("(SELECT value FROM json_each({DOC_COLUMN}) WHERE key = ?)")
}

/// Native row id carried by `id`.
pub fn row_id(id: &Value) -> DbResult<i64> {
    id.as_i64().ok_or_else(|| DbError::InvalidIdentifier {
        value: id.to_string(),
        help: "expected an integer row id".to_string(),
    })
}

fn scalar_bind(value: &Value) -> Bind {
    match value {
        Value::Null => Bind::Null,
        Value::Bool(b) => Bind::Int(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bind::Int(i),
            None => Bind::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Bind::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => Bind::Text(value.to_string()),
    }
}

/// Build a `WHERE` clause matching every field of `query` by equality.
///
/// The primary key maps onto the id column; other fields are read from the
/// document with [`field_value`].
pub fn build_where(query: &Record, primary_key: &str) -> DbResult<(String, Vec<Bind>)> {
    let mut conditions: Vec<String> = vec![];
    let mut binds: Vec<Bind> = vec![];

    for (field, value) in query {
        if field == primary_key {
            conditions.push(format!("{} = ?", ID_COLUMN));
            binds.push(Bind::Int(row_id(value)?));
            continue;
        }

        binds.push(Bind::Text(field.clone()));
        match value {
            Value::Null => conditions.push(format!("{} IS NULL", field_value())),
            Value::Array(_) | Value::Object(_) => {
                conditions.push(format!("{} = json(?)", field_value()));
                binds.push(scalar_bind(value));
            }
            _ => {
                conditions.push(format!("{} = ?", field_value()));
                binds.push(scalar_bind(value));
            }
        }
    }

    if conditions.is_empty() {
        Ok((String::new(), binds))
    } else {
        Ok((format!("WHERE {}", conditions.join(" AND ")), binds))
    }
}

/// Build the `ORDER BY` clause. Without a sort field rows come back in id order.
pub fn build_order(options: &FindOptions, primary_key: &str) -> (String, Vec<Bind>) {
    let Some(sort) = &options.sort else {
        return (format!("ORDER BY {ID_COLUMN} ASC"), vec![]);
    };

    let direction = match sort.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    if sort.field == primary_key {
        (format!("ORDER BY {ID_COLUMN} {direction}"), vec![])
    } else {
        (
            format!("ORDER BY {} {direction}, {ID_COLUMN} ASC", field_value()),
            vec![Bind::Text(sort.field.clone())],
        )
    }
}

/// Build the `LIMIT ... OFFSET ...` clause.
pub fn build_limit(options: &FindOptions) -> (String, Vec<Bind>) {
    if options.limit.is_none() && options.skip.is_none() {
        return (String::new(), vec![]);
    }

    // SQLite only accepts OFFSET after LIMIT; -1 means unbounded
    let limit = options.limit.map_or(-1, |l| l as i64);
    let skip = options.skip.unwrap_or(0) as i64;
    (
        "LIMIT ? OFFSET ?".to_string(),
        vec![Bind::Int(limit), Bind::Int(skip)],
    )
}

/// Bind every value in order.
pub fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &[Bind],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            Bind::Null => query.bind(None::<String>),
            Bind::Int(i) => query.bind(*i),
            Bind::Float(f) => query.bind(*f),
            Bind::Text(s) => query.bind(s.clone()),
        };
    }
    query
}
