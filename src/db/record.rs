//! Records, query options and identifier helpers.
//!
//! These types are storage-agnostic: every backend reads and writes
//! [`Record`]s, and every query is expressed as a [`Record`] of field
//! equalities plus [`FindOptions`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One persisted entity: an ordered mapping from field name to value.
pub type Record = Map<String, Value>;

/// Extended-JSON key used for native document identifiers.
pub const OBJECT_ID_KEY: &str = "$oid";

// =============================================================================
// Query Options
// =============================================================================

/// Sort order for find queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Field and direction to sort by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

/// Options accepted by `find_one` / `find_all`.
///
/// The default value means "no limit, no skip, natural order, all fields".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Maximum number of records to return.
    pub limit: Option<usize>,
    /// Number of records to skip.
    pub skip: Option<usize>,
    pub sort: Option<Sort>,
    /// Fields to keep in each record. The primary key is always kept.
    pub fields: Option<Vec<String>>,
}

impl FindOptions {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            order,
        });
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

// =============================================================================
// Value Helpers
// =============================================================================

/// JSON truthiness: `null`, `false`, zero and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render an identifier as text.
///
/// Strings pass through, numbers are formatted, and extended-JSON object
/// identifiers (`{"$oid": "..."}`) yield their hex string. Falsy values
/// yield `None`.
pub fn stringify_id(value: &Value) -> Option<String> {
    if !is_truthy(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => match map.get(OBJECT_ID_KEY) {
            Some(Value::String(hex)) if map.len() == 1 => Some(hex.clone()),
            _ => Some(value.to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Build a record from a JSON value, rejecting anything but an object.
pub fn record_from_value(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
