//! 12-byte document identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};

use crate::db::{DbError, OBJECT_ID_KEY};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Document identifier: 4-byte timestamp, 4-byte process id, 4-byte counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn new() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        let process = std::process::id().to_be_bytes();
        let count = COUNTER.fetch_add(1, Ordering::Relaxed).to_be_bytes();

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..8].copy_from_slice(&process);
        bytes[8..12].copy_from_slice(&count);
        Self(bytes)
    }

    /// Extended-JSON form: `{"$oid": "<hex>"}`.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(OBJECT_ID_KEY.to_string(), Value::String(self.to_string()));
        Value::Object(map)
    }

    /// Parse the extended-JSON form produced by [`to_value`](Self::to_value).
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_object()
            .filter(|map| map.len() == 1)
            .and_then(|map| map.get(OBJECT_ID_KEY))
            .and_then(Value::as_str)
            .and_then(|hex| hex.parse().ok())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ObjectId {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| DbError::InvalidIdentifier {
            value: s.to_string(),
            help: format!("expected a 24 character hex string ({e})"),
        })?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_is_24_lowercase_hex() {
        let id = ObjectId::new().to_string();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_parse_accepts_display_output() {
        let id = ObjectId::new();
        let parsed: ObjectId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_accepts_uppercase_and_displays_lowercase() {
        let id: ObjectId = "65A1F0C2E4B0A1B2C3D4E5F6".parse().unwrap();
        assert_eq!(id.to_string(), "65a1f0c2e4b0a1b2c3d4e5f6");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for raw in [
            "",
            "abc",
            "zzzzzzzzzzzzzzzzzzzzzzzz",
            "65a1f0c2e4b0a1b2c3d4e5f6aa",
            "65a1f0c2e4b0a1b2c3d4é5",
        ] {
            let err = raw.parse::<ObjectId>().unwrap_err();
            assert!(matches!(err, DbError::InvalidIdentifier { .. }), "{}", raw);
        }
    }

    #[test]
    fn test_from_value_reads_extended_json() {
        let id = ObjectId::new();
        assert_eq!(ObjectId::from_value(&id.to_value()), Some(id));
        assert_eq!(ObjectId::from_value(&Value::String(id.to_string())), None);
    }
}
