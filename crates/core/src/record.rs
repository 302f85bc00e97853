//! Dynamic record representation.
//!
//! The CRUD engine is generic over declarative entity definitions, so rows
//! travel as JSON objects rather than per-entity structs.

use serde_json::{Map, Value};

use crate::id::{IdKind, RecordId};

/// One stored row: field name → JSON value. Always carries an `id` field.
pub type Record = Map<String, Value>;

/// Extract the identifier from a record.
pub fn id_of(record: &Record, kind: IdKind) -> Option<RecordId> {
    record.get("id").and_then(|v| RecordId::from_value(v, kind))
}

/// Read a string field, if present and a string.
pub fn field_str<'a>(record: &'a Record, name: &str) -> Option<&'a str> {
    record.get(name).and_then(Value::as_str)
}
