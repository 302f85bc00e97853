//! Record identifiers.
//!
//! Resources are addressed either by an integer sequence or by a UUID;
//! which one is fixed per entity at declaration time.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DomainError;

/// Which identifier family an entity uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Int,
    Uuid,
}

/// A concrete record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Uuid(Uuid),
}

impl RecordId {
    /// Mint a fresh identifier of the given kind.
    ///
    /// Integer ids are allocated by the store; this only covers UUIDs
    /// (v7, time-ordered). Prefer passing ids explicitly in tests.
    pub fn new_uuid() -> Self {
        Self::Uuid(Uuid::now_v7())
    }

    /// Parse a raw path segment against the entity's id kind.
    ///
    /// A segment that does not parse for the kind is a malformed lookup,
    /// not a different identifier.
    pub fn parse(raw: &str, kind: IdKind) -> Result<Self, DomainError> {
        match kind {
            IdKind::Int => i64::from_str(raw)
                .map(Self::Int)
                .map_err(|e| DomainError::invalid_id(format!("int id: {e}"))),
            IdKind::Uuid => Uuid::from_str(raw)
                .map(Self::Uuid)
                .map_err(|e| DomainError::invalid_id(format!("uuid id: {e}"))),
        }
    }

    pub fn kind(&self) -> IdKind {
        match self {
            Self::Int(_) => IdKind::Int,
            Self::Uuid(_) => IdKind::Uuid,
        }
    }

    /// JSON representation as stored on records.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::Uuid(u) => Value::from(u.to_string()),
        }
    }

    /// Read an id back out of a record field.
    pub fn from_value(value: &Value, kind: IdKind) -> Option<Self> {
        match (kind, value) {
            (IdKind::Int, Value::Number(n)) => n.as_i64().map(Self::Int),
            (IdKind::Uuid, Value::String(s)) => Uuid::from_str(s).ok().map(Self::Uuid),
            _ => None,
        }
    }
}

impl core::fmt::Display for RecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Int(n) => core::fmt::Display::fmt(n, f),
            Self::Uuid(u) => core::fmt::Display::fmt(u, f),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Uuid> for RecordId {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}
