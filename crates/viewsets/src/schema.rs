//! Data-driven validation/serialization schemas.
//!
//! Schemas are explicit field lists rather than per-entity structs: the
//! route compiler needs to inspect them (to synthesize multipart signatures
//! field by field) and to validate arbitrary JSON bodies against them.

use serde_json::{Map, Value};
use uuid::Uuid;

use opsdesk_core::Record;

use crate::errors::ErrorDetail;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Uuid,
    DateTime,
    StringList,
    /// An uploaded file. Schemas containing one are routed through the
    /// multipart execution path; a JSON body can never satisfy them.
    File,
}

impl FieldKind {
    fn type_error(self) -> &'static str {
        match self {
            Self::String => "type_error.str",
            Self::Integer => "type_error.integer",
            Self::Float => "type_error.float",
            Self::Boolean => "type_error.bool",
            Self::Uuid => "type_error.uuid",
            Self::DateTime => "type_error.datetime",
            Self::StringList => "type_error.list",
            Self::File => "type_error.file",
        }
    }

    /// Type-check (and lightly normalize) a JSON value.
    fn check(self, value: &Value) -> Result<Value, &'static str> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::String, Value::String(_)) => Ok(value.clone()),
            (Self::Integer, Value::Number(n)) if n.as_i64().is_some() => Ok(value.clone()),
            (Self::Float, Value::Number(_)) => Ok(value.clone()),
            (Self::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (Self::Uuid, Value::String(s)) => Uuid::parse_str(s)
                .map(|u| Value::String(u.to_string()))
                .map_err(|_| self.type_error()),
            (Self::DateTime, Value::String(s)) => {
                chrono::DateTime::parse_from_rfc3339(s)
                    .map(|_| value.clone())
                    .map_err(|_| self.type_error())
            }
            (Self::StringList, Value::Array(items)) => {
                if items.iter().all(Value::is_string) {
                    Ok(value.clone())
                } else {
                    Err(self.type_error())
                }
            }
            _ => Err(self.type_error()),
        }
    }

    /// Coerce a multipart text field into the schema's value space.
    pub(crate) fn coerce_text(self, raw: &str) -> Result<Value, &'static str> {
        match self {
            Self::String => Ok(Value::String(raw.to_string())),
            Self::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| self.type_error()),
            Self::Float => raw
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| self.type_error()),
            Self::Boolean => match raw {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(self.type_error()),
            },
            Self::Uuid => Uuid::parse_str(raw)
                .map(|u| Value::String(u.to_string()))
                .map_err(|_| self.type_error()),
            Self::DateTime => chrono::DateTime::parse_from_rfc3339(raw)
                .map(|_| Value::String(raw.to_string()))
                .map_err(|_| self.type_error()),
            Self::StringList => Ok(Value::Array(
                raw.split(',').map(|s| Value::String(s.trim().to_string())).collect(),
            )),
            Self::File => Err(self.type_error()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            required: true,
            default: None,
        });
        self
    }

    /// Add an optional field (validates to null when absent).
    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            required: false,
            default: None,
        });
        self
    }

    /// Add an optional field with a default applied on full validation.
    pub fn with_default(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        default: Value,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            required: false,
            default: Some(default),
        });
        self
    }

    pub fn has_file_fields(&self) -> bool {
        self.fields.iter().any(|f| f.kind == FieldKind::File)
    }

    /// Validate a JSON body against this schema.
    ///
    /// Full validation (`partial == false`) requires every required field and
    /// fills optional absences with defaults (or null). Partial validation
    /// makes every field optional and returns only the fields actually
    /// provided (exclude-unset semantics). Unknown fields are dropped.
    pub fn validate(&self, body: &Value, partial: bool) -> Result<Record, Vec<ErrorDetail>> {
        let Some(object) = body.as_object() else {
            return Err(vec![
                ErrorDetail::new("type_error.dict")
                    .msg("Request body must be a JSON object.")
                    .loc(vec!["body"]),
            ]);
        };

        let mut out = Map::new();
        let mut errors = Vec::new();

        for field in &self.fields {
            match object.get(&field.name) {
                Some(value) => match field.kind.check(value) {
                    Ok(normalized) => {
                        out.insert(field.name.clone(), normalized);
                    }
                    Err(kind) => errors.push(
                        ErrorDetail::new(kind)
                            .msg(format!("Invalid value for {}", field.name))
                            .loc(vec!["body".to_string(), field.name.clone()]),
                    ),
                },
                None if partial => {}
                None if field.required => errors.push(
                    ErrorDetail::new("value_error.missing")
                        .msg("field required")
                        .loc(vec!["body".to_string(), field.name.clone()]),
                ),
                None => {
                    out.insert(
                        field.name.clone(),
                        field.default.clone().unwrap_or(Value::Null),
                    );
                }
            }
        }

        if errors.is_empty() { Ok(out) } else { Err(errors) }
    }

    /// Shape a stored record for a response: keep `id` plus declared fields.
    pub fn project(&self, record: &Record) -> Record {
        let mut out = Map::new();
        if let Some(id) = record.get("id") {
            out.insert("id".to_string(), id.clone());
        }
        for field in &self.fields {
            if field.kind == FieldKind::File {
                continue;
            }
            let value = record.get(&field.name).cloned().unwrap_or(Value::Null);
            out.insert(field.name.clone(), value);
        }
        out
    }
}
