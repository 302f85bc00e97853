//! Route signature synthesis.
//!
//! A compiled route carries an explicit parameter list describing what the
//! dispatch layer extracts and in which canonical position. Building it is a
//! pure data transformation over the ViewSet declaration — the routing
//! framework never inspects handler functions.

use crate::actions::ActionDef;
use crate::schema::{FieldKind, Schema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    /// The request context (method, principal, query, path params).
    Context,
    /// A path segment, e.g. the record identifier.
    Path,
    /// A query parameter.
    Query,
    /// The JSON request body, validated against a schema.
    JsonBody,
    /// One scalar field of a multipart form.
    FormField(FieldKind),
    /// One file field of a multipart form.
    FileField,
    /// The persistence session, injected after the permission gate.
    Session,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub source: ParamSource,
    pub required: bool,
}

impl ParamSpec {
    fn new(name: impl Into<String>, source: ParamSource, required: bool) -> Self {
        Self {
            name: name.into(),
            source,
            required,
        }
    }
}

/// The synthesized calling signature of one compiled route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSignature {
    pub params: Vec<ParamSpec>,
}

impl RouteSignature {
    pub fn is_multipart(&self) -> bool {
        self.params.iter().any(|p| {
            matches!(p.source, ParamSource::FormField(_) | ParamSource::FileField)
        })
    }

    /// Multipart field specs in declaration order.
    pub fn form_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| {
            matches!(p.source, ParamSource::FormField(_) | ParamSource::FileField)
        })
    }
}

/// Signature of a primitive CRUD route.
pub fn crud_signature(action: &str, with_id: bool, body: bool, paginated: bool) -> RouteSignature {
    let mut params = vec![ParamSpec::new("ctx", ParamSource::Context, true)];
    if with_id {
        params.push(ParamSpec::new("id", ParamSource::Path, true));
    }
    if paginated && action == "list" {
        params.push(ParamSpec::new("page", ParamSource::Query, false));
    }
    if body {
        params.push(ParamSpec::new("body", ParamSource::JsonBody, true));
    }
    params.push(ParamSpec::new("session", ParamSource::Session, true));
    RouteSignature { params }
}

/// Signature of a custom action route.
///
/// The declared handler only sees the call object; here we synthesize the
/// canonical parameter order the route exposes: context first, then the
/// identifier for detail actions, then the body (JSON or multipart spread),
/// with the session injected last.
pub fn action_signature(action: &ActionDef) -> RouteSignature {
    let mut params = vec![ParamSpec::new("ctx", ParamSource::Context, true)];
    if action.detail {
        params.push(ParamSpec::new("id", ParamSource::Path, true));
    }
    match &action.request_schema {
        Some(schema) if schema.has_file_fields() => {
            params.extend(multipart_params(schema));
        }
        Some(_) => params.push(ParamSpec::new("body", ParamSource::JsonBody, true)),
        None => {}
    }
    params.push(ParamSpec::new("session", ParamSource::Session, true));
    RouteSignature { params }
}

/// Signature of an upload-capable create/update route, built field by field
/// from the schema: required fields become required form fields, optional or
/// defaulted fields become optional form fields.
pub fn multipart_signature(schema: &Schema, with_id: bool) -> RouteSignature {
    let mut params = vec![ParamSpec::new("ctx", ParamSource::Context, true)];
    if with_id {
        params.push(ParamSpec::new("id", ParamSource::Path, true));
    }
    params.extend(multipart_params(schema));
    params.push(ParamSpec::new("session", ParamSource::Session, true));
    RouteSignature { params }
}

fn multipart_params(schema: &Schema) -> Vec<ParamSpec> {
    let mut required = Vec::new();
    let mut optional = Vec::new();
    for field in &schema.fields {
        let source = match field.kind {
            FieldKind::File => ParamSource::FileField,
            kind => ParamSource::FormField(kind),
        };
        let is_required = field.required && field.default.is_none();
        let spec = ParamSpec::new(field.name.clone(), source, is_required);
        if is_required {
            required.push(spec);
        } else {
            optional.push(spec);
        }
    }
    // Required parameters come before defaulted/optional ones.
    required.extend(optional);
    required
}
