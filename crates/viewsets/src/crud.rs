//! Default CRUD execution bodies.
//!
//! These operate on the request context's session and the ViewSet's
//! declaration; the dispatch layer has already run the permission gate and
//! validated/parsed the body where applicable.

use serde_json::{Value, json};

use opsdesk_core::{Record, RecordId, id_of};

use crate::actions::Reply;
use crate::context::RequestContext;
use crate::errors::{ApiError, translate_store_error};
use crate::pagination::{page_param, paginate};
use crate::resolver::Resolved;
use crate::schema::Schema;
use crate::store::StoreError;
use crate::viewset::ViewSetDef;

fn shape_resolved(resolved: &Resolved, record: &Record) -> Value {
    match resolved {
        Resolved::Schema(schema) => Value::Object(schema.project(record)),
        Resolved::Raw => Value::Object(record.clone()),
    }
}

fn shape_opt(schema: Option<&Schema>, record: &Record) -> Value {
    match schema {
        Some(schema) => Value::Object(schema.project(record)),
        None => Value::Object(record.clone()),
    }
}

/// Shared fetch-by-identifier accessor.
///
/// Malformed identifiers degrade to `NotFound` after rolling back any staged
/// state, leaving the session clean for the next operation. Singleton
/// resources are created from their initial data on first access.
pub fn get_object(def: &ViewSetDef, ctx: &mut RequestContext) -> Result<Record, ApiError> {
    if def.is_singleton() {
        let session = ctx.db()?;
        if let Some(row) = session
            .rows(&def.entity)
            .map_err(translate_store_error)?
            .into_iter()
            .next()
        {
            return Ok(row);
        }
        session.stage_insert(&def.entity, def.entity.initial_data.clone());
        let mut created = session.commit().map_err(translate_store_error)?;
        return created
            .pop()
            .ok_or_else(|| ApiError::internal("singleton insert yielded no row"));
    }

    let raw = ctx
        .raw_id()
        .map(str::to_string)
        .ok_or_else(|| ApiError::internal("detail route without id path param"))?;
    let session = ctx.db()?;
    match session.get_raw(&def.entity, &raw) {
        Ok(record) => Ok(record),
        Err(err @ (StoreError::MalformedId | StoreError::NotFound)) => {
            session.rollback();
            Err(translate_store_error(err))
        }
        Err(err) => Err(translate_store_error(err)),
    }
}

/// `GET /` — fetch, filter/order, paginate when configured.
pub fn list(def: &ViewSetDef, ctx: &mut RequestContext, response: &Resolved) -> Result<Reply, ApiError> {
    let rows = ctx.db()?.rows(&def.entity).map_err(translate_store_error)?;
    let rows = match &def.hooks.list_filter {
        Some(filter) => filter(ctx, rows),
        None => rows,
    };

    match def.page_size {
        Some(size) => {
            let page = page_param(&ctx.query)?;
            let (slice, pagination) = paginate(rows, size, page);
            let results: Vec<Value> = slice.iter().map(|r| shape_resolved(response, r)).collect();
            Ok(Reply::ok(json!({
                "pagination": pagination,
                "results": results,
            })))
        }
        None => {
            let results: Vec<Value> = rows.iter().map(|r| shape_resolved(response, r)).collect();
            Ok(Reply::ok(Value::Array(results)))
        }
    }
}

/// `GET /{id}` — one record or 404.
pub fn retrieve(
    def: &ViewSetDef,
    ctx: &mut RequestContext,
    response: &Resolved,
) -> Result<Reply, ApiError> {
    let record = get_object(def, ctx)?;
    Ok(Reply::ok(shape_resolved(response, &record)))
}

/// `POST /` — validate, persist, 201 with the created record.
pub fn create(
    def: &ViewSetDef,
    ctx: &mut RequestContext,
    schema: &Schema,
    response: Option<&Schema>,
    body: &Value,
) -> Result<Reply, ApiError> {
    let validated = schema.validate(body, false).map_err(ApiError::Validation)?;
    let record = persist_insert(def, ctx, validated)?;
    Ok(Reply::created(shape_opt(response, &record)))
}

/// Upload-capable create: the multipart field map is persisted directly,
/// bypassing schema-object validation.
pub fn create_multipart(
    def: &ViewSetDef,
    ctx: &mut RequestContext,
    response: Option<&Schema>,
    fields: Record,
) -> Result<Reply, ApiError> {
    let record = persist_insert(def, ctx, fields)?;
    Ok(Reply::created(shape_opt(response, &record)))
}

fn persist_insert(
    def: &ViewSetDef,
    ctx: &mut RequestContext,
    fields: Record,
) -> Result<Record, ApiError> {
    if let Some(custom) = def.hooks.create.clone() {
        return custom(ctx, fields);
    }
    let session = ctx.db()?;
    session.stage_insert(&def.entity, fields);
    let mut affected = session.commit().map_err(translate_store_error)?;
    affected
        .pop()
        .ok_or_else(|| ApiError::internal("insert yielded no row"))
}

/// `PATCH /{id}` (or `PATCH /` for singletons) — partial update.
///
/// A body carrying no schema fields at all is rejected before any lookup.
pub fn update(
    def: &ViewSetDef,
    ctx: &mut RequestContext,
    schema: &Schema,
    response: Option<&Schema>,
    body: &Value,
) -> Result<Reply, ApiError> {
    let changes = schema.validate(body, true).map_err(ApiError::Validation)?;
    if changes.is_empty() {
        return Err(ApiError::empty_update_body());
    }
    let existing = get_object(def, ctx)?;
    apply_update(def, ctx, existing, changes, response)
}

/// Upload-capable update: persists the raw multipart field map.
pub fn update_multipart(
    def: &ViewSetDef,
    ctx: &mut RequestContext,
    response: Option<&Schema>,
    fields: Record,
) -> Result<Reply, ApiError> {
    if fields.is_empty() {
        return Err(ApiError::empty_update_body());
    }
    let existing = get_object(def, ctx)?;
    apply_update(def, ctx, existing, fields, response)
}

fn apply_update(
    def: &ViewSetDef,
    ctx: &mut RequestContext,
    existing: Record,
    changes: Record,
    response: Option<&Schema>,
) -> Result<Reply, ApiError> {
    if let Some(guard) = &def.hooks.update_guard {
        guard(ctx, &existing, &changes)?;
    }
    let id = record_id(def, &existing)?;

    let session = ctx.db()?;
    session.stage_update(&def.entity, id.clone(), changes);
    session.commit().map_err(translate_store_error)?;

    // Re-fetch so the response reflects exactly what landed.
    let updated = session.get(&def.entity, &id).map_err(translate_store_error)?;
    Ok(Reply::ok(shape_opt(response, &updated)))
}

/// `GET /{id}/initial-form-data` — prefetch for edit forms.
pub fn initial_form_data(
    def: &ViewSetDef,
    ctx: &mut RequestContext,
    response: &Resolved,
) -> Result<Reply, ApiError> {
    let record = get_object(def, ctx)?;
    Ok(Reply::ok(shape_resolved(response, &record)))
}

/// `DELETE /{id}` — 204 on success; constraint violations become 422.
pub fn delete(def: &ViewSetDef, ctx: &mut RequestContext) -> Result<Reply, ApiError> {
    let existing = get_object(def, ctx)?;
    if let Some(guard) = &def.hooks.delete_guard {
        guard(ctx, &existing)?;
    }
    let id = record_id(def, &existing)?;

    let session = ctx.db()?;
    session.stage_delete(&def.entity, id);
    session.commit().map_err(translate_store_error)?;
    Ok(Reply::no_content())
}

fn record_id(def: &ViewSetDef, record: &Record) -> Result<RecordId, ApiError> {
    id_of(record, def.entity.id_kind)
        .ok_or_else(|| ApiError::internal("stored record has no readable id"))
}
