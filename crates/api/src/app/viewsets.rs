//! ViewSet declarations for the back-office resources.
//!
//! Each function builds one validated ViewSet; `mount_all` compiles them and
//! merges the resulting routers. Route tables are built once here and never
//! mutated afterwards.

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use serde_json::json;

use opsdesk_core::{Record, field_str};
use opsdesk_viewsets::{
    ActionCall, ActionDef, AllowAny, ApiError, ConfigError, EntityDef, IsBackofficeUser,
    MemoryStore, Reply, RequestContext, SessionProvider, ViewSetDef, compile,
    translate_store_error,
};

use crate::app::{catalog, schemas};

use super::entities::Entities;

/// Compile every declared ViewSet and merge their routers.
pub fn mount_all(entities: &Entities, store: &Arc<MemoryStore>) -> Result<Router, ConfigError> {
    let sessions: Arc<dyn SessionProvider> = store.clone();

    let mut router = Router::new();
    for def in [
        permission_policies(entities)?,
        staff_users(entities)?,
        users(entities)?,
        general_settings(entities)?,
    ] {
        let compiled = compile(def, Arc::clone(&sessions))?;
        tracing::info!(
            prefix = %compiled.prefix,
            routes = compiled.routes.len(),
            "mounted viewset"
        );
        router = router.merge(compiled.router);
    }
    Ok(router)
}

/// Permission policies, plus a public catalog of every known permission key.
fn permission_policies(entities: &Entities) -> Result<Arc<ViewSetDef>, ConfigError> {
    ViewSetDef::builder(Arc::clone(&entities.permission_policy))
        .prefix("permissions")
        .list_schema(schemas::permission_policy_list())
        .read_schema(schemas::permission_policy_read())
        .create_schema(schemas::permission_policy_form())
        .update_schema(schemas::permission_policy_form())
        .permission(IsBackofficeUser)
        .action(
            ActionDef::new("default", |_call: &mut ActionCall<'_>| {
                Ok(Reply::ok(json!({
                    "msg": "list of all available permissions",
                    "data": catalog::formatted_permissions(),
                })))
            })
            .permissions(vec![Arc::new(AllowAny)]),
        )
        .build()
}

/// Staff accounts managed through the back-office.
fn staff_users(entities: &Entities) -> Result<Arc<ViewSetDef>, ConfigError> {
    let entity = Arc::clone(&entities.staff_user);

    ViewSetDef::builder(Arc::clone(&entities.staff_user))
        .schema(schemas::staff_user_read())
        .form_schema(schemas::staff_user_form())
        .permission(IsBackofficeUser)
        .list_filter(|ctx, mut rows| {
            if let Some(search) = ctx.query.get("search") {
                let needle = search.to_lowercase();
                rows.retain(|row| {
                    ["username", "name", "phone_number"].iter().any(|field| {
                        field_str(row, field)
                            .is_some_and(|value| value.to_lowercase().contains(&needle))
                    })
                });
            }
            rows.sort_by(|a, b| {
                field_str(a, "name")
                    .unwrap_or_default()
                    .cmp(field_str(b, "name").unwrap_or_default())
            });
            rows
        })
        .create_override(move |ctx, body| {
            validate_staff_role(&body)?;
            let session = ctx.db()?;
            session.stage_insert(&entity, body);
            let mut affected = session.commit().map_err(translate_store_error)?;
            affected
                .pop()
                .ok_or_else(|| ApiError::internal("insert yielded no row"))
        })
        .update_guard(|ctx, existing, changes| {
            validate_status_change(ctx, existing, changes)
        })
        .delete_guard(|ctx, existing| {
            if is_own_record(ctx, existing) {
                return Err(ApiError::bad_request(
                    "staff_user.cannot_delete_oneself",
                    "Staff users cannot delete their own account.",
                ));
            }
            Ok(())
        })
        .build()
}

fn validate_staff_role(body: &Record) -> Result<(), ApiError> {
    if field_str(body, "role") != Some("Backoffice") {
        return Err(ApiError::bad_request(
            "staff_user.invalid_role",
            "Only Backoffice staff accounts can be managed here.",
        ));
    }
    Ok(())
}

fn is_own_record(ctx: &RequestContext, record: &Record) -> bool {
    ctx.principal
        .as_ref()
        .zip(field_str(record, "id"))
        .is_some_and(|(principal, id)| principal.id.to_string() == id)
}

fn validate_status_change(
    ctx: &RequestContext,
    existing: &Record,
    changes: &Record,
) -> Result<(), ApiError> {
    let Some(new_status) = field_str(changes, "status") else {
        return Ok(());
    };
    let current = field_str(existing, "status").unwrap_or_default();
    if new_status == current {
        return Ok(());
    }
    if is_own_record(ctx, existing) {
        return Err(ApiError::bad_request(
            "staff_user.cannot_change_own_status",
            "Staff users cannot change their own status.",
        ));
    }
    if new_status == "Inactive" {
        return Err(ApiError::bad_request(
            "staff_user.cannot_inactive",
            "Staff users cannot be made inactive.",
        ));
    }
    if current != "Active"
        && matches!(new_status, "Blocked" | "Terminated" | "Password Locked")
    {
        return Err(ApiError::bad_request(
            "staff_user.cannot_block_terminate_inactive",
            "Only active staff users can be blocked or terminated.",
        ));
    }
    Ok(())
}

/// End-user accounts, managed by back-office staff.
fn users(entities: &Entities) -> Result<Arc<ViewSetDef>, ConfigError> {
    let entity = Arc::clone(&entities.user);

    ViewSetDef::builder(Arc::clone(&entities.user))
        .schema(schemas::user_read())
        .read_schema(schemas::user_read())
        .list_schema(schemas::user_list())
        .permission(IsBackofficeUser)
        .list_filter(|ctx, mut rows| {
            if let Some(search) = ctx.query.get("search") {
                let needle = search.to_lowercase();
                rows.retain(|row| {
                    ["name", "phone_number"].iter().any(|field| {
                        field_str(row, field)
                            .is_some_and(|value| value.to_lowercase().contains(&needle))
                    })
                });
            }
            rows.sort_by(|a, b| {
                field_str(a, "name")
                    .unwrap_or_default()
                    .cmp(field_str(b, "name").unwrap_or_default())
            });
            rows
        })
        .action(unblock_action(entity))
        .build()
}

/// Detail POST clearing a user's lock flag.
fn unblock_action(entity: Arc<EntityDef>) -> ActionDef {
    ActionDef::new("unblock", move |call: &mut ActionCall<'_>| {
        let id = call
            .id
            .clone()
            .ok_or_else(|| ApiError::internal("unblock requires an id"))?;
        let session = call.ctx.db()?;
        session.get(&entity, &id).map_err(translate_store_error)?;

        let mut fields = Record::new();
        fields.insert("is_locked".to_string(), json!(false));
        session.stage_update(&entity, id, fields);
        session.commit().map_err(translate_store_error)?;
        Ok(Reply::ok(json!({})))
    })
    .detail()
    .method(Method::POST)
}

/// Site-wide settings: a singleton resource, addressed without an id.
fn general_settings(entities: &Entities) -> Result<Arc<ViewSetDef>, ConfigError> {
    ViewSetDef::builder(Arc::clone(&entities.general_settings))
        .schema(schemas::general_settings())
        .permission(IsBackofficeUser)
        .build()
}
