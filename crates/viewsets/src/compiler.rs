//! Route compilation: ViewSet declaration → immutable route table + router.
//!
//! Routes are synthesized in a fixed order — custom actions first (in
//! declaration order), then the singleton pair or the collection CRUD
//! routes, each conditional on the declared capabilities. A route moves
//! from declared to compiled (signature synthesized, checks attached) to
//! registered (added to the table); nothing transitions back, and the table
//! is never mutated after boot.

use std::sync::Arc;

use axum::Router;
use axum::http::{Method, StatusCode};
use axum::routing::{MethodFilter, MethodRouter};

use crate::dispatch;
use crate::errors::ConfigError;
use crate::permissions::PermissionCheck;
use crate::resolver::Resolved;
use crate::schema::Schema;
use crate::signature::{RouteSignature, action_signature, crud_signature, multipart_signature};
use crate::store::SessionProvider;
use crate::viewset::ViewSetDef;

/// How the dispatch layer executes a compiled route.
pub(crate) enum RouteExec {
    List { response: Resolved },
    Retrieve { response: Resolved },
    Create {
        schema: Arc<Schema>,
        response: Option<Arc<Schema>>,
    },
    Update {
        schema: Arc<Schema>,
        response: Option<Arc<Schema>>,
    },
    InitialFormData { response: Resolved },
    Delete,
    /// Index into the ViewSet's action list.
    Action { index: usize },
}

/// One registered route.
pub(crate) struct CompiledRoute {
    pub path: String,
    pub method: Method,
    pub action: String,
    pub signature: RouteSignature,
    pub success_status: StatusCode,
    pub documents_not_found: bool,
    pub checks: Vec<Arc<dyn PermissionCheck>>,
    pub exec: RouteExec,
}

/// Public per-route metadata, for mounting and introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMeta {
    /// Display path relative to the prefix, e.g. `/{id}/initial-form-data`.
    pub path: String,
    pub method: Method,
    pub action: String,
    pub signature: RouteSignature,
    pub success_status: StatusCode,
    pub documents_not_found: bool,
}

/// A ViewSet compiled into a route table and a mountable router.
pub struct CompiledViewSet {
    pub prefix: String,
    pub routes: Vec<RouteMeta>,
    pub router: Router,
}

/// Compile a ViewSet against a session provider.
pub fn compile(
    def: Arc<ViewSetDef>,
    sessions: Arc<dyn SessionProvider>,
) -> Result<CompiledViewSet, ConfigError> {
    let view = def.view_name();
    let mut routes: Vec<CompiledRoute> = Vec::new();

    // 1. Custom actions, in declaration order. First-registered wins when
    //    paths overlap; later duplicates are dropped below.
    for (index, action) in def.actions.iter().enumerate() {
        let checks = action
            .permissions
            .clone()
            .unwrap_or_else(|| def.permissions.clone());
        let path = if action.detail {
            format!("/{{id}}/{}", action.url_segment())
        } else {
            format!("/{}", action.url_segment())
        };
        let signature = action_signature(action);
        for method in &action.methods {
            routes.push(CompiledRoute {
                path: path.clone(),
                method: method.clone(),
                action: action.name.clone(),
                signature: signature.clone(),
                success_status: action.success_status,
                documents_not_found: action.detail,
                checks: checks.clone(),
                exec: RouteExec::Action { index },
            });
        }
    }

    // 2./3. CRUD routes.
    if def.is_singleton() {
        let retrieve = def.slots.for_retrieve(&view)?;
        routes.push(CompiledRoute {
            path: String::new(),
            method: Method::GET,
            action: "retrieve".to_string(),
            signature: crud_signature("retrieve", false, false, false),
            success_status: StatusCode::OK,
            documents_not_found: false,
            checks: def.permissions.clone(),
            exec: RouteExec::Retrieve { response: retrieve },
        });

        let schema = def.slots.for_update(&view)?;
        routes.push(CompiledRoute {
            path: String::new(),
            method: Method::PATCH,
            action: "update".to_string(),
            signature: update_signature(&schema, false),
            success_status: StatusCode::OK,
            documents_not_found: false,
            checks: def.permissions.clone(),
            exec: RouteExec::Update {
                schema,
                response: def.slots.update_response(),
            },
        });
    } else {
        if def.capabilities.list {
            let response = def.slots.for_list(&view)?;
            routes.push(CompiledRoute {
                path: String::new(),
                method: Method::GET,
                action: "list".to_string(),
                signature: crud_signature("list", false, false, def.page_size.is_some()),
                success_status: StatusCode::OK,
                documents_not_found: false,
                checks: def.permissions.clone(),
                exec: RouteExec::List { response },
            });
        }
        if def.capabilities.retrieve {
            let response = def.slots.for_retrieve(&view)?;
            routes.push(CompiledRoute {
                path: "/{id}".to_string(),
                method: Method::GET,
                action: "retrieve".to_string(),
                signature: crud_signature("retrieve", true, false, false),
                success_status: StatusCode::OK,
                documents_not_found: true,
                checks: def.permissions.clone(),
                exec: RouteExec::Retrieve { response },
            });
        }
        if def.capabilities.create {
            let schema = def.slots.for_create(&view)?;
            let signature = if schema.has_file_fields() {
                multipart_signature(&schema, false)
            } else {
                crud_signature("create", false, true, false)
            };
            routes.push(CompiledRoute {
                path: String::new(),
                method: Method::POST,
                action: "create".to_string(),
                signature,
                success_status: StatusCode::CREATED,
                documents_not_found: false,
                checks: def.permissions.clone(),
                exec: RouteExec::Create {
                    response: def.slots.create_response(),
                    schema,
                },
            });
        }
        if def.capabilities.update {
            let schema = def.slots.for_update(&view)?;
            routes.push(CompiledRoute {
                path: "/{id}".to_string(),
                method: Method::PATCH,
                action: "update".to_string(),
                signature: update_signature(&schema, true),
                success_status: StatusCode::OK,
                documents_not_found: true,
                checks: def.permissions.clone(),
                exec: RouteExec::Update {
                    response: def.slots.update_response(),
                    schema,
                },
            });

            let response = def.slots.for_initial_form_data(&view)?;
            routes.push(CompiledRoute {
                path: "/{id}/initial-form-data".to_string(),
                method: Method::GET,
                action: "initial_form_data".to_string(),
                signature: crud_signature("initial_form_data", true, false, false),
                success_status: StatusCode::OK,
                documents_not_found: true,
                checks: def.permissions.clone(),
                exec: RouteExec::InitialFormData { response },
            });
        }
        if def.capabilities.delete {
            routes.push(CompiledRoute {
                path: "/{id}".to_string(),
                method: Method::DELETE,
                action: "delete".to_string(),
                signature: crud_signature("delete", true, false, false),
                success_status: StatusCode::NO_CONTENT,
                documents_not_found: true,
                checks: def.permissions.clone(),
                exec: RouteExec::Delete,
            });
        }
    }

    mount(def, sessions, routes)
}

fn update_signature(schema: &Schema, with_id: bool) -> RouteSignature {
    if schema.has_file_fields() {
        multipart_signature(schema, with_id)
    } else {
        crud_signature("update", with_id, true, false)
    }
}

fn mount(
    def: Arc<ViewSetDef>,
    sessions: Arc<dyn SessionProvider>,
    routes: Vec<CompiledRoute>,
) -> Result<CompiledViewSet, ConfigError> {
    let view = def.view_name();
    let prefix = def.prefix();

    let mut meta: Vec<RouteMeta> = Vec::new();
    // (path, MethodRouter) pairs in first-registration order.
    let mut mounted: Vec<(String, MethodRouter)> = Vec::new();
    let mut seen: Vec<(String, Method)> = Vec::new();

    for route in routes {
        let key = (route.path.clone(), route.method.clone());
        if seen.contains(&key) {
            // First-registered wins for ambiguous routes.
            tracing::warn!(
                view = %view,
                path = %route.path,
                method = %route.method,
                action = %route.action,
                "duplicate route dropped"
            );
            continue;
        }
        seen.push(key);

        let filter = MethodFilter::try_from(route.method.clone()).map_err(|_| {
            ConfigError::UnsupportedMethod {
                view: view.clone(),
                action: route.action.clone(),
                method: route.method.to_string(),
            }
        })?;

        meta.push(RouteMeta {
            path: route.path.clone(),
            method: route.method.clone(),
            action: route.action.clone(),
            signature: route.signature.clone(),
            success_status: route.success_status,
            documents_not_found: route.documents_not_found,
        });

        let axum_path = to_axum_path(&route.path);
        let method_router = dispatch::method_route(
            Arc::clone(&def),
            Arc::clone(&sessions),
            Arc::new(route),
            filter,
        );

        match mounted.iter_mut().find(|(path, _)| *path == axum_path) {
            Some((_, existing)) => {
                let merged = std::mem::take(existing).merge(method_router);
                *existing = merged;
            }
            None => mounted.push((axum_path, method_router)),
        }
    }

    let mut inner = Router::new();
    for (path, method_router) in mounted {
        inner = inner.route(&path, method_router);
    }

    let router = Router::new().nest(&format!("/{prefix}"), inner);

    Ok(CompiledViewSet {
        prefix,
        routes: meta,
        router,
    })
}

/// Display path → axum 0.7 path syntax (`/{id}` → `/:id`).
fn to_axum_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.replace("{id}", ":id")
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use opsdesk_core::IdKind;
    use serde_json::json;

    use crate::actions::{ActionDef, Reply};
    use crate::schema::{FieldKind, Schema};
    use crate::store::{EntityDef, MemoryStore};
    use crate::viewset::ViewSetDef;

    use super::*;

    fn compiled(def: Arc<ViewSetDef>) -> CompiledViewSet {
        let store = MemoryStore::new([EntityDef::new("StaffUser", "staff_users", IdKind::Uuid)]);
        compile(def, store).unwrap()
    }

    fn base_builder() -> crate::viewset::ViewSetBuilder {
        ViewSetDef::builder(Arc::new(EntityDef::new(
            "StaffUser",
            "staff_users",
            IdKind::Uuid,
        )))
        .schema(Arc::new(
            Schema::new("StaffUser").field("name", FieldKind::String),
        ))
    }

    fn route_keys(compiled: &CompiledViewSet) -> Vec<(String, Method)> {
        compiled
            .routes
            .iter()
            .map(|r| (r.path.clone(), r.method.clone()))
            .collect()
    }

    #[test]
    fn collection_viewset_compiles_the_full_sextet() {
        let def = base_builder().build().unwrap();
        let compiled = compiled(def);
        assert_eq!(compiled.prefix, "staff-user");
        assert_eq!(
            route_keys(&compiled),
            vec![
                (String::new(), Method::GET),
                ("/{id}".to_string(), Method::GET),
                (String::new(), Method::POST),
                ("/{id}".to_string(), Method::PATCH),
                ("/{id}/initial-form-data".to_string(), Method::GET),
                ("/{id}".to_string(), Method::DELETE),
            ]
        );
    }

    #[test]
    fn actions_come_first_in_declaration_order() {
        let def = base_builder()
            .action(ActionDef::new("zeta", |_| Ok(Reply::ok(json!({})))))
            .action(
                ActionDef::new("alpha", |_| Ok(Reply::ok(json!({}))))
                    .detail()
                    .method(Method::POST),
            )
            .build()
            .unwrap();
        let compiled = compiled(def);
        // Declaration order, not alphabetical.
        assert_eq!(compiled.routes[0].action, "zeta");
        assert_eq!(compiled.routes[0].path, "/zeta");
        assert_eq!(compiled.routes[1].action, "alpha");
        assert_eq!(compiled.routes[1].path, "/{id}/alpha");
        assert_eq!(compiled.routes[2].action, "list");
    }

    #[test]
    fn duplicate_routes_keep_the_first_registration() {
        let def = base_builder()
            .action(
                ActionDef::new("winner", |_| Ok(Reply::ok(json!({"first": true}))))
                    .url_path("same")
                    .method(Method::POST),
            )
            .action(
                ActionDef::new("loser", |_| Ok(Reply::ok(json!({"first": false}))))
                    .url_path("same")
                    .method(Method::POST),
            )
            .build()
            .unwrap();
        let compiled = compiled(def);
        let same: Vec<_> = compiled
            .routes
            .iter()
            .filter(|r| r.path == "/same")
            .collect();
        assert_eq!(same.len(), 1);
        assert_eq!(same[0].action, "winner");
    }

    #[test]
    fn singleton_compiles_only_retrieve_and_update() {
        let entity = Arc::new(
            EntityDef::new("GeneralSettings", "general_settings", IdKind::Int)
                .singleton(json!({"maintenance_mode": false}).as_object().cloned().unwrap()),
        );
        let def = ViewSetDef::builder(entity)
            .schema(Arc::new(
                Schema::new("GeneralSettings").field("maintenance_mode", FieldKind::Boolean),
            ))
            .build()
            .unwrap();
        let compiled = compiled(def);
        assert_eq!(
            route_keys(&compiled),
            vec![
                (String::new(), Method::GET),
                (String::new(), Method::PATCH),
            ]
        );
    }

    #[test]
    fn delete_route_documents_404_and_204() {
        let def = base_builder().build().unwrap();
        let compiled = compiled(def);
        let delete = compiled
            .routes
            .iter()
            .find(|r| r.action == "delete")
            .unwrap();
        assert_eq!(delete.success_status, StatusCode::NO_CONTENT);
        assert!(delete.documents_not_found);
    }

    #[test]
    fn file_bearing_create_schema_compiles_to_multipart() {
        let def = base_builder()
            .create_schema(Arc::new(
                Schema::new("UploadForm")
                    .field("name", FieldKind::String)
                    .field("avatar", FieldKind::File),
            ))
            .build()
            .unwrap();
        let compiled = compiled(def);
        let create = compiled
            .routes
            .iter()
            .find(|r| r.action == "create")
            .unwrap();
        assert!(create.signature.is_multipart());
    }
}
