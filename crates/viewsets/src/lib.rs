//! `opsdesk-viewsets` — declarative ViewSet → router compiler.
//!
//! A ViewSet bundles a backing entity, named schema slots, a permission
//! list, and custom actions; the compiler synthesizes the full route table
//! (the CRUD primitives plus one route per action) at boot and mounts it on
//! an axum router. Request dispatch layers the permission gate, the
//! request context, schema validation, and the persistence session around
//! the handler bodies.

pub mod actions;
pub mod compiler;
pub mod context;
pub mod crud;
pub mod dispatch;
pub mod errors;
pub mod pagination;
pub mod permissions;
pub mod resolver;
pub mod schema;
pub mod signature;
pub mod store;
pub mod viewset;

pub use actions::{ActionCall, ActionDef, ActionHandler, ActionResult, Interceptor, Reply};
pub use compiler::{CompiledViewSet, RouteMeta, compile};
pub use context::{DeferredAuthError, RequestContext};
pub use crud::get_object;
pub use errors::{ApiError, ConfigError, ErrorDetail, NOT_FOUND_MESSAGE, translate_store_error};
pub use pagination::{Pagination, page_count, paginate};
pub use permissions::{
    AllowAny, IsAuthenticated, IsAuthenticatedOrReadOnly, IsBackofficeUser, IsStaffUser, IsUser,
    IsUserOrReadOnly, PermissionCheck, ReadOnly, enforce,
};
pub use resolver::{GenericSlot, Resolved, SchemaSlots};
pub use schema::{Field, FieldKind, Schema};
pub use signature::{ParamSource, ParamSpec, RouteSignature};
pub use store::{
    EntityDef, ForeignKey, MemoryStore, Session, SessionProvider, StoreBackend, StoreError,
};
pub use viewset::{Capabilities, CrudHooks, ViewSetBuilder, ViewSetDef};
