//! ViewSet declarations.
//!
//! A ViewSet is an explicit configuration struct: backing entity, schema
//! slots, permission list, capabilities, pagination, custom actions, and
//! optional CRUD hooks. The builder validates the declaration up front —
//! a ViewSet that cannot resolve a schema for an action it exposes never
//! compiles into routes.

use std::sync::Arc;

use opsdesk_core::Record;

use crate::actions::ActionDef;
use crate::context::RequestContext;
use crate::errors::{ApiError, ConfigError};
use crate::permissions::PermissionCheck;
use crate::resolver::{GenericSlot, SchemaSlots};
use crate::schema::Schema;
use crate::store::EntityDef;

/// Which CRUD primitives a ViewSet exposes.
///
/// The route compiler checks these flags instead of probing for methods.
/// `initial_form_data` rides with `update` (it prefetches edit forms).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub list: bool,
    pub retrieve: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl Capabilities {
    /// Full model ViewSet: all five primitives.
    pub fn model() -> Self {
        Self {
            list: true,
            retrieve: true,
            create: true,
            update: true,
            delete: true,
        }
    }

    /// List and retrieve only.
    pub fn read_only() -> Self {
        Self {
            list: true,
            retrieve: true,
            create: false,
            update: false,
            delete: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::model()
    }
}

/// Filter/order hook applied to the fetched rows during `list`.
pub type ListFilter = Arc<dyn Fn(&RequestContext, Vec<Record>) -> Vec<Record> + Send + Sync>;

/// Replaces the default create: receives the validated body, stages and
/// commits its own writes, returns the created record.
pub type CreateOverride =
    Arc<dyn Fn(&mut RequestContext, Record) -> Result<Record, ApiError> + Send + Sync>;

/// Runs between fetch and persist on update: (ctx, existing, changes).
pub type UpdateGuard =
    Arc<dyn Fn(&RequestContext, &Record, &Record) -> Result<(), ApiError> + Send + Sync>;

/// Runs between fetch and delete: (ctx, existing).
pub type DeleteGuard = Arc<dyn Fn(&RequestContext, &Record) -> Result<(), ApiError> + Send + Sync>;

/// Optional application hooks around the default CRUD bodies.
#[derive(Clone, Default)]
pub struct CrudHooks {
    pub list_filter: Option<ListFilter>,
    pub create: Option<CreateOverride>,
    pub update_guard: Option<UpdateGuard>,
    pub delete_guard: Option<DeleteGuard>,
}

/// A validated ViewSet declaration, immutable after `build()`.
pub struct ViewSetDef {
    pub entity: Arc<EntityDef>,
    pub prefix_override: Option<String>,
    pub slots: SchemaSlots,
    pub permissions: Vec<Arc<dyn PermissionCheck>>,
    pub capabilities: Capabilities,
    /// Rows per page; `None` disables pagination.
    pub page_size: Option<u64>,
    /// Custom actions in declaration order.
    pub actions: Vec<ActionDef>,
    pub hooks: CrudHooks,
}

impl std::fmt::Debug for ViewSetDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewSetDef")
            .field("entity", &self.entity.name)
            .field("prefix_override", &self.prefix_override)
            .field("permissions", &self.permissions.len())
            .field("capabilities", &self.capabilities)
            .field("page_size", &self.page_size)
            .field("actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}

impl ViewSetDef {
    pub fn builder(entity: Arc<EntityDef>) -> ViewSetBuilder {
        ViewSetBuilder {
            entity,
            prefix: None,
            slots: SchemaSlots::default(),
            permissions: Vec::new(),
            capabilities: Capabilities::model(),
            page_size: Some(20),
            actions: Vec::new(),
            hooks: CrudHooks::default(),
        }
    }

    /// Diagnostic name used in configuration errors.
    pub fn view_name(&self) -> String {
        format!("{}ViewSet", self.entity.name)
    }

    /// URL prefix: explicit override or the kebab-cased entity name.
    pub fn prefix(&self) -> String {
        self.prefix_override
            .clone()
            .unwrap_or_else(|| kebab_case(&self.entity.name))
    }

    pub fn is_singleton(&self) -> bool {
        self.entity.singleton
    }
}

/// PascalCase → kebab-case, grouping consecutive capitals ("StaffUser" →
/// "staff-user", "APIKey" → "apikey").
fn kebab_case(name: &str) -> String {
    let mut out = String::new();
    let mut prev_upper = false;
    for ch in name.chars() {
        let upper = ch.is_ascii_uppercase();
        if upper && !prev_upper && !out.is_empty() {
            out.push('-');
        }
        out.push(ch.to_ascii_lowercase());
        prev_upper = upper;
    }
    out
}

pub struct ViewSetBuilder {
    entity: Arc<EntityDef>,
    prefix: Option<String>,
    slots: SchemaSlots,
    permissions: Vec<Arc<dyn PermissionCheck>>,
    capabilities: Capabilities,
    page_size: Option<u64>,
    actions: Vec<ActionDef>,
    hooks: CrudHooks,
}

impl ViewSetBuilder {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Generic schema slot, the final fallback for every action.
    pub fn schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.schema = GenericSlot::Schema(schema);
        self
    }

    /// Explicitly disable the generic slot: list/retrieve fall back to raw
    /// records instead of failing configuration.
    pub fn no_schema(mut self) -> Self {
        self.slots.schema = GenericSlot::Disabled;
        self
    }

    pub fn list_schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.list = Some(schema);
        self
    }

    pub fn retrieve_schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.retrieve = Some(schema);
        self
    }

    pub fn read_schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.read = Some(schema);
        self
    }

    pub fn create_schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.create = Some(schema);
        self
    }

    pub fn create_response_schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.create_response = Some(schema);
        self
    }

    pub fn update_schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.update = Some(schema);
        self
    }

    pub fn update_response_schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.update_response = Some(schema);
        self
    }

    pub fn form_schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.form = Some(schema);
        self
    }

    pub fn initial_form_schema(mut self, schema: Arc<Schema>) -> Self {
        self.slots.initial_form = Some(schema);
        self
    }

    pub fn permission(mut self, check: impl PermissionCheck + 'static) -> Self {
        self.permissions.push(Arc::new(check));
        self
    }

    pub fn permissions(mut self, checks: Vec<Arc<dyn PermissionCheck>>) -> Self {
        self.permissions = checks;
        self
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.capabilities = Capabilities::read_only();
        self
    }

    pub fn page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn no_pagination(mut self) -> Self {
        self.page_size = None;
        self
    }

    /// Register a custom action. Declaration order is registration order.
    pub fn action(mut self, action: ActionDef) -> Self {
        self.actions.push(action);
        self
    }

    pub fn list_filter(
        mut self,
        f: impl Fn(&RequestContext, Vec<Record>) -> Vec<Record> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.list_filter = Some(Arc::new(f));
        self
    }

    pub fn create_override(
        mut self,
        f: impl Fn(&mut RequestContext, Record) -> Result<Record, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.create = Some(Arc::new(f));
        self
    }

    pub fn update_guard(
        mut self,
        f: impl Fn(&RequestContext, &Record, &Record) -> Result<(), ApiError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.hooks.update_guard = Some(Arc::new(f));
        self
    }

    pub fn delete_guard(
        mut self,
        f: impl Fn(&RequestContext, &Record) -> Result<(), ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.delete_guard = Some(Arc::new(f));
        self
    }

    /// Validate the declaration. Every schema an exposed action needs must
    /// resolve here; request handling never re-checks.
    pub fn build(self) -> Result<Arc<ViewSetDef>, ConfigError> {
        let def = ViewSetDef {
            entity: self.entity,
            prefix_override: self.prefix,
            slots: self.slots,
            permissions: self.permissions,
            capabilities: self.capabilities,
            page_size: self.page_size,
            actions: self.actions,
            hooks: self.hooks,
        };
        let view = def.view_name();

        if def.page_size == Some(0) {
            return Err(ConfigError::ZeroPageSize { view });
        }

        if def.is_singleton() {
            def.slots.for_retrieve(&view)?;
            def.slots.for_update(&view)?;
        } else {
            if def.capabilities.list {
                def.slots.for_list(&view)?;
            }
            if def.capabilities.retrieve {
                def.slots.for_retrieve(&view)?;
            }
            if def.capabilities.create {
                def.slots.for_create(&view)?;
            }
            if def.capabilities.update {
                def.slots.for_update(&view)?;
                def.slots.for_initial_form_data(&view)?;
            }
        }

        Ok(Arc::new(def))
    }
}

#[cfg(test)]
mod tests {
    use opsdesk_core::IdKind;

    use crate::schema::FieldKind;

    use super::*;

    fn entity() -> Arc<EntityDef> {
        Arc::new(EntityDef::new("StaffUser", "staff_users", IdKind::Uuid))
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new("StaffUser").field("name", FieldKind::String))
    }

    #[test]
    fn prefix_defaults_to_kebab_cased_entity_name() {
        let def = ViewSetDef::builder(entity()).schema(schema()).build().unwrap();
        assert_eq!(def.prefix(), "staff-user");

        let def = ViewSetDef::builder(entity())
            .schema(schema())
            .prefix("staff-users")
            .build()
            .unwrap();
        assert_eq!(def.prefix(), "staff-users");
    }

    #[test]
    fn zero_page_size_is_rejected_at_build_time() {
        let err = ViewSetDef::builder(entity())
            .schema(schema())
            .page_size(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroPageSize { .. }));
    }

    #[test]
    fn missing_schema_fails_at_build_time_not_request_time() {
        let err = ViewSetDef::builder(entity()).build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSchema { .. }));
    }

    #[test]
    fn read_only_viewset_needs_no_write_schemas() {
        let def = ViewSetDef::builder(entity())
            .read_only()
            .list_schema(schema())
            .retrieve_schema(schema())
            .build();
        assert!(def.is_ok());
    }

    #[test]
    fn kebab_case_groups_capital_runs() {
        assert_eq!(kebab_case("StaffUser"), "staff-user");
        assert_eq!(kebab_case("PermissionPolicy"), "permission-policy");
        assert_eq!(kebab_case("APIKey"), "apikey");
        assert_eq!(kebab_case("GeneralSettings"), "general-settings");
    }
}
