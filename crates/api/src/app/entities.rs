//! Entity declarations for the back-office resources.

use std::sync::Arc;

use serde_json::json;

use opsdesk_core::IdKind;
use opsdesk_viewsets::{EntityDef, MemoryStore};

/// All declared entities, built once at boot and shared by the viewsets,
/// the seed step, and the store.
pub struct Entities {
    pub permission_policy: Arc<EntityDef>,
    pub staff_user: Arc<EntityDef>,
    pub user: Arc<EntityDef>,
    pub general_settings: Arc<EntityDef>,
}

impl Entities {
    pub fn declare() -> Self {
        let permission_policy = Arc::new(
            EntityDef::new("PermissionPolicy", "permission_policies", IdKind::Int).unique("name"),
        );

        let staff_user = Arc::new(
            EntityDef::new("StaffUser", "staff_users", IdKind::Uuid)
                .unique("username")
                .foreign_key("permission_policy_id", "permission_policies"),
        );

        let user = Arc::new(EntityDef::new("User", "users", IdKind::Uuid).unique("phone_number"));

        let general_settings = Arc::new(
            EntityDef::new("GeneralSettings", "general_settings", IdKind::Int).singleton(
                json!({
                    "maintenance_mode": false,
                    "support_phone": null,
                })
                .as_object()
                .cloned()
                .unwrap_or_default(),
            ),
        );

        Self {
            permission_policy,
            staff_user,
            user,
            general_settings,
        }
    }

    pub fn build_store(&self) -> Arc<MemoryStore> {
        MemoryStore::new([
            (*self.permission_policy).clone(),
            (*self.staff_user).clone(),
            (*self.user).clone(),
            (*self.general_settings).clone(),
        ])
    }
}
