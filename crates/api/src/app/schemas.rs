//! Request/response schemas for the back-office resources.

use std::sync::Arc;

use serde_json::json;

use opsdesk_viewsets::{FieldKind, Schema};

pub fn permission_policy_list() -> Arc<Schema> {
    Arc::new(
        Schema::new("PermissionPolicyList")
            .field("name", FieldKind::String)
            .optional("description", FieldKind::String)
            .with_default("is_active", FieldKind::Boolean, json!(false)),
    )
}

pub fn permission_policy_read() -> Arc<Schema> {
    Arc::new(
        Schema::new("PermissionPolicyRetrieve")
            .field("name", FieldKind::String)
            .optional("description", FieldKind::String)
            .with_default("is_active", FieldKind::Boolean, json!(false))
            .with_default("permissions", FieldKind::StringList, json!([])),
    )
}

pub fn permission_policy_form() -> Arc<Schema> {
    Arc::new(
        Schema::new("PermissionPolicyForm")
            .field("name", FieldKind::String)
            .optional("description", FieldKind::String)
            .with_default("is_active", FieldKind::Boolean, json!(false))
            .with_default("permissions", FieldKind::StringList, json!([])),
    )
}

pub fn staff_user_read() -> Arc<Schema> {
    Arc::new(
        Schema::new("StaffUserRead")
            .field("role", FieldKind::String)
            .field("name", FieldKind::String)
            .field("username", FieldKind::String)
            .optional("phone_number", FieldKind::String)
            .with_default("status", FieldKind::String, json!("Active"))
            .optional("status_remarks", FieldKind::String)
            .with_default("force_change_password", FieldKind::Boolean, json!(true))
            .optional("permission_policy_id", FieldKind::Integer)
            .with_default("is_superuser", FieldKind::Boolean, json!(false)),
    )
}

pub fn staff_user_form() -> Arc<Schema> {
    Arc::new(
        Schema::new("StaffUserForm")
            .field("role", FieldKind::String)
            .field("name", FieldKind::String)
            .field("username", FieldKind::String)
            .field("phone_number", FieldKind::String)
            .with_default("status", FieldKind::String, json!("Active"))
            .optional("status_remarks", FieldKind::String)
            .optional("permission_policy_id", FieldKind::Integer)
            .with_default("is_superuser", FieldKind::Boolean, json!(false)),
    )
}

pub fn user_read() -> Arc<Schema> {
    Arc::new(
        Schema::new("UserRead")
            .field("name", FieldKind::String)
            .field("phone_number", FieldKind::String)
            .with_default("status", FieldKind::String, json!("Active"))
            .with_default("is_locked", FieldKind::Boolean, json!(false)),
    )
}

pub fn user_list() -> Arc<Schema> {
    Arc::new(
        Schema::new("UserList")
            .field("name", FieldKind::String)
            .field("phone_number", FieldKind::String)
            .with_default("is_locked", FieldKind::Boolean, json!(false)),
    )
}

pub fn general_settings() -> Arc<Schema> {
    Arc::new(
        Schema::new("GeneralSettings")
            .with_default("maintenance_mode", FieldKind::Boolean, json!(false))
            .optional("support_phone", FieldKind::String),
    )
}
