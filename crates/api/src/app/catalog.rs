//! Static catalog of known permission keys, grouped per resource.

use serde_json::{Map, Value, json};

/// (group, permission) pairs, in display order.
pub const PERMISSIONS: &[(&str, &str)] = &[
    ("StaffUser", "List Staff User"),
    ("StaffUser", "View Staff User"),
    ("StaffUser", "Create Staff User"),
    ("StaffUser", "Update Staff User"),
    ("StaffUser", "Delete Staff User"),
    ("User", "List User"),
    ("User", "View User"),
    ("User", "Update User"),
    ("User", "Unblock User"),
    ("PermissionPolicy", "List Permission Policy"),
    ("PermissionPolicy", "View Permission Policy"),
    ("PermissionPolicy", "Create Permission Policy"),
    ("PermissionPolicy", "Update Permission Policy"),
    ("PermissionPolicy", "Delete Permission Policy"),
    ("GeneralSettings", "View General Settings"),
    ("GeneralSettings", "Update General Settings"),
];

/// Group the flat pairs into `{group: [permission, ...]}` for clients.
pub fn formatted_permissions() -> Value {
    let mut grouped: Map<String, Value> = Map::new();
    for (group, permission) in PERMISSIONS {
        match grouped.get_mut(*group) {
            Some(Value::Array(items)) => items.push(json!(permission)),
            _ => {
                grouped.insert(group.to_string(), json!([permission]));
            }
        }
    }
    Value::Object(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_are_grouped_by_resource() {
        let formatted = formatted_permissions();
        let staff = formatted["StaffUser"].as_array().unwrap();
        assert_eq!(staff.len(), 5);
        assert!(staff.contains(&json!("Delete Staff User")));
        assert_eq!(formatted["GeneralSettings"].as_array().unwrap().len(), 2);
    }
}
