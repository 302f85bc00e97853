//! Startup data: the initial superadmin staff account.

use std::sync::Arc;

use serde_json::json;

use opsdesk_core::field_str;
use opsdesk_viewsets::{MemoryStore, SessionProvider, StoreError};

use super::entities::Entities;

pub const SUPERADMIN_USERNAME: &str = "superadmin";

/// Create the superadmin staff record when it does not exist yet.
pub fn create_superadmin(entities: &Entities, store: &Arc<MemoryStore>) -> Result<(), StoreError> {
    let mut session = store.session();

    let exists = session
        .rows(&entities.staff_user)?
        .iter()
        .any(|row| field_str(row, "username") == Some(SUPERADMIN_USERNAME));
    if exists {
        return Ok(());
    }

    let record = json!({
        "role": "Backoffice",
        "name": "Super Admin",
        "username": SUPERADMIN_USERNAME,
        "phone_number": "0000000000",
        "status": "Active",
        "status_remarks": null,
        "force_change_password": true,
        "permission_policy_id": null,
        "is_superuser": true,
    });
    session.stage_insert(
        &entities.staff_user,
        record.as_object().cloned().unwrap_or_default(),
    );
    session.commit()?;
    tracing::info!(username = SUPERADMIN_USERNAME, "seeded superadmin account");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_twice_creates_one_record() {
        let entities = Entities::declare();
        let store = entities.build_store();
        create_superadmin(&entities, &store).unwrap();
        create_superadmin(&entities, &store).unwrap();

        let session = store.session();
        let rows = session.rows(&entities.staff_user).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["is_superuser"], json!(true));
    }
}
