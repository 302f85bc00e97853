//! Persistence collaborator: entity definitions, per-request sessions, and
//! a constrained in-memory engine.
//!
//! The CRUD pipeline never talks to a concrete database; it works against
//! [`Session`] objects handed out by a [`SessionProvider`]. A session stages
//! writes and applies them atomically on `commit()` — the single point where
//! declared constraints (unique fields, foreign keys) are checked. Sessions
//! are request-scoped and never shared across requests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;
use thiserror::Error;

use opsdesk_core::{IdKind, Record, RecordId, id_of};

/// Declarative description of one stored entity.
#[derive(Debug, Clone)]
pub struct EntityDef {
    /// Resource name in PascalCase (e.g. `StaffUser`); drives URL prefixes.
    pub name: String,
    /// Storage table name in snake_case (e.g. `staff_users`); drives
    /// constraint naming.
    pub table: String,
    pub id_kind: IdKind,
    /// Fields whose values must be unique across the table.
    pub unique: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Singleton entities have exactly one row, created on first access.
    pub singleton: bool,
    /// Seed row for singleton get-or-create.
    pub initial_data: Record,
}

/// A foreign key declaration. Deletes of the referenced row are restricted
/// while a referencing row exists; inserts/updates must reference an
/// existing row (or be null).
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub field: String,
    /// Table name of the referenced entity.
    pub references: String,
}

impl EntityDef {
    pub fn new(name: impl Into<String>, table: impl Into<String>, id_kind: IdKind) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            id_kind,
            unique: Vec::new(),
            foreign_keys: Vec::new(),
            singleton: false,
            initial_data: Record::new(),
        }
    }

    pub fn unique(mut self, field: impl Into<String>) -> Self {
        self.unique.push(field.into());
        self
    }

    pub fn foreign_key(mut self, field: impl Into<String>, references: impl Into<String>) -> Self {
        self.foreign_keys.push(ForeignKey {
            field: field.into(),
            references: references.into(),
        });
        self
    }

    pub fn singleton(mut self, initial_data: Record) -> Self {
        self.singleton = true;
        self.initial_data = initial_data;
        self
    }

    /// Postgres-style constraint name for a foreign key on this table.
    pub fn fk_constraint(&self, field: &str) -> String {
        format!("{}_{}_fkey", self.table, field)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The identifier did not parse for the entity's id kind.
    #[error("malformed identifier")]
    MalformedId,

    #[error("row not found")]
    NotFound,

    #[error("duplicate value for `{field}`")]
    UniqueViolation { field: String },

    #[error("invalid foreign key value for `{table}`")]
    ForeignKeyInvalid { table: String },

    #[error("row still referenced by `{constraint}`")]
    ForeignKeyProtected { constraint: String },

    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
}

/// One staged write, applied at commit.
#[derive(Debug, Clone)]
pub enum StagedOp {
    Insert { table: String, record: Record },
    Update {
        table: String,
        id: RecordId,
        fields: Record,
    },
    Delete { table: String, id: RecordId },
}

/// Hands out per-request sessions. Explicitly constructed and injected into
/// the route compiler; never a process-wide global.
pub trait SessionProvider: Send + Sync {
    fn session(&self) -> Session;
}

/// Committed-state reads plus atomic application of staged writes.
pub trait StoreBackend: Send + Sync {
    fn rows(&self, table: &str) -> Result<Vec<Record>, StoreError>;

    fn get(&self, table: &str, id: &RecordId) -> Result<Option<Record>, StoreError>;

    /// Apply a batch of staged ops atomically: either every op lands and the
    /// affected rows are returned (in op order), or nothing changes.
    fn apply(&self, ops: Vec<StagedOp>) -> Result<Vec<Record>, StoreError>;
}

/// A request-scoped unit of work.
///
/// Reads see committed state. Writes are staged locally and take effect only
/// on [`Session::commit`]; `rollback()` (or dropping the session) discards
/// anything staged.
pub struct Session {
    backend: Arc<dyn StoreBackend>,
    staged: Vec<StagedOp>,
}

impl Session {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            staged: Vec::new(),
        }
    }

    pub fn rows(&self, entity: &EntityDef) -> Result<Vec<Record>, StoreError> {
        self.backend.rows(&entity.table)
    }

    pub fn get(&self, entity: &EntityDef, id: &RecordId) -> Result<Record, StoreError> {
        self.backend
            .get(&entity.table, id)?
            .ok_or(StoreError::NotFound)
    }

    /// Fetch by a raw path segment. A segment that does not parse for the
    /// entity's id kind is a malformed lookup.
    pub fn get_raw(&self, entity: &EntityDef, raw: &str) -> Result<Record, StoreError> {
        let id = RecordId::parse(raw, entity.id_kind).map_err(|_| StoreError::MalformedId)?;
        self.get(entity, &id)
    }

    pub fn stage_insert(&mut self, entity: &EntityDef, record: Record) {
        self.staged.push(StagedOp::Insert {
            table: entity.table.clone(),
            record,
        });
    }

    pub fn stage_update(&mut self, entity: &EntityDef, id: RecordId, fields: Record) {
        self.staged.push(StagedOp::Update {
            table: entity.table.clone(),
            id,
            fields,
        });
    }

    pub fn stage_delete(&mut self, entity: &EntityDef, id: RecordId) {
        self.staged.push(StagedOp::Delete {
            table: entity.table.clone(),
            id,
        });
    }

    /// Apply staged writes atomically. On failure nothing has landed and the
    /// staged set is discarded, leaving the session clean for reuse.
    pub fn commit(&mut self) -> Result<Vec<Record>, StoreError> {
        let ops = std::mem::take(&mut self.staged);
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.apply(ops)
    }

    /// Discard staged writes.
    pub fn rollback(&mut self) {
        self.staged.clear();
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Record>,
    seq: i64,
}

/// In-memory store engine with declared-constraint enforcement.
pub struct MemoryStore {
    defs: HashMap<String, EntityDef>,
    tables: RwLock<HashMap<String, Table>>,
    // Self-handle so `SessionProvider::session` can hand out backend Arcs.
    this: Weak<MemoryStore>,
}

impl MemoryStore {
    pub fn new(entities: impl IntoIterator<Item = EntityDef>) -> Arc<Self> {
        let mut defs = HashMap::new();
        let mut tables = HashMap::new();
        for entity in entities {
            tables.insert(entity.table.clone(), Table::default());
            defs.insert(entity.table.clone(), entity);
        }
        Arc::new_cyclic(|this| Self {
            defs,
            tables: RwLock::new(tables),
            this: this.clone(),
        })
    }

    fn def(&self, table: &str) -> Result<&EntityDef, StoreError> {
        self.defs
            .get(table)
            .ok_or_else(|| StoreError::UnknownEntity(table.to_string()))
    }

    fn check_unique(
        def: &EntityDef,
        tables: &HashMap<String, Table>,
        record: &Record,
        exclude: Option<&RecordId>,
    ) -> Result<(), StoreError> {
        let table = &tables[&def.table];
        for field in &def.unique {
            let Some(value) = record.get(field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            for row in &table.rows {
                if let Some(exclude) = exclude {
                    if id_of(row, def.id_kind).as_ref() == Some(exclude) {
                        continue;
                    }
                }
                if row.get(field) == Some(value) {
                    return Err(StoreError::UniqueViolation {
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_foreign_keys(
        &self,
        def: &EntityDef,
        tables: &HashMap<String, Table>,
        fields: &Record,
    ) -> Result<(), StoreError> {
        for fk in &def.foreign_keys {
            let Some(value) = fields.get(&fk.field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let referenced = self.def(&fk.references)?;
            let Some(id) = RecordId::from_value(value, referenced.id_kind) else {
                return Err(StoreError::ForeignKeyInvalid {
                    table: fk.references.clone(),
                });
            };
            let present = tables[&fk.references]
                .rows
                .iter()
                .any(|row| id_of(row, referenced.id_kind) == Some(id.clone()));
            if !present {
                return Err(StoreError::ForeignKeyInvalid {
                    table: fk.references.clone(),
                });
            }
        }
        Ok(())
    }

    /// Deleting `id` from `def` must not leave dangling references.
    fn check_protected(
        &self,
        def: &EntityDef,
        tables: &HashMap<String, Table>,
        id: &RecordId,
    ) -> Result<(), StoreError> {
        let id_value = id.to_value();
        for child in self.defs.values() {
            for fk in &child.foreign_keys {
                if fk.references != def.table {
                    continue;
                }
                let referenced = tables[&child.table]
                    .rows
                    .iter()
                    .any(|row| row.get(&fk.field) == Some(&id_value));
                if referenced {
                    return Err(StoreError::ForeignKeyProtected {
                        constraint: child.fk_constraint(&fk.field),
                    });
                }
            }
        }
        Ok(())
    }

    fn position(def: &EntityDef, table: &Table, id: &RecordId) -> Result<usize, StoreError> {
        table
            .rows
            .iter()
            .position(|row| id_of(row, def.id_kind).as_ref() == Some(id))
            .ok_or(StoreError::NotFound)
    }
}

impl StoreBackend for MemoryStore {
    fn rows(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        self.def(table)?;
        let tables = self.tables.read().expect("store lock poisoned");
        Ok(tables[table].rows.clone())
    }

    fn get(&self, table: &str, id: &RecordId) -> Result<Option<Record>, StoreError> {
        let def = self.def(table)?;
        let tables = self.tables.read().expect("store lock poisoned");
        Ok(tables[table]
            .rows
            .iter()
            .find(|row| id_of(row, def.id_kind).as_ref() == Some(id))
            .cloned())
    }

    fn apply(&self, ops: Vec<StagedOp>) -> Result<Vec<Record>, StoreError> {
        let mut tables = self.tables.write().expect("store lock poisoned");

        // Work on a copy so a failing op mid-batch leaves nothing applied.
        let mut working: HashMap<String, Table> = tables
            .iter()
            .map(|(name, table)| {
                (
                    name.clone(),
                    Table {
                        rows: table.rows.clone(),
                        seq: table.seq,
                    },
                )
            })
            .collect();

        let mut affected = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                StagedOp::Insert { table, mut record } => {
                    let def = self.def(&table)?.clone();
                    if record.get("id").is_none_or(Value::is_null) {
                        let id = match def.id_kind {
                            IdKind::Int => {
                                let entry = working.get_mut(&table).expect("known table");
                                entry.seq += 1;
                                RecordId::Int(entry.seq)
                            }
                            IdKind::Uuid => RecordId::new_uuid(),
                        };
                        record.insert("id".to_string(), id.to_value());
                    }
                    Self::check_unique(&def, &working, &record, None)?;
                    self.check_foreign_keys(&def, &working, &record)?;
                    working
                        .get_mut(&table)
                        .expect("known table")
                        .rows
                        .push(record.clone());
                    affected.push(record);
                }
                StagedOp::Update { table, id, fields } => {
                    let def = self.def(&table)?.clone();
                    let pos = Self::position(&def, &working[&table], &id)?;
                    let mut updated = working[&table].rows[pos].clone();
                    for (name, value) in &fields {
                        updated.insert(name.clone(), value.clone());
                    }
                    Self::check_unique(&def, &working, &updated, Some(&id))?;
                    self.check_foreign_keys(&def, &working, &fields)?;
                    working.get_mut(&table).expect("known table").rows[pos] = updated.clone();
                    affected.push(updated);
                }
                StagedOp::Delete { table, id } => {
                    let def = self.def(&table)?.clone();
                    let pos = Self::position(&def, &working[&table], &id)?;
                    self.check_protected(&def, &working, &id)?;
                    let removed = working
                        .get_mut(&table)
                        .expect("known table")
                        .rows
                        .remove(pos);
                    affected.push(removed);
                }
            }
        }

        *tables = working;
        Ok(affected)
    }
}

impl SessionProvider for MemoryStore {
    fn session(&self) -> Session {
        let backend: Arc<dyn StoreBackend> =
            self.this.upgrade().expect("MemoryStore is only constructed behind an Arc");
        Session::new(backend)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(pairs: Value) -> Record {
        pairs.as_object().cloned().expect("object literal")
    }

    fn store() -> Arc<MemoryStore> {
        MemoryStore::new([
            EntityDef::new("PermissionPolicy", "permission_policies", IdKind::Int)
                .unique("name"),
            EntityDef::new("StaffUser", "staff_users", IdKind::Uuid)
                .unique("username")
                .foreign_key("permission_policy_id", "permission_policies"),
        ])
    }

    #[test]
    fn insert_allocates_sequential_int_ids() {
        let store = store();
        let mut session = store.session();
        session.stage_insert(
            &EntityDef::new("PermissionPolicy", "permission_policies", IdKind::Int),
            record(json!({"name": "Admins"})),
        );
        session.stage_insert(
            &EntityDef::new("PermissionPolicy", "permission_policies", IdKind::Int),
            record(json!({"name": "Auditors"})),
        );
        let rows = session.commit().unwrap();
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[1]["id"], json!(2));
    }

    #[test]
    fn duplicate_unique_field_rejects_whole_batch() {
        let store = store();
        let entity = EntityDef::new("PermissionPolicy", "permission_policies", IdKind::Int)
            .unique("name");
        let mut session = store.session();
        session.stage_insert(&entity, record(json!({"name": "Admins"})));
        session.commit().unwrap();

        let mut session = store.session();
        session.stage_insert(&entity, record(json!({"name": "Ops"})));
        session.stage_insert(&entity, record(json!({"name": "Admins"})));
        let err = session.commit().unwrap_err();
        assert_eq!(
            err,
            StoreError::UniqueViolation {
                field: "name".to_string()
            }
        );
        // Atomic: the non-conflicting insert must not have landed either.
        assert_eq!(store.rows("permission_policies").unwrap().len(), 1);
    }

    #[test]
    fn dangling_foreign_key_is_rejected() {
        let store = store();
        let staff = EntityDef::new("StaffUser", "staff_users", IdKind::Uuid)
            .unique("username")
            .foreign_key("permission_policy_id", "permission_policies");
        let mut session = store.session();
        session.stage_insert(
            &staff,
            record(json!({"username": "op1", "permission_policy_id": 42})),
        );
        assert_eq!(
            session.commit().unwrap_err(),
            StoreError::ForeignKeyInvalid {
                table: "permission_policies".to_string()
            }
        );
    }

    #[test]
    fn referenced_row_delete_is_protected() {
        let store = store();
        let policy = EntityDef::new("PermissionPolicy", "permission_policies", IdKind::Int)
            .unique("name");
        let staff = EntityDef::new("StaffUser", "staff_users", IdKind::Uuid)
            .unique("username")
            .foreign_key("permission_policy_id", "permission_policies");

        let mut session = store.session();
        session.stage_insert(&policy, record(json!({"name": "Admins"})));
        let rows = session.commit().unwrap();
        let policy_id = rows[0]["id"].clone();

        let mut session = store.session();
        session.stage_insert(
            &staff,
            record(json!({"username": "op1", "permission_policy_id": policy_id})),
        );
        session.commit().unwrap();

        let mut session = store.session();
        session.stage_delete(&policy, RecordId::Int(1));
        assert_eq!(
            session.commit().unwrap_err(),
            StoreError::ForeignKeyProtected {
                constraint: "staff_users_permission_policy_id_fkey".to_string()
            }
        );
        assert_eq!(store.rows("permission_policies").unwrap().len(), 1);
    }

    #[test]
    fn malformed_raw_id_is_distinguished_from_missing() {
        let store = store();
        let staff = EntityDef::new("StaffUser", "staff_users", IdKind::Uuid);
        let session = store.session();
        assert_eq!(
            session.get_raw(&staff, "not-a-uuid").unwrap_err(),
            StoreError::MalformedId
        );
        assert_eq!(
            session
                .get_raw(&staff, "0192e6a0-0000-7000-8000-000000000000")
                .unwrap_err(),
            StoreError::NotFound
        );
    }

    #[test]
    fn rollback_discards_staged_writes() {
        let store = store();
        let policy = EntityDef::new("PermissionPolicy", "permission_policies", IdKind::Int);
        let mut session = store.session();
        session.stage_insert(&policy, record(json!({"name": "Ghost"})));
        session.rollback();
        assert!(session.commit().unwrap().is_empty());
        assert!(store.rows("permission_policies").unwrap().is_empty());
    }
}
