//! Per-action schema resolution.
//!
//! A ViewSet declares schemas in named slots; each action resolves against a
//! fixed fallback chain. Resolution failures are configuration errors raised
//! while the route table is being built, never during a request.

use std::sync::Arc;

use crate::errors::ConfigError;
use crate::schema::Schema;

/// The generic `schema` slot is tri-state: unset (fall through), explicitly
/// disabled (schema-less list/retrieve responses), or set.
#[derive(Debug, Clone, Default)]
pub enum GenericSlot {
    #[default]
    Unset,
    Disabled,
    Schema(Arc<Schema>),
}

/// Named schema slots of one ViewSet.
#[derive(Debug, Clone, Default)]
pub struct SchemaSlots {
    pub schema: GenericSlot,
    pub list: Option<Arc<Schema>>,
    pub retrieve: Option<Arc<Schema>>,
    pub read: Option<Arc<Schema>>,
    pub create: Option<Arc<Schema>>,
    pub create_response: Option<Arc<Schema>>,
    pub update: Option<Arc<Schema>>,
    pub update_response: Option<Arc<Schema>>,
    pub form: Option<Arc<Schema>>,
    pub initial_form: Option<Arc<Schema>>,
}

/// Outcome of resolving a read-side action.
#[derive(Debug, Clone)]
pub enum Resolved {
    Schema(Arc<Schema>),
    /// Generic slot explicitly disabled: respond with raw records.
    Raw,
}

impl SchemaSlots {
    fn generic(&self) -> Option<Arc<Schema>> {
        match &self.schema {
            GenericSlot::Schema(s) => Some(Arc::clone(s)),
            _ => None,
        }
    }

    fn generic_disabled(&self) -> bool {
        matches!(self.schema, GenericSlot::Disabled)
    }

    fn first(&self, chain: &[&Option<Arc<Schema>>]) -> Option<Arc<Schema>> {
        chain
            .iter()
            .find_map(|slot| slot.as_ref().map(Arc::clone))
            .or_else(|| self.generic())
    }

    /// `list` → list, read, generic.
    pub fn for_list(&self, view: &str) -> Result<Resolved, ConfigError> {
        match self.first(&[&self.list, &self.read]) {
            Some(schema) => Ok(Resolved::Schema(schema)),
            None if self.generic_disabled() => Ok(Resolved::Raw),
            None => Err(ConfigError::MissingSchema {
                view: view.to_string(),
                action: "list",
                hint: "`list_schema` or `read_schema` or `schema`",
            }),
        }
    }

    /// `retrieve` → retrieve, read, generic.
    pub fn for_retrieve(&self, view: &str) -> Result<Resolved, ConfigError> {
        match self.first(&[&self.retrieve, &self.read]) {
            Some(schema) => Ok(Resolved::Schema(schema)),
            None if self.generic_disabled() => Ok(Resolved::Raw),
            None => Err(ConfigError::MissingSchema {
                view: view.to_string(),
                action: "retrieve",
                hint: "`retrieve_schema` or `read_schema` or `schema`",
            }),
        }
    }

    /// `create` → create, form, generic. Write-side actions have no raw
    /// fallback: a creatable ViewSet must say what a body looks like.
    pub fn for_create(&self, view: &str) -> Result<Arc<Schema>, ConfigError> {
        self.first(&[&self.create, &self.form])
            .ok_or(ConfigError::MissingSchema {
                view: view.to_string(),
                action: "create",
                hint: "`create_schema` or `form_schema` or `schema`",
            })
    }

    /// `update` → update, form, generic. The result is validated partially
    /// (every field optional) for PATCH semantics.
    pub fn for_update(&self, view: &str) -> Result<Arc<Schema>, ConfigError> {
        self.first(&[&self.update, &self.form])
            .ok_or(ConfigError::MissingSchema {
                view: view.to_string(),
                action: "update",
                hint: "`update_schema` or `form_schema` or `schema`",
            })
    }

    /// `initial_form_data` → initial_form, update, form, generic.
    pub fn for_initial_form_data(&self, view: &str) -> Result<Resolved, ConfigError> {
        match self.first(&[&self.initial_form, &self.update, &self.form]) {
            Some(schema) => Ok(Resolved::Schema(schema)),
            None if self.generic_disabled() => Ok(Resolved::Raw),
            None => Err(ConfigError::MissingSchema {
                view: view.to_string(),
                action: "initial_form_data",
                hint: "`initial_form_schema` or `update_schema` or `form_schema` or `schema`",
            }),
        }
    }

    /// Response schema for create: create_response, read, generic.
    pub fn create_response(&self) -> Option<Arc<Schema>> {
        self.first(&[&self.create_response, &self.read])
    }

    /// Response schema for update: update_response, read, generic.
    pub fn update_response(&self) -> Option<Arc<Schema>> {
        self.first(&[&self.update_response, &self.read])
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{FieldKind, Schema};

    use super::*;

    fn named(name: &str) -> Arc<Schema> {
        Arc::new(Schema::new(name).field("name", FieldKind::String))
    }

    #[test]
    fn generic_slot_covers_every_action() {
        let slots = SchemaSlots {
            schema: GenericSlot::Schema(named("Generic")),
            ..Default::default()
        };
        for resolved in [
            slots.for_list("V").unwrap(),
            slots.for_retrieve("V").unwrap(),
            slots.for_initial_form_data("V").unwrap(),
        ] {
            match resolved {
                Resolved::Schema(s) => assert_eq!(s.name, "Generic"),
                Resolved::Raw => panic!("expected schema"),
            }
        }
        assert_eq!(slots.for_create("V").unwrap().name, "Generic");
        assert_eq!(slots.for_update("V").unwrap().name, "Generic");
    }

    #[test]
    fn specific_slots_win_over_generic() {
        let slots = SchemaSlots {
            schema: GenericSlot::Schema(named("Generic")),
            list: Some(named("List")),
            form: Some(named("Form")),
            create: Some(named("Create")),
            ..Default::default()
        };
        match slots.for_list("V").unwrap() {
            Resolved::Schema(s) => assert_eq!(s.name, "List"),
            Resolved::Raw => panic!(),
        }
        assert_eq!(slots.for_create("V").unwrap().name, "Create");
        // form outranks generic for update when no update_schema is set
        assert_eq!(slots.for_update("V").unwrap().name, "Form");
    }

    #[test]
    fn initial_form_data_chain_prefers_update() {
        let slots = SchemaSlots {
            update: Some(named("Update")),
            form: Some(named("Form")),
            ..Default::default()
        };
        match slots.for_initial_form_data("V").unwrap() {
            Resolved::Schema(s) => assert_eq!(s.name, "Update"),
            Resolved::Raw => panic!(),
        }
    }

    #[test]
    fn unresolvable_list_is_a_config_error() {
        let slots = SchemaSlots::default();
        assert!(matches!(
            slots.for_list("StaffUserViewSet"),
            Err(ConfigError::MissingSchema { action: "list", .. })
        ));
    }

    #[test]
    fn disabled_generic_falls_back_to_raw_reads_only() {
        let slots = SchemaSlots {
            schema: GenericSlot::Disabled,
            ..Default::default()
        };
        assert!(matches!(slots.for_list("V"), Ok(Resolved::Raw)));
        assert!(matches!(slots.for_retrieve("V"), Ok(Resolved::Raw)));
        // Write sides still demand a schema.
        assert!(slots.for_create("V").is_err());
        assert!(slots.for_update("V").is_err());
    }

    #[test]
    fn response_slots_fall_back_to_read_then_generic() {
        let slots = SchemaSlots {
            schema: GenericSlot::Schema(named("Generic")),
            read: Some(named("Read")),
            ..Default::default()
        };
        assert_eq!(slots.create_response().unwrap().name, "Read");
        assert_eq!(slots.update_response().unwrap().name, "Read");
    }
}
