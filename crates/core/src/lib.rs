//! `opsdesk-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no HTTP or storage
//! concerns): typed record identifiers and the base domain error model.

pub mod error;
pub mod id;
pub mod record;

pub use error::{DomainError, DomainResult};
pub use id::{IdKind, RecordId};
pub use record::{Record, field_str, id_of};
