//! `opsdesk-auth` — pure authentication boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it models
//! token claims, deterministic claim validation, and the resolved principal.

pub mod claims;
pub mod principal;
pub mod scopes;
pub mod validator;

pub use claims::{Claims, TokenValidationError, validate_claims};
pub use principal::{Principal, PrincipalId};
pub use scopes::Scope;
pub use validator::{Hs256TokenValidator, TokenError, TokenValidator};
