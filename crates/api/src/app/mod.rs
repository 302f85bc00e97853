//! HTTP application wiring (axum router + store + viewsets).
//!
//! Layout:
//! - `entities.rs` / `schemas.rs`: declarative model/schema pairs
//! - `viewsets.rs`: ViewSet declarations compiled into routers
//! - `catalog.rs`: static permission-key catalog
//! - `seed.rs`: startup data (superadmin)
//! - `system.rs`: health and whoami endpoints

use std::sync::Arc;

use axum::{Router, routing::get};
use tower::ServiceBuilder;

use opsdesk_auth::{Hs256TokenValidator, TokenValidator};

use crate::middleware;

pub mod catalog;
pub mod entities;
pub mod schemas;
pub mod seed;
pub mod system;
pub mod viewsets;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Route tables are compiled here, once, before any request is served;
/// configuration errors abort startup.
pub fn build_app(jwt_secret: String) -> anyhow::Result<Router> {
    let tokens: Arc<dyn TokenValidator> =
        Arc::new(Hs256TokenValidator::new(jwt_secret.into_bytes()));
    let auth_state = middleware::AuthState { tokens };

    let entities = entities::Entities::declare();
    let store = entities.build_store();
    seed::create_superadmin(&entities, &store)?;

    let protected = viewsets::mount_all(&entities, &store)?
        .route("/whoami", get(system::whoami))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Ok(Router::new()
        .route("/health", get(system::health))
        .merge(protected)
        .layer(ServiceBuilder::new()))
}
