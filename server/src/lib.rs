//! Shelf Server - store-management backend.
//!
//! Exposes the model catalog (stores, users, addresses, products, orders,
//! payments) over HTTP, on either PostgreSQL or the in-memory document store.
//! Data integrity comes from the shelf-engine mapping layer; this crate
//! supplies the PostgreSQL adapter, the catalog and a thin CRUD surface.

pub mod accounts;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;

use crate::accounts::Accounts;
use axum::Router;
use shelf_engine::ModelRegistry;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub accounts: Arc<Accounts>,
    /// Name of the active persistence backend
    pub backend: &'static str,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, backend: &'static str) -> Self {
        Self {
            registry,
            accounts: Arc::new(Accounts::new(models::ACCOUNT_COLLECTIONS)),
            backend,
        }
    }
}

/// Build the router with tracing and CORS layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
