//! HTTP route definitions.

mod collections;
mod health;

pub use collections::{filter_from_query, RECONCILIATION_HEADER};

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(collections::routes())
}
