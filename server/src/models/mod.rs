//! The store-management catalog: every model the server exposes.
//!
//! Some schemas are declared with [`FieldDef`](shelf_engine::FieldDef)
//! builders, others from raw JSON field specs. Both compile to the same
//! [`Schema`](shelf_engine::Schema).

mod addresses;
mod orders;
mod payments;
mod products;
mod stores;
mod users;

use shelf_engine::{Clock, ModelRegistry, PersistenceAdapter, SchemaDefinitionError, SystemClock};
use std::sync::Arc;

/// Collections whose documents carry a password hash.
pub const ACCOUNT_COLLECTIONS: [&str; 2] = ["stores", "users"];

/// Build every model on one adapter, with the wall clock.
pub fn catalog(adapter: Arc<dyn PersistenceAdapter>) -> Result<ModelRegistry, SchemaDefinitionError> {
    catalog_with_clock(adapter, Arc::new(SystemClock))
}

/// Build every model on one adapter, stamping times from `clock`.
pub fn catalog_with_clock(
    adapter: Arc<dyn PersistenceAdapter>,
    clock: Arc<dyn Clock>,
) -> Result<ModelRegistry, SchemaDefinitionError> {
    let mut registry = ModelRegistry::new();
    registry.register(stores::model(adapter.clone(), clock.clone())?)?;
    registry.register(users::model(adapter.clone(), clock.clone())?)?;
    registry.register(addresses::model(adapter.clone(), clock.clone())?)?;
    registry.register(products::model(adapter.clone(), clock.clone())?)?;
    registry.register(orders::model(adapter.clone(), clock.clone())?)?;
    registry.register(payments::model(adapter, clock)?)?;
    Ok(registry)
}
