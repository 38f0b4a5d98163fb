//! Database module for PostgreSQL persistence.

mod adapter;
mod documents;
mod pool;

pub use adapter::*;
pub use documents::*;
pub use pool::*;
