//! `PostgreSQL` store adapter.

mod models;
mod schema;
mod store;

pub use store::{PgPool, PostgresServerStore};
