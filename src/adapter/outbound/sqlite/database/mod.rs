//! SQLite database plumbing: pool, schema, row models.

pub mod connection;
pub mod model;
pub mod schema;
