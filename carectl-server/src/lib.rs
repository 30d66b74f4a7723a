//! carectl-server: HTTP API for the carectl hospital backend
//!
//! Layering:
//! - `db`: connection pool, schema migrations and one repository per aggregate
//! - `http`: axum server, auth, error mapping and route handlers
//!
//! Domain rules live in `carectl-core`; repositories load state, ask core
//! what should happen and persist the outcome inside one transaction.

pub mod db;
pub mod http;

pub use db::{create_pool, migrations, DbError};
pub use http::{run_server, ApiError, AppState, ServerConfig};
