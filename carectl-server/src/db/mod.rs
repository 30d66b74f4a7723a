//! Database layer - connection pool, schema and repositories
//!
//! # Design Principles
//!
//! - Connection pool (max 5 connections by default)
//! - Invariants live in the schema too: CHECK constraints and partial
//!   unique indexes back every rule core checks
//! - Multi-step writes run in a single transaction with the rows they
//!   depend on locked `FOR UPDATE`

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repos;

pub use error::DbError;
pub use pool::{create_pool, create_pool_with_options};
pub use repos::*;
