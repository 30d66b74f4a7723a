//! carectl-core: domain rules for the carectl hospital backend.
//!
//! Everything in here is pure: no I/O beyond config loading and no database.
//! The server crate loads rows, hands them to these functions and persists
//! whatever they decide.

#[macro_use]
mod macros;

pub mod admissions;
pub mod appointments;
pub mod billing;
pub mod config;
pub mod error;
pub mod models;
pub mod pharmacy;
pub mod staff;

pub use config::{CareConfig, ConfigError};
pub use error::DomainError;
pub use models::{Paginated, Pagination, PaginationParams, Permission, Role, ValidationError};
