//! Route handlers organized by resource

pub mod admissions;
pub mod appointments;
pub mod audit;
pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod health;
pub mod patients;
pub mod pharmacy;
pub mod prescriptions;
pub mod staff;
pub mod users;
pub mod vendors;

mod common;
