//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod identity;
pub mod pagination;
pub mod role;
pub mod validation;

pub use identity::{Email, Password, PersonName, Phone};
pub use pagination::{Paginated, Pagination, PaginationParams};
pub use role::{Permission, Role};
pub use validation::{optional_text, required_text, ValidationError};
