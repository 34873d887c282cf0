//! Skypanel domain core.
//!
//! Shared types for the field-service client: work-order status machine,
//! role capabilities, hazard severities, coordinates, and the error
//! taxonomy. This crate has zero internal deps so it can be used by the
//! gateway, event, and client crates alike.

pub mod error;
pub mod geo;
pub mod hazard;
pub mod roles;
pub mod types;
pub mod work;

pub use error::CoreError;
pub use geo::Coordinates;
pub use hazard::Severity;
pub use roles::{can_access, Action, Role};
pub use types::{DbId, Timestamp};
pub use work::{Shift, WorkStatus};
