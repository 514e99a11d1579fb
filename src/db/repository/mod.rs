//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, one sub-module per table
//! group. All public functions are re-exported here.

mod audit;
mod medication_request;
mod notification;
mod roster;

pub use audit::*;
pub use medication_request::*;
pub use notification::*;
pub use roster::*;
