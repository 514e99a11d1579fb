//! API endpoint handlers, grouped by audience.

pub mod health;
pub mod medications;
pub mod notifications;
pub mod roster;
