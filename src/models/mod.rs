pub mod enums;
pub mod medication_request;
pub mod notification;
pub mod roster;

pub use medication_request::*;
pub use notification::*;
pub use roster::*;
