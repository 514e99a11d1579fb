//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Caller identity: rejects requests without caller headers
//! 2. Audit logger: records the request with the caller attached

pub mod audit;
pub mod auth;
