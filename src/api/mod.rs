//! HTTP API.
//!
//! Routes are nested under `/api/`. Everything except the health check
//! requires caller headers and is recorded in the access audit log.
//!
//! `api_router()` returns a `Router` that can be mounted on any axum
//! server instance; `server` binds and runs it.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
