//! Caller identity middleware.
//!
//! Reads `X-Caller-Id` / `X-Caller-Role` and injects the `Caller` into
//! request extensions for downstream handlers. Identity is trusted as
//! given; an upstream gateway is expected to have authenticated it.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::types::caller_from_headers;

/// Require caller headers on every protected route.
pub async fn require_caller(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let caller = caller_from_headers(req.headers());
    match caller {
        Ok(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(path = %req.uri().path(), "Request without caller identity");
            err.into_response()
        }
    }
}
