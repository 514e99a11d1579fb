//! Audit logging middleware.
//!
//! Records every API request with caller, method, path, and response
//! status. Runs inside the auth layer so the `Caller` is available.

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::ApiContext;
use crate::core_state::AccessSource;
use crate::lifecycle::Caller;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Nested routers see the path with the `/api` prefix stripped.
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let source = req
        .extensions()
        .get::<Caller>()
        .copied()
        .map(AccessSource::Caller)
        .unwrap_or(AccessSource::Anonymous);

    let response = next.run(req).await;

    let status = response.status().as_u16();
    tracing::debug!(%source, %method, %path, status, "API request");
    if let Some(ctx) = ctx {
        ctx.core
            .log_access(source, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
