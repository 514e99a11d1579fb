//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Cache-Control → 2. Caller identity → 3. Audit logger

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::error::ApiError;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        // Parent
        .route(
            "/parent/medications",
            post(endpoints::medications::parent_submit).get(endpoints::medications::parent_list),
        )
        .route(
            "/parent/medications/:id",
            axum::routing::put(endpoints::medications::parent_edit),
        )
        .route("/parent/notifications", get(endpoints::notifications::inbox))
        .route(
            "/parent/notifications/:id/read",
            post(endpoints::notifications::mark_read),
        )
        // Nurse
        .route(
            "/nurse/medications",
            post(endpoints::medications::nurse_submit).get(endpoints::medications::nurse_queue),
        )
        .route("/nurse/medications/:id/accept", post(endpoints::medications::accept))
        .route("/nurse/medications/:id/reject", post(endpoints::medications::reject))
        .route(
            "/nurse/medications/:id/administer",
            post(endpoints::medications::administer),
        )
        .route(
            "/nurse/medications/:id/discontinue",
            post(endpoints::medications::discontinue),
        )
        // Shared reads
        .route("/medications/:id", get(endpoints::medications::detail))
        .route(
            "/medications/:id/administrations",
            get(endpoints::medications::administrations),
        )
        .route("/students/:id/medications", get(endpoints::medications::for_student))
        // Roster administration
        .route("/admin/students", post(endpoints::roster::create_student))
        .route("/admin/parents", post(endpoints::roster::create_parent))
        .route("/admin/links", post(endpoints::roster::link))
        .with_state(ctx.clone())
        // Innermost first, outermost last
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_caller))
        .layer(axum::Extension(ctx.clone()));

    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone())
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", public)
        .fallback(|| async { ApiError::NotFound("No such route".into()) })
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
