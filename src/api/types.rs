//! Shared types for the HTTP API layer.

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::Json;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::lifecycle::Caller;
use crate::models::enums::Role;

/// Header carrying the caller's id.
pub const CALLER_ID_HEADER: &str = "X-Caller-Id";
/// Header carrying the caller's role (`parent`, `nurse`, `manager`, ...).
pub const CALLER_ROLE_HEADER: &str = "X-Caller-Role";

// ═══════════════════════════════════════════════════════════
// API context, shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run `work` on the blocking pool with a fresh connection.
    ///
    /// SQLite calls may wait up to the busy timeout on a locked database,
    /// which must not stall an async worker.
    pub async fn with_db<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&CoreState, &Connection) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || -> Result<T, ApiError> {
            let conn = core.open_db()?;
            work(&core, &conn)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Database task failed: {e}")))?
    }
}

// ═══════════════════════════════════════════════════════════
// Caller identity, injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Read the caller from request headers. Missing or malformed values
/// are all reported as `Unauthorized`.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthorized)
    };

    let id = Uuid::parse_str(header(CALLER_ID_HEADER)?).map_err(|_| ApiError::Unauthorized)?;
    let role = Role::from_str(header(CALLER_ROLE_HEADER)?).map_err(|_| ApiError::Unauthorized)?;
    Ok(Caller::new(id, role))
}

/// Parse a path or query id.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|e| ApiError::BadRequest(format!("Invalid {what} ID: {e}")))
}

// ═══════════════════════════════════════════════════════════
// Request bodies
// ═══════════════════════════════════════════════════════════

/// Unwrap a JSON body, turning extractor rejections into `BAD_REQUEST`.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Body that may be omitted. Only an empty (or all-whitespace) body means
/// "use the defaults"; anything else must parse.
pub fn optional_json_body<T: DeserializeOwned + Default>(bytes: &Bytes) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    json_body(Json::from_bytes(bytes))
}
