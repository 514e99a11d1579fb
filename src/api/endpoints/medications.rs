//! Medication request endpoints.
//!
//! Parent routes:
//! - `POST /api/parent/medications`: submit for a linked child
//! - `PUT  /api/parent/medications/:id`: edit while pending
//! - `GET  /api/parent/medications?student_ids=a,b`: own submissions
//!
//! Nurse routes:
//! - `POST /api/nurse/medications`: record a walk-in (starts approved)
//! - `GET  /api/nurse/medications?status=`: triage queue, oldest first
//! - `POST /api/nurse/medications/:id/{accept,reject,administer,discontinue}`
//!
//! Shared reads:
//! - `GET /api/medications/:id`
//! - `GET /api/medications/:id/administrations`
//! - `GET /api/students/:id/medications`

use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{json_body, optional_json_body, parse_id, ApiContext};
use crate::db::repository;
use crate::lifecycle::Caller;
use crate::models::enums::RequestStatus;
use crate::models::{MedicationAdministration, MedicationFields, MedicationRequest};

// ═══════════════════════════════════════════════════════════
// Request / response bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub student_id: Uuid,
    #[serde(flatten)]
    pub fields: MedicationFields,
}

#[derive(Debug, Deserialize)]
pub struct ReasonBody {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesBody {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParentListQuery {
    /// Comma-separated student ids. Defaults to every linked child.
    pub student_ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
    pub status: RequestStatus,
}

#[derive(Serialize)]
pub struct RequestListResponse {
    pub requests: Vec<MedicationRequest>,
    pub total: usize,
}

impl From<Vec<MedicationRequest>> for RequestListResponse {
    fn from(requests: Vec<MedicationRequest>) -> Self {
        Self {
            total: requests.len(),
            requests,
        }
    }
}

#[derive(Serialize)]
pub struct AdministrationsResponse {
    pub request_id: Uuid,
    pub administrations: Vec<MedicationAdministration>,
}

// ═══════════════════════════════════════════════════════════
// Parent routes
// ═══════════════════════════════════════════════════════════

/// `POST /api/parent/medications`
pub async fn parent_submit(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let body = json_body(payload)?;
    let id = ctx
        .with_db(move |core, conn| {
            Ok(core
                .lifecycle()
                .submit_by_parent(conn, &caller, &body.student_id, body.fields)?)
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            status: RequestStatus::PendingConfirmation,
        }),
    ))
}

/// `PUT /api/parent/medications/:id`
pub async fn parent_edit(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<String>,
    payload: Result<Json<MedicationFields>, JsonRejection>,
) -> Result<Json<MedicationRequest>, ApiError> {
    let request_id = parse_id(&request_id, "medication request")?;
    let fields = json_body(payload)?;
    let request = ctx
        .with_db(move |core, conn| {
            let lifecycle = core.lifecycle();
            lifecycle.edit_by_parent(conn, &caller, &request_id, fields)?;
            Ok(lifecycle.get(conn, &caller, &request_id)?)
        })
        .await?;
    Ok(Json(request))
}

/// `GET /api/parent/medications`
pub async fn parent_list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ParentListQuery>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let requested = match query.student_ids.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            raw.split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_id(s, "student"))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => None,
    };

    let requests = ctx
        .with_db(move |core, conn| {
            let student_ids = match requested {
                Some(ids) => ids,
                None => repository::students_of_parent(conn, &caller.id)?,
            };
            Ok(core.lifecycle().list_for_parent(conn, &caller, &student_ids)?)
        })
        .await?;
    Ok(Json(requests.into()))
}

// ═══════════════════════════════════════════════════════════
// Nurse routes
// ═══════════════════════════════════════════════════════════

/// `POST /api/nurse/medications`
pub async fn nurse_submit(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let body = json_body(payload)?;
    let id = ctx
        .with_db(move |core, conn| {
            Ok(core
                .lifecycle()
                .submit_by_nurse(conn, &caller, &body.student_id, body.fields)?)
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            status: RequestStatus::Approved,
        }),
    ))
}

/// `GET /api/nurse/medications?status=pending_confirmation`
pub async fn nurse_queue(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => RequestStatus::from_str(raw)
            .map_err(|_| ApiError::BadRequest(format!("Unknown status '{raw}'")))?,
        _ => RequestStatus::PendingConfirmation,
    };

    let requests = ctx
        .with_db(move |core, conn| Ok(core.lifecycle().list_by_status(conn, &caller, status)?))
        .await?;
    Ok(Json(requests.into()))
}

/// `POST /api/nurse/medications/:id/accept`
pub async fn accept(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<String>,
) -> Result<Json<MedicationRequest>, ApiError> {
    let request_id = parse_id(&request_id, "medication request")?;
    let request = ctx
        .with_db(move |core, conn| {
            let lifecycle = core.lifecycle();
            lifecycle.accept(conn, &caller, &request_id)?;
            Ok(lifecycle.get(conn, &caller, &request_id)?)
        })
        .await?;
    Ok(Json(request))
}

/// `POST /api/nurse/medications/:id/reject` with `{"reason": "..."}`
pub async fn reject(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<String>,
    payload: Result<Json<ReasonBody>, JsonRejection>,
) -> Result<Json<MedicationRequest>, ApiError> {
    let request_id = parse_id(&request_id, "medication request")?;
    let body = json_body(payload)?;
    let request = ctx
        .with_db(move |core, conn| {
            let lifecycle = core.lifecycle();
            lifecycle.reject(conn, &caller, &request_id, &body.reason)?;
            Ok(lifecycle.get(conn, &caller, &request_id)?)
        })
        .await?;
    Ok(Json(request))
}

/// `POST /api/nurse/medications/:id/administer`, optional `{"notes": "..."}`
pub async fn administer(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<String>,
    body: Bytes,
) -> Result<Json<MedicationRequest>, ApiError> {
    let request_id = parse_id(&request_id, "medication request")?;
    let NotesBody { notes } = optional_json_body(&body)?;
    let request = ctx
        .with_db(move |core, conn| {
            let lifecycle = core.lifecycle();
            lifecycle.mark_administered(conn, &caller, &request_id, notes.as_deref())?;
            Ok(lifecycle.get(conn, &caller, &request_id)?)
        })
        .await?;
    Ok(Json(request))
}

/// `POST /api/nurse/medications/:id/discontinue`, optional `{"notes": "..."}`
pub async fn discontinue(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<String>,
    body: Bytes,
) -> Result<Json<MedicationRequest>, ApiError> {
    let request_id = parse_id(&request_id, "medication request")?;
    let NotesBody { notes } = optional_json_body(&body)?;
    let request = ctx
        .with_db(move |core, conn| {
            let lifecycle = core.lifecycle();
            lifecycle.discontinue(conn, &caller, &request_id, notes.as_deref())?;
            Ok(lifecycle.get(conn, &caller, &request_id)?)
        })
        .await?;
    Ok(Json(request))
}

// ═══════════════════════════════════════════════════════════
// Shared reads
// ═══════════════════════════════════════════════════════════

/// `GET /api/medications/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<String>,
) -> Result<Json<MedicationRequest>, ApiError> {
    let request_id = parse_id(&request_id, "medication request")?;
    let request = ctx
        .with_db(move |core, conn| Ok(core.lifecycle().get(conn, &caller, &request_id)?))
        .await?;
    Ok(Json(request))
}

/// `GET /api/medications/:id/administrations`
pub async fn administrations(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(request_id): Path<String>,
) -> Result<Json<AdministrationsResponse>, ApiError> {
    let request_id = parse_id(&request_id, "medication request")?;
    let administrations = ctx
        .with_db(move |core, conn| {
            Ok(core.lifecycle().administrations(conn, &caller, &request_id)?)
        })
        .await?;

    Ok(Json(AdministrationsResponse {
        request_id,
        administrations,
    }))
}

/// `GET /api/students/:id/medications`
pub async fn for_student(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(student_id): Path<String>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let student_id = parse_id(&student_id, "student")?;
    let requests = ctx
        .with_db(move |core, conn| {
            Ok(core.lifecycle().list_for_student(conn, &caller, &student_id)?)
        })
        .await?;
    Ok(Json(requests.into()))
}
