//! Roster administration: students, parents, and the links between them.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{json_body, ApiContext};
use crate::db::repository;
use crate::lifecycle::validation::MAX_NAME_LEN;
use crate::lifecycle::Caller;
use crate::models::enums::Role;
use crate::models::{Parent, Student};

#[derive(Debug, Deserialize)]
pub struct NewStudent {
    pub full_name: String,
    pub class_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewParent {
    pub full_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewLink {
    pub parent_id: Uuid,
    pub student_id: Uuid,
}

fn require_admin(caller: &Caller) -> Result<(), ApiError> {
    if caller.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::NotAuthorized(format!(
            "{} cannot manage the roster",
            caller.role
        )))
    }
}

fn clean_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("full_name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::InvalidInput(format!(
            "full_name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `POST /api/admin/students`
pub async fn create_student(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<NewStudent>, JsonRejection>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    require_admin(&caller)?;
    let input = json_body(payload)?;
    let student = Student {
        id: Uuid::new_v4(),
        full_name: clean_name(&input.full_name)?,
        class_name: clean_optional(input.class_name),
    };

    let student = ctx
        .with_db(move |_, conn| {
            repository::insert_student(conn, &student)?;
            Ok(student)
        })
        .await?;
    tracing::info!(student_id = %student.id, "Student added to roster");
    Ok((StatusCode::CREATED, Json(student)))
}

/// `POST /api/admin/parents`
pub async fn create_parent(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<NewParent>, JsonRejection>,
) -> Result<(StatusCode, Json<Parent>), ApiError> {
    require_admin(&caller)?;
    let input = json_body(payload)?;
    let parent = Parent {
        id: Uuid::new_v4(),
        full_name: clean_name(&input.full_name)?,
        email: clean_optional(input.email),
    };

    let parent = ctx
        .with_db(move |_, conn| {
            repository::insert_parent(conn, &parent)?;
            Ok(parent)
        })
        .await?;
    tracing::info!(parent_id = %parent.id, "Parent added to roster");
    Ok((StatusCode::CREATED, Json(parent)))
}

/// `POST /api/admin/links`: idempotent.
pub async fn link(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<NewLink>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    require_admin(&caller)?;
    let NewLink {
        parent_id,
        student_id,
    } = json_body(payload)?;

    ctx.with_db(move |_, conn| {
        if repository::get_parent(conn, &parent_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Parent {parent_id} not found")));
        }
        if !repository::student_exists(conn, &student_id)? {
            return Err(ApiError::NotFound(format!("Student {student_id} not found")));
        }
        Ok(repository::link_parent_student(conn, &parent_id, &student_id)?)
    })
    .await?;
    tracing::info!(
        parent_id = %parent_id,
        student_id = %student_id,
        "Parent linked to student"
    );
    Ok(StatusCode::NO_CONTENT)
}
