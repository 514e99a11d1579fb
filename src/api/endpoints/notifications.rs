//! Parent notification inbox.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::db::repository;
use crate::lifecycle::Caller;
use crate::models::enums::Role;
use crate::models::Notification;

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct InboxResponse {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

fn require_parent(caller: &Caller) -> Result<(), ApiError> {
    if caller.role == Role::Parent {
        Ok(())
    } else {
        Err(ApiError::NotAuthorized(format!(
            "{} has no notification inbox",
            caller.role
        )))
    }
}

/// `GET /api/parent/notifications?unread_only=true`
pub async fn inbox(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<InboxResponse>, ApiError> {
    require_parent(&caller)?;
    let unread_only = query.unread_only;
    let notifications = ctx
        .with_db(move |_, conn| {
            Ok(repository::list_notifications_for_parent(conn, &caller.id, unread_only)?)
        })
        .await?;
    let unread = notifications.iter().filter(|n| !n.is_read).count();

    Ok(Json(InboxResponse {
        notifications,
        unread,
    }))
}

/// `POST /api/parent/notifications/:id/read`
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_parent(&caller)?;
    let notification_id = parse_id(&notification_id, "notification")?;
    ctx.with_db(move |_, conn| {
        Ok(repository::mark_notification_read(conn, &caller.id, &notification_id)?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
