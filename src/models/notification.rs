use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NotificationKind;

/// A message in a parent's inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub student_id: Uuid,
    pub request_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub kind: NotificationKind,
    pub created_at: NaiveDateTime,
    pub is_read: bool,
}
