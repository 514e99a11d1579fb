use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::enums::*;
use crate::models::*;

pub fn insert_notification(conn: &Connection, note: &Notification) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notifications (id, parent_id, student_id, request_id, title, content, kind,
         created_at, is_read)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            note.id.to_string(),
            note.parent_id.to_string(),
            note.student_id.to_string(),
            note.request_id.map(|id| id.to_string()),
            note.title,
            note.content,
            note.kind.as_str(),
            format_timestamp(&note.created_at),
            note.is_read as i32,
        ],
    )?;
    Ok(())
}

/// Inbox for a parent, newest first.
pub fn list_notifications_for_parent(
    conn: &Connection,
    parent_id: &Uuid,
    unread_only: bool,
) -> Result<Vec<Notification>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_id, student_id, request_id, title, content, kind, created_at, is_read
         FROM notifications
         WHERE parent_id = ?1 AND (?2 = 0 OR is_read = 0)
         ORDER BY created_at DESC, rowid DESC",
    )?;

    let rows = stmt.query_map(params![parent_id.to_string(), unread_only as i32], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, i32>(8)?,
        ))
    })?;

    let mut notes = Vec::new();
    for row in rows {
        let (id, parent_id, student_id, request_id, title, content, kind, created_at, is_read) = row?;
        notes.push(Notification {
            id: parse_uuid(&id)?,
            parent_id: parse_uuid(&parent_id)?,
            student_id: parse_uuid(&student_id)?,
            request_id: request_id.as_deref().map(parse_uuid).transpose()?,
            title,
            content,
            kind: NotificationKind::from_str(&kind)?,
            created_at: parse_timestamp(&created_at)?,
            is_read: is_read != 0,
        });
    }
    Ok(notes)
}

/// Mark one of the parent's notifications read.
/// Another parent's notification is reported as not found.
pub fn mark_notification_read(
    conn: &Connection,
    parent_id: &Uuid,
    notification_id: &Uuid,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND parent_id = ?2",
        params![notification_id.to_string(), parent_id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Notification".into(),
            id: notification_id.to_string(),
        });
    }
    Ok(())
}
