//! Parent notification dispatch.
//!
//! The lifecycle manager emits a `ParentNotification` and moves on; it never
//! waits for delivery. `ChannelNotifier` hands messages to a bounded queue
//! and `NotificationDispatcher` drains it on a blocking worker, writing one
//! inbox row per parent linked to the student.

use std::path::PathBuf;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db::{self, repository, DatabaseError};
use crate::models::enums::NotificationKind;
use crate::models::Notification;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// A message addressed to the parents of a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentNotification {
    pub student_id: Uuid,
    pub request_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub kind: NotificationKind,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification queue is full")]
    QueueFull,
    #[error("Notification dispatcher has stopped")]
    Closed,
}

/// Outbound notification sink. Delivery is attempted at most once;
/// callers log failures and carry on.
pub trait Notifier: Send + Sync {
    fn notify_parent(&self, note: ParentNotification) -> Result<(), NotifyError>;
}

// ═══════════════════════════════════════════════════════════
// Channel notifier
// ═══════════════════════════════════════════════════════════

/// Non-blocking notifier backed by a bounded tokio channel.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<ParentNotification>,
}

impl Notifier for ChannelNotifier {
    fn notify_parent(&self, note: ParentNotification) -> Result<(), NotifyError> {
        self.tx.try_send(note).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotifyError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => NotifyError::Closed,
        })
    }
}

/// Create a notifier and the dispatcher that drains it into `db_path`.
pub fn notification_channel(
    db_path: PathBuf,
    capacity: usize,
) -> (ChannelNotifier, NotificationDispatcher) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelNotifier { tx }, NotificationDispatcher { db_path, rx })
}

// ═══════════════════════════════════════════════════════════
// Dispatcher
// ═══════════════════════════════════════════════════════════

pub struct NotificationDispatcher {
    db_path: PathBuf,
    rx: mpsc::Receiver<ParentNotification>,
}

impl NotificationDispatcher {
    /// Run the dispatcher on the blocking pool until every sender is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        let Self { db_path, mut rx } = self;
        tokio::task::spawn_blocking(move || {
            let conn = match db::open_database(&db_path) {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(path = %db_path.display(), error = %e, "Notification dispatcher cannot open database");
                    return;
                }
            };
            tracing::info!("Notification dispatcher started");

            while let Some(note) = rx.blocking_recv() {
                match deliver(&conn, &note) {
                    Ok(count) => tracing::debug!(
                        student_id = %note.student_id,
                        kind = %note.kind,
                        recipients = count,
                        "Parent notification delivered"
                    ),
                    Err(e) => tracing::warn!(
                        student_id = %note.student_id,
                        kind = %note.kind,
                        error = %e,
                        "Parent notification dropped"
                    ),
                }
            }

            tracing::info!("Notification dispatcher stopped");
        })
    }
}

/// Write one inbox row per parent of the student. Returns the recipient count.
pub fn deliver(conn: &Connection, note: &ParentNotification) -> Result<usize, DatabaseError> {
    let parents = repository::parents_of_student(conn, &note.student_id)?;
    let created_at = db::now_timestamp();

    let tx = conn.unchecked_transaction()?;
    for parent_id in &parents {
        repository::insert_notification(&tx, &Notification {
            id: Uuid::new_v4(),
            parent_id: *parent_id,
            student_id: note.student_id,
            request_id: note.request_id,
            title: note.title.clone(),
            content: note.content.clone(),
            kind: note.kind,
            created_at,
            is_read: false,
        })?;
    }
    tx.commit()?;

    Ok(parents.len())
}

// ═══════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════
