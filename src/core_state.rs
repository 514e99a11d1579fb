//! Application state shared by every HTTP handler.
//!
//! `CoreState` owns the database location, the lifecycle manager and the
//! access audit buffer. Handlers open a fresh connection per request.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config;
use crate::db;
use crate::lifecycle::{Caller, LifecycleManager};
use crate::notify::Notifier;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db_path: PathBuf,
    lifecycle: LifecycleManager,
    audit: AuditLogger,
}

impl CoreState {
    pub fn new(db_path: PathBuf, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db_path,
            lifecycle: LifecycleManager::new(notifier),
            audit: AuditLogger::new(),
        }
    }

    /// Open a database connection. Most common operation in handlers.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    // ── Audit ───────────────────────────────────────────────

    /// Record an access event. Flushes to SQLite when the buffer fills.
    pub fn log_access(&self, source: AccessSource, action: &str, entity: &str) {
        if self.audit.log(source, action, entity) {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!(error = %e, "Failed to flush audit buffer");
            }
        }
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush buffered audit entries and prune expired rows.
    pub fn flush_and_prune_audit(&self) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        self.audit.flush_to_db(&conn)?;
        let pruned = db::repository::prune_audit_log(&conn, config::AUDIT_RETENTION_DAYS)?;
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired audit entries");
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Access source tracking
// ═══════════════════════════════════════════════════════════

/// Who made a request, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessSource {
    /// No caller headers (health checks, rejected requests).
    Anonymous,
    Caller(Caller),
}

impl std::fmt::Display for AccessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::Caller(caller) => write!(f, "{caller}"),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: chrono::NaiveDateTime,
    pub source: AccessSource,
    pub action: String,
    pub entity: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(config::AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Log an access event to the in-memory buffer.
    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(&self, source: AccessSource, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: db::now_timestamp(),
                source,
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= config::AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let rows: Vec<db::repository::AuditEntry> = entries
            .iter()
            .map(|e| {
                (
                    db::format_timestamp(&e.timestamp),
                    e.source.to_string(),
                    e.action.clone(),
                    e.entity.clone(),
                )
            })
            .collect();

        let count = rows.len();
        db::repository::insert_audit_entries(conn, &rows)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
