use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{RequestAction, RequestStatus};

/// Lifecycle failures. All are deterministic; none is retried internally.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Cannot {action} medication request {request_id} in status {from}")]
    InvalidTransition {
        request_id: Uuid,
        from: RequestStatus,
        action: RequestAction,
    },

    #[error("Medication request not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(err: rusqlite::Error) -> Self {
        LifecycleError::Database(DatabaseError::Sqlite(err))
    }
}
