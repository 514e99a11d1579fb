//! Store and roster seams of the lifecycle manager, with SQLite implementations.
//!
//! Status changes go through `transition`, which must only apply when the
//! stored status still equals `expected`. That check is what resolves two
//! nurses acting on the same request at once.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{self, StatusChange};
use crate::db::DatabaseError;
use crate::models::enums::RequestStatus;
use crate::models::*;

pub trait MedicationRequestStore: Send + Sync {
    fn insert(&self, conn: &Connection, request: &MedicationRequest) -> Result<(), DatabaseError>;

    fn get(&self, conn: &Connection, id: &Uuid) -> Result<Option<MedicationRequest>, DatabaseError>;

    /// Replace fields if the request is pending and owned by `parent_id`.
    /// `false` means the guard did not match and nothing changed.
    fn update_pending_fields(
        &self,
        conn: &Connection,
        id: &Uuid,
        parent_id: &Uuid,
        fields: &MedicationFields,
        updated_at: &NaiveDateTime,
    ) -> Result<bool, DatabaseError>;

    /// Apply `change` only if the stored status is `expected`.
    /// `false` means the guard did not match and nothing changed.
    fn transition(
        &self,
        conn: &Connection,
        id: &Uuid,
        expected: RequestStatus,
        change: &StatusChange,
    ) -> Result<bool, DatabaseError>;

    fn record_administration(
        &self,
        conn: &Connection,
        entry: &MedicationAdministration,
    ) -> Result<(), DatabaseError>;

    fn administrations(
        &self,
        conn: &Connection,
        request_id: &Uuid,
    ) -> Result<Vec<MedicationAdministration>, DatabaseError>;

    fn list_for_parent(
        &self,
        conn: &Connection,
        parent_id: &Uuid,
        student_ids: &[Uuid],
    ) -> Result<Vec<MedicationRequest>, DatabaseError>;

    fn list_for_student(
        &self,
        conn: &Connection,
        student_id: &Uuid,
    ) -> Result<Vec<MedicationRequest>, DatabaseError>;

    fn list_by_status(
        &self,
        conn: &Connection,
        status: RequestStatus,
    ) -> Result<Vec<MedicationRequest>, DatabaseError>;
}

pub trait RosterLookup: Send + Sync {
    fn parent_owns_student(
        &self,
        conn: &Connection,
        parent_id: &Uuid,
        student_id: &Uuid,
    ) -> Result<bool, DatabaseError>;

    fn student_exists(&self, conn: &Connection, student_id: &Uuid) -> Result<bool, DatabaseError>;
}

/// SQLite-backed request store.
#[derive(Debug, Default)]
pub struct SqliteRequestStore;

impl MedicationRequestStore for SqliteRequestStore {
    fn insert(&self, conn: &Connection, request: &MedicationRequest) -> Result<(), DatabaseError> {
        repository::insert_medication_request(conn, request)
    }

    fn get(&self, conn: &Connection, id: &Uuid) -> Result<Option<MedicationRequest>, DatabaseError> {
        repository::get_medication_request(conn, id)
    }

    fn update_pending_fields(
        &self,
        conn: &Connection,
        id: &Uuid,
        parent_id: &Uuid,
        fields: &MedicationFields,
        updated_at: &NaiveDateTime,
    ) -> Result<bool, DatabaseError> {
        Ok(repository::update_pending_fields(conn, id, parent_id, fields, updated_at)? == 1)
    }

    fn transition(
        &self,
        conn: &Connection,
        id: &Uuid,
        expected: RequestStatus,
        change: &StatusChange,
    ) -> Result<bool, DatabaseError> {
        Ok(repository::update_status_if(conn, id, expected, change)? == 1)
    }

    fn record_administration(
        &self,
        conn: &Connection,
        entry: &MedicationAdministration,
    ) -> Result<(), DatabaseError> {
        repository::insert_administration(conn, entry)
    }

    fn administrations(
        &self,
        conn: &Connection,
        request_id: &Uuid,
    ) -> Result<Vec<MedicationAdministration>, DatabaseError> {
        repository::list_administrations(conn, request_id)
    }

    fn list_for_parent(
        &self,
        conn: &Connection,
        parent_id: &Uuid,
        student_ids: &[Uuid],
    ) -> Result<Vec<MedicationRequest>, DatabaseError> {
        repository::list_requests_for_parent(conn, parent_id, student_ids)
    }

    fn list_for_student(
        &self,
        conn: &Connection,
        student_id: &Uuid,
    ) -> Result<Vec<MedicationRequest>, DatabaseError> {
        repository::list_requests_for_student(conn, student_id)
    }

    fn list_by_status(
        &self,
        conn: &Connection,
        status: RequestStatus,
    ) -> Result<Vec<MedicationRequest>, DatabaseError> {
        repository::list_requests_by_status(conn, status)
    }
}

/// SQLite-backed student roster.
#[derive(Debug, Default)]
pub struct SqliteRoster;

impl RosterLookup for SqliteRoster {
    fn parent_owns_student(
        &self,
        conn: &Connection,
        parent_id: &Uuid,
        student_id: &Uuid,
    ) -> Result<bool, DatabaseError> {
        repository::parent_owns_student(conn, parent_id, student_id)
    }

    fn student_exists(&self, conn: &Connection, student_id: &Uuid) -> Result<bool, DatabaseError> {
        repository::student_exists(conn, student_id)
    }
}
