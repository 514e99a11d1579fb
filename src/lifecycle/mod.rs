//! Medication request lifecycle.
//!
//! A parent submits a request for their child (PendingConfirmation), the
//! school nurse accepts or rejects it, and an approved request is either
//! administered or discontinued. A nurse may also enter a walk-in request,
//! which starts out Approved.
//!
//! Every operation takes the caller explicitly and runs against a borrowed
//! connection. Check order for mutations:
//! role -> load -> ownership -> transition legality -> input -> guarded write.
//! The guarded write re-checks the status inside SQLite, so a caller that
//! lost a race gets `InvalidTransition` rather than overwriting the winner.

pub mod error;
pub mod store;
pub mod transitions;
pub mod types;
pub mod validation;

pub use error::LifecycleError;
pub use store::{MedicationRequestStore, RosterLookup, SqliteRequestStore, SqliteRoster};
pub use types::Caller;

use std::sync::Arc;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, repository::StatusChange};
use crate::models::enums::{NotificationKind, RequestAction, RequestStatus, Role};
use crate::models::*;
use crate::notify::{Notifier, ParentNotification};

pub struct LifecycleManager {
    store: Box<dyn MedicationRequestStore>,
    roster: Box<dyn RosterLookup>,
    notifier: Arc<dyn Notifier>,
}

impl LifecycleManager {
    /// Manager over the SQLite store and roster.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_parts(Box::new(SqliteRequestStore), Box::new(SqliteRoster), notifier)
    }

    pub fn with_parts(
        store: Box<dyn MedicationRequestStore>,
        roster: Box<dyn RosterLookup>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { store, roster, notifier }
    }

    // ── Creation ────────────────────────────────────────────

    /// Parent submits a request for one of their children.
    pub fn submit_by_parent(
        &self,
        conn: &Connection,
        caller: &Caller,
        student_id: &Uuid,
        fields: MedicationFields,
    ) -> Result<Uuid, LifecycleError> {
        if caller.role != Role::Parent {
            return Err(LifecycleError::NotAuthorized(format!(
                "{} cannot submit a parent medication request",
                caller.role
            )));
        }
        if !self.roster.parent_owns_student(conn, &caller.id, student_id)? {
            return Err(LifecycleError::NotAuthorized(format!(
                "student {student_id} is not linked to this parent"
            )));
        }
        let fields = validation::validate_fields(fields)?;

        let now = db::now_timestamp();
        let request = MedicationRequest {
            id: Uuid::new_v4(),
            student_id: *student_id,
            parent_id: Some(caller.id),
            fields,
            status: RequestStatus::PendingConfirmation,
            provided_by_parent: true,
            nurse_id: None,
            rejection_reason: None,
            discontinue_notes: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(conn, &request)?;

        tracing::info!(
            request_id = %request.id,
            student_id = %student_id,
            "Medication request submitted by parent"
        );
        Ok(request.id)
    }

    /// Nurse records a walk-in medication; no confirmation step.
    pub fn submit_by_nurse(
        &self,
        conn: &Connection,
        caller: &Caller,
        student_id: &Uuid,
        fields: MedicationFields,
    ) -> Result<Uuid, LifecycleError> {
        if caller.role != Role::Nurse {
            return Err(LifecycleError::NotAuthorized(format!(
                "{} cannot record nurse medication",
                caller.role
            )));
        }
        let fields = validation::validate_fields(fields)?;
        if !self.roster.student_exists(conn, student_id)? {
            return Err(LifecycleError::InvalidInput(format!("unknown student {student_id}")));
        }

        let now = db::now_timestamp();
        let request = MedicationRequest {
            id: Uuid::new_v4(),
            student_id: *student_id,
            parent_id: None,
            fields,
            status: RequestStatus::Approved,
            provided_by_parent: false,
            nurse_id: Some(caller.id),
            rejection_reason: None,
            discontinue_notes: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(conn, &request)?;

        tracing::info!(
            request_id = %request.id,
            student_id = %student_id,
            nurse_id = %caller.id,
            "Medication request recorded by nurse"
        );
        Ok(request.id)
    }

    // ── Parent edit ─────────────────────────────────────────

    /// Replace the fields of a pending request. Owner only.
    pub fn edit_by_parent(
        &self,
        conn: &Connection,
        caller: &Caller,
        request_id: &Uuid,
        fields: MedicationFields,
    ) -> Result<(), LifecycleError> {
        let action = RequestAction::Edit;
        self.require_role(caller, action)?;
        let request = self.load(conn, request_id)?;
        if request.parent_id != Some(caller.id) {
            return Err(LifecycleError::NotAuthorized(format!(
                "medication request {request_id} belongs to another parent"
            )));
        }
        self.require_transition(&request, action)?;
        let fields = validation::validate_fields(fields)?;

        let applied = self.store.update_pending_fields(
            conn,
            request_id,
            &caller.id,
            &fields,
            &db::now_timestamp(),
        )?;
        if !applied {
            return Err(self.lost_race(conn, request_id, action)?);
        }

        tracing::info!(request_id = %request_id, "Medication request edited by parent");
        Ok(())
    }

    // ── Nurse actions ───────────────────────────────────────

    pub fn accept(
        &self,
        conn: &Connection,
        caller: &Caller,
        request_id: &Uuid,
    ) -> Result<(), LifecycleError> {
        let action = RequestAction::Accept;
        self.require_role(caller, action)?;
        let request = self.load(conn, request_id)?;
        let to = self.require_transition(&request, action)?;

        self.apply(conn, &request, action, &StatusChange {
            status: to,
            nurse_id: Some(caller.id),
            rejection_reason: None,
            discontinue_notes: None,
            updated_at: db::now_timestamp(),
        })?;

        self.emit(
            &request,
            NotificationKind::MedicationApproved,
            "Medication request approved".to_string(),
            format!(
                "{} ({}) was approved by the school nurse.",
                request.fields.medication_name, request.fields.dosage
            ),
        );
        Ok(())
    }

    pub fn reject(
        &self,
        conn: &Connection,
        caller: &Caller,
        request_id: &Uuid,
        reason: &str,
    ) -> Result<(), LifecycleError> {
        let action = RequestAction::Reject;
        self.require_role(caller, action)?;
        let request = self.load(conn, request_id)?;
        let to = self.require_transition(&request, action)?;
        let reason = validation::validate_reason(reason)?;

        self.apply(conn, &request, action, &StatusChange {
            status: to,
            nurse_id: Some(caller.id),
            rejection_reason: Some(reason.clone()),
            discontinue_notes: None,
            updated_at: db::now_timestamp(),
        })?;

        self.emit(
            &request,
            NotificationKind::MedicationRejected,
            "Medication request rejected".to_string(),
            format!("{} was rejected: {reason}", request.fields.medication_name),
        );
        Ok(())
    }

    /// Mark an approved request administered and log the administration.
    pub fn mark_administered(
        &self,
        conn: &Connection,
        caller: &Caller,
        request_id: &Uuid,
        notes: Option<&str>,
    ) -> Result<(), LifecycleError> {
        let action = RequestAction::MarkAdministered;
        self.require_role(caller, action)?;
        let request = self.load(conn, request_id)?;
        let to = self.require_transition(&request, action)?;
        let notes = validation::normalize_notes(notes)?;

        let now = db::now_timestamp();
        let tx = conn.unchecked_transaction()?;
        self.apply(&tx, &request, action, &StatusChange {
            status: to,
            nurse_id: Some(caller.id),
            rejection_reason: None,
            discontinue_notes: None,
            updated_at: now,
        })?;
        self.store.record_administration(&tx, &MedicationAdministration {
            id: Uuid::new_v4(),
            request_id: *request_id,
            nurse_id: caller.id,
            administered_at: now,
            notes,
        })?;
        tx.commit()?;

        Ok(())
    }

    /// Stop an approved request. Nurse or manager.
    pub fn discontinue(
        &self,
        conn: &Connection,
        caller: &Caller,
        request_id: &Uuid,
        notes: Option<&str>,
    ) -> Result<(), LifecycleError> {
        let action = RequestAction::Discontinue;
        self.require_role(caller, action)?;
        let request = self.load(conn, request_id)?;
        let to = self.require_transition(&request, action)?;
        let notes = validation::normalize_notes(notes)?;

        self.apply(conn, &request, action, &StatusChange {
            status: to,
            nurse_id: (caller.role == Role::Nurse).then_some(caller.id),
            rejection_reason: None,
            discontinue_notes: notes.clone(),
            updated_at: db::now_timestamp(),
        })?;

        let mut content = format!("{} has been discontinued.", request.fields.medication_name);
        if let Some(notes) = &notes {
            content.push(' ');
            content.push_str(notes);
        }
        self.emit(
            &request,
            NotificationKind::MedicationDiscontinued,
            "Medication discontinued".to_string(),
            content,
        );
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────

    /// A single request, visible to staff and to the student's parents.
    pub fn get(
        &self,
        conn: &Connection,
        caller: &Caller,
        request_id: &Uuid,
    ) -> Result<MedicationRequest, LifecycleError> {
        let request = self.load(conn, request_id)?;
        self.require_student_access(conn, caller, &request.student_id)?;
        Ok(request)
    }

    /// Requests the caller submitted for the given children, newest first.
    pub fn list_for_parent(
        &self,
        conn: &Connection,
        caller: &Caller,
        student_ids: &[Uuid],
    ) -> Result<Vec<MedicationRequest>, LifecycleError> {
        if caller.role != Role::Parent {
            return Err(LifecycleError::NotAuthorized(format!(
                "{} has no parent medication list",
                caller.role
            )));
        }
        Ok(self.store.list_for_parent(conn, &caller.id, student_ids)?)
    }

    /// Every request for one student, including walk-in entries, newest first.
    pub fn list_for_student(
        &self,
        conn: &Connection,
        caller: &Caller,
        student_id: &Uuid,
    ) -> Result<Vec<MedicationRequest>, LifecycleError> {
        self.require_student_access(conn, caller, student_id)?;
        Ok(self.store.list_for_student(conn, student_id)?)
    }

    /// Triage queue: all requests in `status`, oldest first. Staff only.
    pub fn list_by_status(
        &self,
        conn: &Connection,
        caller: &Caller,
        status: RequestStatus,
    ) -> Result<Vec<MedicationRequest>, LifecycleError> {
        if !caller.role.is_staff() {
            return Err(LifecycleError::NotAuthorized(format!(
                "{} cannot view the triage queue",
                caller.role
            )));
        }
        Ok(self.store.list_by_status(conn, status)?)
    }

    pub fn administrations(
        &self,
        conn: &Connection,
        caller: &Caller,
        request_id: &Uuid,
    ) -> Result<Vec<MedicationAdministration>, LifecycleError> {
        let request = self.get(conn, caller, request_id)?;
        Ok(self.store.administrations(conn, &request.id)?)
    }

    // ── Helpers ─────────────────────────────────────────────

    fn load(&self, conn: &Connection, request_id: &Uuid) -> Result<MedicationRequest, LifecycleError> {
        self.store
            .get(conn, request_id)?
            .ok_or(LifecycleError::NotFound(*request_id))
    }

    fn require_role(&self, caller: &Caller, action: RequestAction) -> Result<(), LifecycleError> {
        if transitions::role_may(caller.role, action) {
            Ok(())
        } else {
            Err(LifecycleError::NotAuthorized(format!(
                "{} cannot {action} medication requests",
                caller.role
            )))
        }
    }

    fn require_transition(
        &self,
        request: &MedicationRequest,
        action: RequestAction,
    ) -> Result<RequestStatus, LifecycleError> {
        transitions::next_status(request.status, action).ok_or_else(|| {
            tracing::warn!(
                request_id = %request.id,
                status = %request.status,
                action = %action,
                "Refused medication request transition"
            );
            LifecycleError::InvalidTransition {
                request_id: request.id,
                from: request.status,
                action,
            }
        })
    }

    fn require_student_access(
        &self,
        conn: &Connection,
        caller: &Caller,
        student_id: &Uuid,
    ) -> Result<(), LifecycleError> {
        if caller.role.is_staff() {
            return Ok(());
        }
        if caller.role == Role::Parent
            && self.roster.parent_owns_student(conn, &caller.id, student_id)?
        {
            return Ok(());
        }
        Err(LifecycleError::NotAuthorized(format!(
            "{caller} cannot view medication for student {student_id}"
        )))
    }

    /// Guarded status write from the status `request` was loaded in.
    fn apply(
        &self,
        conn: &Connection,
        request: &MedicationRequest,
        action: RequestAction,
        change: &StatusChange,
    ) -> Result<(), LifecycleError> {
        if !self.store.transition(conn, &request.id, request.status, change)? {
            return Err(self.lost_race(conn, &request.id, action)?);
        }
        tracing::info!(
            request_id = %request.id,
            from = %request.status,
            to = %change.status,
            "Medication request transitioned"
        );
        Ok(())
    }

    /// Build the error for a guarded write that matched no row.
    fn lost_race(
        &self,
        conn: &Connection,
        request_id: &Uuid,
        action: RequestAction,
    ) -> Result<LifecycleError, LifecycleError> {
        let current = self.load(conn, request_id)?;
        tracing::warn!(
            request_id = %request_id,
            status = %current.status,
            action = %action,
            "Medication request changed concurrently"
        );
        Ok(LifecycleError::InvalidTransition {
            request_id: *request_id,
            from: current.status,
            action,
        })
    }

    fn emit(&self, request: &MedicationRequest, kind: NotificationKind, title: String, content: String) {
        let note = ParentNotification {
            student_id: request.student_id,
            request_id: Some(request.id),
            title,
            content,
            kind,
        };
        if let Err(e) = self.notifier.notify_parent(note) {
            tracing::warn!(
                request_id = %request.id,
                kind = %kind,
                error = %e,
                "Parent notification not queued"
            );
        }
    }
}

#[cfg(test)]
mod tests;
