use std::sync::{Arc, Barrier, Mutex};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use super::*;
use crate::db::repository::{link_parent_student, StatusChange};
use crate::db::DatabaseError;
use crate::db::repository::test_support::*;
use crate::db::sqlite::open_memory_database;
use crate::notify::testing::{ClosedNotifier, RecordingNotifier};

struct Fixture {
    conn: Connection,
    notifier: Arc<RecordingNotifier>,
    manager: LifecycleManager,
    parent: Caller,
    student: Uuid,
    n1: Caller,
    n2: Caller,
}

fn fixture() -> Fixture {
    let conn = open_memory_database().unwrap();
    let (parent_id, student) = seed_family(&conn);
    let notifier = Arc::new(RecordingNotifier::default());
    let manager = LifecycleManager::new(notifier.clone());
    Fixture {
        conn,
        notifier,
        manager,
        parent: Caller::parent(parent_id),
        student,
        n1: Caller::nurse(Uuid::new_v4()),
        n2: Caller::nurse(Uuid::new_v4()),
    }
}

impl Fixture {
    fn submit(&self) -> Uuid {
        self.manager
            .submit_by_parent(
                &self.conn,
                &self.parent,
                &self.student,
                paracetamol(date(2024, 1, 5), date(2024, 1, 10)),
            )
            .unwrap()
    }

    fn load(&self, id: &Uuid) -> MedicationRequest {
        self.manager.get(&self.conn, &self.n1, id).unwrap()
    }

    fn pending_queue(&self) -> Vec<MedicationRequest> {
        self.manager
            .list_by_status(&self.conn, &self.n1, RequestStatus::PendingConfirmation)
            .unwrap()
    }
}

fn assert_invalid_transition(result: Result<(), LifecycleError>, expected_from: RequestStatus) {
    match result {
        Err(LifecycleError::InvalidTransition { from, .. }) => assert_eq!(from, expected_from),
        other => panic!("expected InvalidTransition from {expected_from}, got {other:?}"),
    }
}

// ═══════════════════════════════════════════
// Walkthrough
// ═══════════════════════════════════════════

#[test]
fn paracetamol_with_end_before_start_creates_nothing() {
    let fx = fixture();
    let result = fx.manager.submit_by_parent(
        &fx.conn,
        &fx.parent,
        &fx.student,
        paracetamol(date(2024, 1, 10), date(2024, 1, 5)),
    );
    assert!(matches!(result, Err(LifecycleError::InvalidInput(_))));
    assert!(fx.pending_queue().is_empty());
    assert!(fx
        .manager
        .list_for_parent(&fx.conn, &fx.parent, &[fx.student])
        .unwrap()
        .is_empty());
}

#[test]
fn paracetamol_full_walkthrough() {
    let fx = fixture();

    let id = fx.submit();
    let created = fx.load(&id);
    assert_eq!(created.status, RequestStatus::PendingConfirmation);
    assert_eq!(created.nurse_id, None);
    assert!(created.provided_by_parent);

    fx.manager.accept(&fx.conn, &fx.n1, &id).unwrap();
    let approved = fx.load(&id);
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(approved.nurse_id, Some(fx.n1.id));

    let edit = fx.manager.edit_by_parent(
        &fx.conn,
        &fx.parent,
        &id,
        paracetamol(date(2024, 1, 6), date(2024, 1, 12)),
    );
    assert_invalid_transition(edit, RequestStatus::Approved);

    let reject = fx.manager.reject(&fx.conn, &fx.n2, &id, "Too late");
    assert_invalid_transition(reject, RequestStatus::Approved);

    fx.manager.mark_administered(&fx.conn, &fx.n1, &id, None).unwrap();
    assert_eq!(fx.load(&id).status, RequestStatus::Administered);

    let discontinue = fx.manager.discontinue(&fx.conn, &fx.n1, &id, Some("Course finished"));
    assert_invalid_transition(discontinue, RequestStatus::Administered);
}

// ═══════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════

#[test]
fn parent_cannot_submit_for_unlinked_student() {
    let fx = fixture();
    let stranger_child = seed_student(&fx.conn, "Not Mine");
    let result = fx.manager.submit_by_parent(
        &fx.conn,
        &fx.parent,
        &stranger_child,
        paracetamol(date(2024, 1, 5), date(2024, 1, 10)),
    );
    assert!(matches!(result, Err(LifecycleError::NotAuthorized(_))));
    assert!(fx.pending_queue().is_empty());
}

#[test]
fn nurse_cannot_use_parent_submission() {
    let fx = fixture();
    let result = fx.manager.submit_by_parent(
        &fx.conn,
        &fx.n1,
        &fx.student,
        paracetamol(date(2024, 1, 5), date(2024, 1, 10)),
    );
    assert!(matches!(result, Err(LifecycleError::NotAuthorized(_))));
}

#[test]
fn nurse_submission_starts_approved() {
    let fx = fixture();
    let id = fx
        .manager
        .submit_by_nurse(
            &fx.conn,
            &fx.n1,
            &fx.student,
            paracetamol(date(2024, 3, 1), date(2024, 3, 1)),
        )
        .unwrap();

    let request = fx.load(&id);
    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(request.nurse_id, Some(fx.n1.id));
    assert_eq!(request.parent_id, None);
    assert!(!request.provided_by_parent);
    assert!(fx.pending_queue().is_empty());
}

#[test]
fn nurse_submission_checks_dates_and_student() {
    let fx = fixture();
    let bad_dates = fx.manager.submit_by_nurse(
        &fx.conn,
        &fx.n1,
        &fx.student,
        paracetamol(date(2024, 3, 2), date(2024, 3, 1)),
    );
    assert!(matches!(bad_dates, Err(LifecycleError::InvalidInput(_))));

    let unknown = fx.manager.submit_by_nurse(
        &fx.conn,
        &fx.n1,
        &Uuid::new_v4(),
        paracetamol(date(2024, 3, 1), date(2024, 3, 1)),
    );
    assert!(matches!(unknown, Err(LifecycleError::InvalidInput(_))));
}

#[test]
fn manager_cannot_record_walk_in() {
    let fx = fixture();
    let result = fx.manager.submit_by_nurse(
        &fx.conn,
        &Caller::manager(Uuid::new_v4()),
        &fx.student,
        paracetamol(date(2024, 3, 1), date(2024, 3, 1)),
    );
    assert!(matches!(result, Err(LifecycleError::NotAuthorized(_))));
}

// ═══════════════════════════════════════════
// Parent edits
// ═══════════════════════════════════════════

#[test]
fn owner_edits_pending_request() {
    let fx = fixture();
    let id = fx.submit();
    let mut fields = paracetamol(date(2024, 1, 5), date(2024, 1, 12));
    fields.dosage = "500mg".into();

    fx.manager.edit_by_parent(&fx.conn, &fx.parent, &id, fields).unwrap();

    let request = fx.load(&id);
    assert_eq!(request.fields.dosage, "500mg");
    assert_eq!(request.fields.end_date, date(2024, 1, 12));
    assert_eq!(request.status, RequestStatus::PendingConfirmation);
}

#[test]
fn edit_with_bad_dates_leaves_request_unchanged() {
    let fx = fixture();
    let id = fx.submit();
    let before = fx.load(&id);

    let result = fx.manager.edit_by_parent(
        &fx.conn,
        &fx.parent,
        &id,
        paracetamol(date(2024, 2, 1), date(2024, 1, 1)),
    );
    assert!(matches!(result, Err(LifecycleError::InvalidInput(_))));
    assert_eq!(fx.load(&id).fields, before.fields);
}

#[test]
fn other_parent_cannot_edit() {
    let fx = fixture();
    let id = fx.submit();
    let other = Caller::parent(seed_parent(&fx.conn, "Other Parent"));
    link_parent_student(&fx.conn, &other.id, &fx.student).unwrap();

    let result = fx.manager.edit_by_parent(
        &fx.conn,
        &other,
        &id,
        paracetamol(date(2024, 1, 5), date(2024, 1, 10)),
    );
    assert!(matches!(result, Err(LifecycleError::NotAuthorized(_))));
}

#[test]
fn edit_after_nurse_action_fails_even_with_invalid_fields() {
    let fx = fixture();
    let id = fx.submit();
    fx.manager.reject(&fx.conn, &fx.n1, &id, "Needs prescription").unwrap();

    let mut fields = paracetamol(date(2024, 2, 1), date(2024, 1, 1));
    fields.medication_name = String::new();
    let result = fx.manager.edit_by_parent(&fx.conn, &fx.parent, &id, fields);
    assert_invalid_transition(result, RequestStatus::Rejected);
}

#[test]
fn nurse_originated_request_is_not_parent_editable() {
    let fx = fixture();
    let id = fx
        .manager
        .submit_by_nurse(&fx.conn, &fx.n1, &fx.student, paracetamol(date(2024, 3, 1), date(2024, 3, 1)))
        .unwrap();
    let result = fx.manager.edit_by_parent(
        &fx.conn,
        &fx.parent,
        &id,
        paracetamol(date(2024, 3, 1), date(2024, 3, 2)),
    );
    assert!(matches!(result, Err(LifecycleError::NotAuthorized(_))));
}

// ═══════════════════════════════════════════
// Nurse decisions
// ═══════════════════════════════════════════

#[test]
fn reject_requires_reason() {
    let fx = fixture();
    let id = fx.submit();
    let result = fx.manager.reject(&fx.conn, &fx.n1, &id, "   ");
    assert!(matches!(result, Err(LifecycleError::InvalidInput(_))));
    let request = fx.load(&id);
    assert_eq!(request.status, RequestStatus::PendingConfirmation);
    assert_eq!(request.rejection_reason, None);
}

#[test]
fn rejection_reason_only_on_rejected() {
    let fx = fixture();
    let rejected = fx.submit();
    let accepted = fx.submit();
    fx.manager.reject(&fx.conn, &fx.n1, &rejected, "Dose too high").unwrap();
    fx.manager.accept(&fx.conn, &fx.n1, &accepted).unwrap();

    let r = fx.load(&rejected);
    assert_eq!(r.status, RequestStatus::Rejected);
    assert_eq!(r.rejection_reason.as_deref(), Some("Dose too high"));
    assert_eq!(r.nurse_id, Some(fx.n1.id));

    assert_eq!(fx.load(&accepted).rejection_reason, None);
}

#[test]
fn parent_cannot_accept() {
    let fx = fixture();
    let id = fx.submit();
    let result = fx.manager.accept(&fx.conn, &fx.parent, &id);
    assert!(matches!(result, Err(LifecycleError::NotAuthorized(_))));
    assert_eq!(fx.load(&id).status, RequestStatus::PendingConfirmation);
}

#[test]
fn unknown_request_is_not_found() {
    let fx = fixture();
    let missing = Uuid::new_v4();
    assert!(matches!(
        fx.manager.accept(&fx.conn, &fx.n1, &missing),
        Err(LifecycleError::NotFound(id)) if id == missing
    ));
}

#[test]
fn administer_requires_approval() {
    let fx = fixture();
    let id = fx.submit();
    let result = fx.manager.mark_administered(&fx.conn, &fx.n1, &id, None);
    assert_invalid_transition(result, RequestStatus::PendingConfirmation);
}

#[test]
fn administer_writes_log_entry() {
    let fx = fixture();
    let id = fx.submit();
    fx.manager.accept(&fx.conn, &fx.n1, &id).unwrap();
    fx.manager
        .mark_administered(&fx.conn, &fx.n2, &id, Some(" Taken with water "))
        .unwrap();

    let log = fx.manager.administrations(&fx.conn, &fx.parent, &id).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].nurse_id, fx.n2.id);
    assert_eq!(log[0].notes.as_deref(), Some("Taken with water"));
    assert_eq!(fx.load(&id).nurse_id, Some(fx.n2.id));
}

#[test]
fn manager_discontinues_with_notes() {
    let fx = fixture();
    let id = fx.submit();
    fx.manager.accept(&fx.conn, &fx.n1, &id).unwrap();

    let manager = Caller::manager(Uuid::new_v4());
    fx.manager
        .discontinue(&fx.conn, &manager, &id, Some("Doctor stopped treatment"))
        .unwrap();

    let request = fx.load(&id);
    assert_eq!(request.status, RequestStatus::Discontinued);
    assert_eq!(request.discontinue_notes.as_deref(), Some("Doctor stopped treatment"));
    // Manager action keeps the accepting nurse on record.
    assert_eq!(request.nurse_id, Some(fx.n1.id));
}

#[test]
fn discontinue_pending_is_invalid() {
    let fx = fixture();
    let id = fx.submit();
    let result = fx.manager.discontinue(&fx.conn, &fx.n1, &id, None);
    assert_invalid_transition(result, RequestStatus::PendingConfirmation);
}

// ═══════════════════════════════════════════
// Notifications
// ═══════════════════════════════════════════

#[test]
fn parent_notified_on_accept_reject_discontinue() {
    let fx = fixture();
    let accepted = fx.submit();
    let rejected = fx.submit();
    fx.manager.accept(&fx.conn, &fx.n1, &accepted).unwrap();
    fx.manager.reject(&fx.conn, &fx.n1, &rejected, "No prescription").unwrap();
    fx.manager.mark_administered(&fx.conn, &fx.n1, &accepted, None).unwrap();

    let walk_in = fx
        .manager
        .submit_by_nurse(&fx.conn, &fx.n1, &fx.student, paracetamol(date(2024, 3, 1), date(2024, 3, 3)))
        .unwrap();
    fx.manager.discontinue(&fx.conn, &fx.n1, &walk_in, Some("Fever gone")).unwrap();

    let sent = fx.notifier.sent();
    let kinds: Vec<NotificationKind> = sent.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::MedicationApproved,
            NotificationKind::MedicationRejected,
            NotificationKind::MedicationDiscontinued,
        ]
    );
    assert_eq!(sent[0].request_id, Some(accepted));
    assert!(sent[1].content.contains("No prescription"));
    assert!(sent[2].content.contains("Fever gone"));
    assert!(sent.iter().all(|n| n.student_id == fx.student));
}

#[test]
fn refused_transition_sends_nothing() {
    let fx = fixture();
    let id = fx.submit();
    fx.manager.accept(&fx.conn, &fx.n1, &id).unwrap();
    let _ = fx.manager.accept(&fx.conn, &fx.n2, &id);
    assert_eq!(fx.notifier.sent().len(), 1);
}

#[test]
fn notifier_failure_does_not_fail_transition() {
    let conn = open_memory_database().unwrap();
    let (parent_id, student) = seed_family(&conn);
    let manager = LifecycleManager::new(Arc::new(ClosedNotifier));
    let id = manager
        .submit_by_parent(
            &conn,
            &Caller::parent(parent_id),
            &student,
            paracetamol(date(2024, 1, 5), date(2024, 1, 10)),
        )
        .unwrap();

    let nurse = Caller::nurse(Uuid::new_v4());
    manager.accept(&conn, &nurse, &id).unwrap();
    assert_eq!(manager.get(&conn, &nurse, &id).unwrap().status, RequestStatus::Approved);
}

// ═══════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════

#[test]
fn parent_list_is_newest_first_and_owned_only() {
    let fx = fixture();
    let first = fx.submit();
    let second = fx.submit();
    fx.manager
        .submit_by_nurse(&fx.conn, &fx.n1, &fx.student, paracetamol(date(2024, 3, 1), date(2024, 3, 1)))
        .unwrap();

    let listed = fx.manager.list_for_parent(&fx.conn, &fx.parent, &[fx.student]).unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second, first]);

    let all = fx.manager.list_for_student(&fx.conn, &fx.parent, &fx.student).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn triage_queue_is_staff_only() {
    let fx = fixture();
    fx.submit();
    let result = fx
        .manager
        .list_by_status(&fx.conn, &fx.parent, RequestStatus::PendingConfirmation);
    assert!(matches!(result, Err(LifecycleError::NotAuthorized(_))));

    let admin = Caller::admin(Uuid::new_v4());
    let queue = fx
        .manager
        .list_by_status(&fx.conn, &admin, RequestStatus::PendingConfirmation)
        .unwrap();
    assert_eq!(queue.len(), 1);
}

#[test]
fn unrelated_parent_cannot_read_request() {
    let fx = fixture();
    let id = fx.submit();
    let stranger = Caller::parent(seed_parent(&fx.conn, "Stranger"));
    assert!(matches!(
        fx.manager.get(&fx.conn, &stranger, &id),
        Err(LifecycleError::NotAuthorized(_))
    ));
    assert!(matches!(
        fx.manager.list_for_student(&fx.conn, &stranger, &fx.student),
        Err(LifecycleError::NotAuthorized(_))
    ));
}

// ═══════════════════════════════════════════
// Concurrency
// ═══════════════════════════════════════════

#[test]
fn concurrent_accept_and_reject_resolve_to_one_winner() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("race.db");
    let conn = crate::db::open_database(&path).unwrap();
    let (parent_id, student) = seed_family(&conn);
    let manager = Arc::new(LifecycleManager::new(Arc::new(RecordingNotifier::default())));
    let parent = Caller::parent(parent_id);

    for _ in 0..10 {
        let id = manager
            .submit_by_parent(&conn, &parent, &student, paracetamol(date(2024, 1, 5), date(2024, 1, 10)))
            .unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let accept = {
            let (manager, barrier, path) = (manager.clone(), barrier.clone(), path.clone());
            std::thread::spawn(move || {
                let conn = crate::db::open_database(&path).unwrap();
                barrier.wait();
                manager.accept(&conn, &Caller::nurse(Uuid::new_v4()), &id)
            })
        };
        let reject = {
            let (manager, barrier, path) = (manager.clone(), barrier.clone(), path.clone());
            std::thread::spawn(move || {
                let conn = crate::db::open_database(&path).unwrap();
                barrier.wait();
                manager.reject(&conn, &Caller::nurse(Uuid::new_v4()), &id, "Duplicate request")
            })
        };

        let results = [accept.join().unwrap(), reject.join().unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(LifecycleError::InvalidTransition { .. })))
            .count();
        assert_eq!((wins, conflicts), (1, 1), "results: {results:?}");

        let final_status = manager.get(&conn, &Caller::nurse(Uuid::new_v4()), &id).unwrap().status;
        if results[0].is_ok() {
            assert_eq!(final_status, RequestStatus::Approved);
        } else {
            assert_eq!(final_status, RequestStatus::Rejected);
        }
    }
}

/// Hands out one stale snapshot from `get`, then reads through to SQLite.
/// Models a caller whose read happened before another caller's write.
struct StaleStore {
    stale: Mutex<Option<MedicationRequest>>,
}

impl StaleStore {
    fn serving(snapshot: MedicationRequest) -> Self {
        Self {
            stale: Mutex::new(Some(snapshot)),
        }
    }
}

impl MedicationRequestStore for StaleStore {
    fn insert(&self, conn: &Connection, request: &MedicationRequest) -> Result<(), DatabaseError> {
        SqliteRequestStore.insert(conn, request)
    }

    fn get(&self, conn: &Connection, id: &Uuid) -> Result<Option<MedicationRequest>, DatabaseError> {
        match self.stale.lock().unwrap().take() {
            Some(snapshot) => Ok(Some(snapshot)),
            None => SqliteRequestStore.get(conn, id),
        }
    }

    fn update_pending_fields(
        &self,
        conn: &Connection,
        id: &Uuid,
        parent_id: &Uuid,
        fields: &MedicationFields,
        updated_at: &NaiveDateTime,
    ) -> Result<bool, DatabaseError> {
        SqliteRequestStore.update_pending_fields(conn, id, parent_id, fields, updated_at)
    }

    fn transition(
        &self,
        conn: &Connection,
        id: &Uuid,
        expected: RequestStatus,
        change: &StatusChange,
    ) -> Result<bool, DatabaseError> {
        SqliteRequestStore.transition(conn, id, expected, change)
    }

    fn record_administration(
        &self,
        conn: &Connection,
        entry: &MedicationAdministration,
    ) -> Result<(), DatabaseError> {
        SqliteRequestStore.record_administration(conn, entry)
    }

    fn administrations(
        &self,
        conn: &Connection,
        request_id: &Uuid,
    ) -> Result<Vec<MedicationAdministration>, DatabaseError> {
        SqliteRequestStore.administrations(conn, request_id)
    }

    fn list_for_parent(
        &self,
        conn: &Connection,
        parent_id: &Uuid,
        student_ids: &[Uuid],
    ) -> Result<Vec<MedicationRequest>, DatabaseError> {
        SqliteRequestStore.list_for_parent(conn, parent_id, student_ids)
    }

    fn list_for_student(
        &self,
        conn: &Connection,
        student_id: &Uuid,
    ) -> Result<Vec<MedicationRequest>, DatabaseError> {
        SqliteRequestStore.list_for_student(conn, student_id)
    }

    fn list_by_status(
        &self,
        conn: &Connection,
        status: RequestStatus,
    ) -> Result<Vec<MedicationRequest>, DatabaseError> {
        SqliteRequestStore.list_by_status(conn, status)
    }
}

fn stale_manager(snapshot: MedicationRequest, notifier: Arc<RecordingNotifier>) -> LifecycleManager {
    LifecycleManager::with_parts(
        Box::new(StaleStore::serving(snapshot)),
        Box::new(SqliteRoster),
        notifier,
    )
}

#[test]
fn reject_from_stale_read_loses_to_committed_accept() {
    let fx = fixture();
    let id = fx.submit();
    let snapshot = fx.load(&id);
    fx.manager.accept(&fx.conn, &fx.n1, &id).unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let late = stale_manager(snapshot, notifier.clone());
    assert_invalid_transition(
        late.reject(&fx.conn, &fx.n2, &id, "Duplicate request"),
        RequestStatus::Approved,
    );

    let current = fx.load(&id);
    assert_eq!(current.status, RequestStatus::Approved);
    assert_eq!(current.nurse_id, Some(fx.n1.id));
    assert!(current.rejection_reason.is_none());
    assert!(notifier.sent().is_empty());
}

#[test]
fn edit_from_stale_read_loses_to_committed_accept() {
    let fx = fixture();
    let id = fx.submit();
    let snapshot = fx.load(&id);
    fx.manager.accept(&fx.conn, &fx.n1, &id).unwrap();

    let late = stale_manager(snapshot, Arc::new(RecordingNotifier::default()));
    let mut fields = paracetamol(date(2024, 1, 5), date(2024, 1, 10));
    fields.dosage = "500mg".into();
    assert_invalid_transition(
        late.edit_by_parent(&fx.conn, &fx.parent, &id, fields),
        RequestStatus::Approved,
    );
    assert_eq!(fx.load(&id).fields.dosage, "250mg");
}
