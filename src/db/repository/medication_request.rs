use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_date, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::enums::*;
use crate::models::*;

const REQUEST_COLUMNS: &str = "id, student_id, parent_id, medication_name, dosage, frequency,
     instructions, start_date, end_date, prescription_image, notes, status,
     provided_by_parent, nurse_id, rejection_reason, discontinue_notes, created_at, updated_at";

/// Status change applied by a conditional update.
///
/// `nurse_id` and `discontinue_notes` keep their stored value when `None`;
/// `rejection_reason` is always written so it stays null outside Rejected.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: RequestStatus,
    pub nurse_id: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub discontinue_notes: Option<String>,
    pub updated_at: NaiveDateTime,
}

pub fn insert_medication_request(
    conn: &Connection,
    req: &MedicationRequest,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medication_requests (id, student_id, parent_id, medication_name, dosage,
         frequency, instructions, start_date, end_date, prescription_image, notes, status,
         provided_by_parent, nurse_id, rejection_reason, discontinue_notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            req.id.to_string(),
            req.student_id.to_string(),
            req.parent_id.map(|id| id.to_string()),
            req.fields.medication_name,
            req.fields.dosage,
            req.fields.frequency,
            req.fields.instructions,
            req.fields.start_date.to_string(),
            req.fields.end_date.to_string(),
            req.fields.prescription_image,
            req.fields.notes,
            req.status.as_str(),
            req.provided_by_parent as i32,
            req.nurse_id.map(|id| id.to_string()),
            req.rejection_reason,
            req.discontinue_notes,
            format_timestamp(&req.created_at),
            format_timestamp(&req.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_medication_request(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<MedicationRequest>, DatabaseError> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM medication_requests WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], request_row_from_rusqlite)
        .optional()?;

    row.map(request_from_row).transpose()
}

/// Replace the editable fields, only while the request is still pending
/// and owned by `parent_id`. Returns the number of rows changed (0 or 1).
pub fn update_pending_fields(
    conn: &Connection,
    id: &Uuid,
    parent_id: &Uuid,
    fields: &MedicationFields,
    updated_at: &NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE medication_requests SET medication_name = ?1, dosage = ?2, frequency = ?3,
         instructions = ?4, start_date = ?5, end_date = ?6, prescription_image = ?7, notes = ?8,
         updated_at = ?9
         WHERE id = ?10 AND parent_id = ?11 AND status = ?12",
        params![
            fields.medication_name,
            fields.dosage,
            fields.frequency,
            fields.instructions,
            fields.start_date.to_string(),
            fields.end_date.to_string(),
            fields.prescription_image,
            fields.notes,
            format_timestamp(updated_at),
            id.to_string(),
            parent_id.to_string(),
            RequestStatus::PendingConfirmation.as_str(),
        ],
    )?;
    Ok(changed)
}

/// Move a request to a new status, only if it is still in `expected`.
/// Returns the number of rows changed (0 means another writer got there first).
pub fn update_status_if(
    conn: &Connection,
    id: &Uuid,
    expected: RequestStatus,
    change: &StatusChange,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE medication_requests SET status = ?1, nurse_id = COALESCE(?2, nurse_id),
         rejection_reason = ?3, discontinue_notes = COALESCE(?4, discontinue_notes),
         updated_at = ?5
         WHERE id = ?6 AND status = ?7",
        params![
            change.status.as_str(),
            change.nurse_id.map(|id| id.to_string()),
            change.rejection_reason,
            change.discontinue_notes,
            format_timestamp(&change.updated_at),
            id.to_string(),
            expected.as_str(),
        ],
    )?;
    Ok(changed)
}

/// Requests submitted by `parent_id` for any of `student_ids`, newest first.
pub fn list_requests_for_parent(
    conn: &Connection,
    parent_id: &Uuid,
    student_ids: &[Uuid],
) -> Result<Vec<MedicationRequest>, DatabaseError> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut sql = format!("SELECT {REQUEST_COLUMNS} FROM medication_requests WHERE parent_id = ?1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(parent_id.to_string())];

    let placeholders: Vec<String> = (0..student_ids.len())
        .map(|i| format!("?{}", i + 2))
        .collect();
    sql.push_str(&format!(" AND student_id IN ({})", placeholders.join(", ")));
    for id in student_ids {
        params_vec.push(Box::new(id.to_string()));
    }
    sql.push_str(" ORDER BY created_at DESC, rowid DESC");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), request_row_from_rusqlite)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(request_from_row(row?)?);
    }
    Ok(requests)
}

/// Every request for a student (parent and nurse originated), newest first.
pub fn list_requests_for_student(
    conn: &Connection,
    student_id: &Uuid,
) -> Result<Vec<MedicationRequest>, DatabaseError> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM medication_requests WHERE student_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![student_id.to_string()], request_row_from_rusqlite)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(request_from_row(row?)?);
    }
    Ok(requests)
}

/// Requests in a given status, oldest first (triage queue order).
pub fn list_requests_by_status(
    conn: &Connection,
    status: RequestStatus,
) -> Result<Vec<MedicationRequest>, DatabaseError> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM medication_requests WHERE status = ?1
         ORDER BY created_at ASC, rowid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![status.as_str()], request_row_from_rusqlite)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(request_from_row(row?)?);
    }
    Ok(requests)
}

pub fn insert_administration(
    conn: &Connection,
    entry: &MedicationAdministration,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medication_administrations (id, request_id, nurse_id, administered_at, notes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.id.to_string(),
            entry.request_id.to_string(),
            entry.nurse_id.to_string(),
            format_timestamp(&entry.administered_at),
            entry.notes,
        ],
    )?;
    Ok(())
}

pub fn list_administrations(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<Vec<MedicationAdministration>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, nurse_id, administered_at, notes
         FROM medication_administrations WHERE request_id = ?1
         ORDER BY administered_at ASC",
    )?;

    let rows = stmt.query_map(params![request_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, request_id, nurse_id, administered_at, notes) = row?;
        entries.push(MedicationAdministration {
            id: parse_uuid(&id)?,
            request_id: parse_uuid(&request_id)?,
            nurse_id: parse_uuid(&nurse_id)?,
            administered_at: parse_timestamp(&administered_at)?,
            notes,
        });
    }
    Ok(entries)
}

// Internal row type for MedicationRequest mapping
struct RequestRow {
    id: String,
    student_id: String,
    parent_id: Option<String>,
    medication_name: String,
    dosage: String,
    frequency: String,
    instructions: Option<String>,
    start_date: String,
    end_date: String,
    prescription_image: Option<String>,
    notes: Option<String>,
    status: String,
    provided_by_parent: i32,
    nurse_id: Option<String>,
    rejection_reason: Option<String>,
    discontinue_notes: Option<String>,
    created_at: String,
    updated_at: String,
}

fn request_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<RequestRow, rusqlite::Error> {
    Ok(RequestRow {
        id: row.get(0)?,
        student_id: row.get(1)?,
        parent_id: row.get(2)?,
        medication_name: row.get(3)?,
        dosage: row.get(4)?,
        frequency: row.get(5)?,
        instructions: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        prescription_image: row.get(9)?,
        notes: row.get(10)?,
        status: row.get(11)?,
        provided_by_parent: row.get(12)?,
        nurse_id: row.get(13)?,
        rejection_reason: row.get(14)?,
        discontinue_notes: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn request_from_row(row: RequestRow) -> Result<MedicationRequest, DatabaseError> {
    Ok(MedicationRequest {
        id: parse_uuid(&row.id)?,
        student_id: parse_uuid(&row.student_id)?,
        parent_id: row.parent_id.as_deref().map(parse_uuid).transpose()?,
        fields: MedicationFields {
            medication_name: row.medication_name,
            dosage: row.dosage,
            frequency: row.frequency,
            instructions: row.instructions,
            start_date: parse_date(&row.start_date)?,
            end_date: parse_date(&row.end_date)?,
            prescription_image: row.prescription_image,
            notes: row.notes,
        },
        status: RequestStatus::from_str(&row.status)?,
        provided_by_parent: row.provided_by_parent != 0,
        nurse_id: row.nurse_id.as_deref().map(parse_uuid).transpose()?,
        rejection_reason: row.rejection_reason,
        discontinue_notes: row.discontinue_notes,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}
