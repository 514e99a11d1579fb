use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::*;

pub fn insert_student(conn: &Connection, student: &Student) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO students (id, full_name, class_name) VALUES (?1, ?2, ?3)",
        params![student.id.to_string(), student.full_name, student.class_name],
    )?;
    Ok(())
}

pub fn get_student(conn: &Connection, id: &Uuid) -> Result<Option<Student>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, full_name, class_name FROM students WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, full_name, class_name)) => Ok(Some(Student {
            id: parse_uuid(&id)?,
            full_name,
            class_name,
        })),
        None => Ok(None),
    }
}

pub fn student_exists(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students WHERE id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn insert_parent(conn: &Connection, parent: &Parent) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO parents (id, full_name, email) VALUES (?1, ?2, ?3)",
        params![parent.id.to_string(), parent.full_name, parent.email],
    )?;
    Ok(())
}

pub fn get_parent(conn: &Connection, id: &Uuid) -> Result<Option<Parent>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, full_name, email FROM parents WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, full_name, email)) => Ok(Some(Parent {
            id: parse_uuid(&id)?,
            full_name,
            email,
        })),
        None => Ok(None),
    }
}

/// Link a parent to a student. Linking twice is a no-op.
pub fn link_parent_student(
    conn: &Connection,
    parent_id: &Uuid,
    student_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO parent_students (parent_id, student_id) VALUES (?1, ?2)",
        params![parent_id.to_string(), student_id.to_string()],
    )?;
    Ok(())
}

pub fn parent_owns_student(
    conn: &Connection,
    parent_id: &Uuid,
    student_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM parent_students WHERE parent_id = ?1 AND student_id = ?2",
        params![parent_id.to_string(), student_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn parents_of_student(conn: &Connection, student_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT parent_id FROM parent_students WHERE student_id = ?1 ORDER BY parent_id",
    )?;
    let rows = stmt.query_map(params![student_id.to_string()], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}

pub fn students_of_parent(conn: &Connection, parent_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT student_id FROM parent_students WHERE parent_id = ?1 ORDER BY student_id",
    )?;
    let rows = stmt.query_map(params![parent_id.to_string()], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}
