//! Input normalization for medication request fields.

use crate::models::MedicationFields;

use super::error::LifecycleError;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_SHORT_FIELD_LEN: usize = 100;
pub const MAX_TEXT_LEN: usize = 2000;

/// Trim all text, drop blank optionals, and check required fields and dates.
pub fn validate_fields(fields: MedicationFields) -> Result<MedicationFields, LifecycleError> {
    let medication_name = required("medication_name", &fields.medication_name, MAX_NAME_LEN)?;
    let dosage = required("dosage", &fields.dosage, MAX_SHORT_FIELD_LEN)?;
    let frequency = required("frequency", &fields.frequency, MAX_SHORT_FIELD_LEN)?;
    let instructions = optional("instructions", fields.instructions.as_deref(), MAX_TEXT_LEN)?;
    let prescription_image =
        optional("prescription_image", fields.prescription_image.as_deref(), MAX_TEXT_LEN)?;
    let notes = optional("notes", fields.notes.as_deref(), MAX_TEXT_LEN)?;

    if fields.end_date < fields.start_date {
        return Err(LifecycleError::InvalidInput(format!(
            "end_date {} is before start_date {}",
            fields.end_date, fields.start_date
        )));
    }

    Ok(MedicationFields {
        medication_name,
        dosage,
        frequency,
        instructions,
        start_date: fields.start_date,
        end_date: fields.end_date,
        prescription_image,
        notes,
    })
}

/// A rejection reason must say something.
pub fn validate_reason(reason: &str) -> Result<String, LifecycleError> {
    required("reason", reason, MAX_TEXT_LEN)
}

/// Free-text notes: blank becomes `None`.
pub fn normalize_notes(notes: Option<&str>) -> Result<Option<String>, LifecycleError> {
    optional("notes", notes, MAX_TEXT_LEN)
}

fn required(field: &str, value: &str, max: usize) -> Result<String, LifecycleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::InvalidInput(format!("{field} is required")));
    }
    check_len(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

fn optional(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, LifecycleError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => {
            check_len(field, v, max)?;
            Ok(Some(v.to_string()))
        }
        _ => Ok(None),
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), LifecycleError> {
    if value.chars().count() > max {
        return Err(LifecycleError::InvalidInput(format!(
            "{field} exceeds {max} characters"
        )));
    }
    Ok(())
}
