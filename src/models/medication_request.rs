use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RequestStatus;

/// Parent-editable part of a medication request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationFields {
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default)]
    pub instructions: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub prescription_image: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    /// Submitting parent. `None` for nurse-originated requests.
    pub parent_id: Option<Uuid>,
    #[serde(flatten)]
    pub fields: MedicationFields,
    pub status: RequestStatus,
    pub provided_by_parent: bool,
    pub nurse_id: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub discontinue_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One dose given by a nurse against an approved request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationAdministration {
    pub id: Uuid,
    pub request_id: Uuid,
    pub nurse_id: Uuid,
    pub administered_at: NaiveDateTime,
    pub notes: Option<String>,
}
