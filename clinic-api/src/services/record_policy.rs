//! Who may touch a medical record.
//!
//! All access decisions go through [`can_access`]; handlers call
//! [`authorize`] and never inspect roles themselves.
//!
//! Decisions use the caller's account as stored now, not the role in their
//! token: a doctor rejected after logging in loses the doctor grants at once,
//! and an admin who is also a doctor keeps them.

use uuid::Uuid;

use clinic_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{MedicalRecord, User};

/// The caller's current account flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCaller {
    pub id: Uuid,
    pub is_doctor: bool,
}

impl From<&User> for RecordCaller {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            is_doctor: user.is_doctor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOperation {
    Read,
    Create,
    Update,
}

/// The two users a record is about. `doctor_id` is the doctor's user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordParties {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
}

impl From<&MedicalRecord> for RecordParties {
    fn from(record: &MedicalRecord) -> Self {
        Self {
            patient_id: record.patient_id,
            doctor_id: record.doctor_id,
        }
    }
}

pub fn can_access(caller: &RecordCaller, parties: &RecordParties, op: RecordOperation) -> bool {
    match op {
        RecordOperation::Create => caller.is_doctor,
        // Any doctor may read any record.
        RecordOperation::Read => {
            caller.id == parties.patient_id || caller.id == parties.doctor_id || caller.is_doctor
        }
        RecordOperation::Update => caller.id == parties.doctor_id,
    }
}

pub fn authorize(caller: &RecordCaller, parties: &RecordParties, op: RecordOperation) -> AppResult<()> {
    if can_access(caller, parties, op) {
        return Ok(());
    }

    tracing::warn!(caller_id = %caller.id, is_doctor = caller.is_doctor, ?op, "medical record access denied");

    Err(match op {
        RecordOperation::Create => {
            AppError::new(ErrorCode::NotADoctor, "only doctors can create medical records")
        }
        RecordOperation::Read => AppError::forbidden("not allowed to view this medical record"),
        RecordOperation::Update => AppError::new(
            ErrorCode::NotRecordOwner,
            "only the doctor who wrote this record can update it",
        ),
    })
}

/// A patient's whole history is visible to the patient and to doctors.
pub fn can_view_history(caller: &RecordCaller, patient_id: Uuid) -> bool {
    caller.id == patient_id || caller.is_doctor
}
