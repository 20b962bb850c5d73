use chrono::{DateTime, NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use clinic_shared::errors::{AppError, AppResult, ErrorCode};
use clinic_shared::types::auth::AuthUser;

use crate::formats;
use crate::models::{MedicalRecord, MedicalRecordChanges, NewMedicalRecord, User};
use crate::schema::medical_records;
use crate::services::record_policy::{self, RecordCaller, RecordOperation, RecordParties};
use crate::services::user_service;

/// Clinical fields of a record as submitted by a doctor.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordFields {
    #[serde(default)]
    #[validate(length(min = 1, message = "diagnosis is required"))]
    pub diagnosis: String,
    #[serde(default, deserialize_with = "formats::string_or_list")]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub prescription: String,
    #[serde(default)]
    pub prescription_image: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "formats::opt_day::deserialize")]
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub visit_date: Option<DateTime<Utc>>,
}

impl RecordFields {
    fn into_changes(self, doctor_user_id: Uuid) -> MedicalRecordChanges {
        MedicalRecordChanges {
            doctor_id: doctor_user_id,
            diagnosis: self.diagnosis,
            symptoms: self.symptoms,
            prescription: self.prescription,
            prescription_image: self.prescription_image,
            notes: self.notes,
            follow_up_date: self.follow_up_date,
            attachments: self.attachments,
        }
    }
}

/// How the patient of a new record is resolved from its roll number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientResolution {
    /// Create a placeholder patient when the roll number is unknown.
    CreateIfMissing,
    /// An unknown roll number is `PatientNotFound`.
    MustExist,
}

fn resolve_patient(conn: &mut PgConnection, roll_number: &str, how: PatientResolution) -> AppResult<User> {
    match how {
        PatientResolution::CreateIfMissing => user_service::ensure_patient(conn, roll_number).map(|(user, _)| user),
        PatientResolution::MustExist => user_service::patient_by_roll_number(conn, roll_number),
    }
}

/// The caller's account as stored now; token roles can be stale.
fn live_caller(conn: &mut PgConnection, caller: &AuthUser) -> AppResult<RecordCaller> {
    let user = user_service::find_by_id(conn, caller.id)?;
    Ok(RecordCaller::from(&user))
}

fn insert(conn: &mut PgConnection, patient_id: Uuid, doctor_user_id: Uuid, fields: RecordFields) -> AppResult<MedicalRecord> {
    let record = diesel::insert_into(medical_records::table)
        .values(&NewMedicalRecord {
            patient_id,
            doctor_id: doctor_user_id,
            diagnosis: fields.diagnosis,
            symptoms: fields.symptoms,
            prescription: fields.prescription,
            prescription_image: fields.prescription_image,
            notes: fields.notes,
            follow_up_date: fields.follow_up_date,
            attachments: fields.attachments,
            visit_date: fields.visit_date,
        })
        .get_result::<MedicalRecord>(conn)?;

    tracing::info!(record_id = %record.id, patient_id = %patient_id, doctor_id = %doctor_user_id, "medical record created");
    Ok(record)
}

/// Writes a new record authored by `caller` for the patient holding
/// `roll_number`.
pub fn create(
    conn: &mut PgConnection,
    caller: &AuthUser,
    roll_number: &str,
    fields: RecordFields,
    how: PatientResolution,
) -> AppResult<MedicalRecord> {
    fields.validate()?;

    conn.transaction(|conn| {
        let caller = live_caller(conn, caller)?;
        let patient = resolve_patient(conn, roll_number, how)?;
        let parties = RecordParties { patient_id: patient.id, doctor_id: caller.id };
        record_policy::authorize(&caller, &parties, RecordOperation::Create)?;

        insert(conn, patient.id, caller.id, fields)
    })
}

fn find(conn: &mut PgConnection, record_id: Uuid) -> AppResult<MedicalRecord> {
    medical_records::table
        .find(record_id)
        .first::<MedicalRecord>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::RecordNotFound, "medical record not found"))
}

pub fn get(conn: &mut PgConnection, caller: &AuthUser, record_id: Uuid) -> AppResult<MedicalRecord> {
    let caller = live_caller(conn, caller)?;
    let record = find(conn, record_id)?;
    record_policy::authorize(&caller, &RecordParties::from(&record), RecordOperation::Read)?;
    Ok(record)
}

/// Replaces every clinical field of a record in one write.
pub fn update(conn: &mut PgConnection, caller: &AuthUser, record_id: Uuid, fields: RecordFields) -> AppResult<MedicalRecord> {
    fields.validate()?;

    let caller = live_caller(conn, caller)?;
    let record = find(conn, record_id)?;
    record_policy::authorize(&caller, &RecordParties::from(&record), RecordOperation::Update)?;

    replace(conn, record.id, caller.id, fields)
}

fn replace(conn: &mut PgConnection, record_id: Uuid, doctor_user_id: Uuid, fields: RecordFields) -> AppResult<MedicalRecord> {
    let updated = diesel::update(medical_records::table.find(record_id))
        .set((
            &fields.into_changes(doctor_user_id),
            medical_records::updated_at.eq(Utc::now()),
        ))
        .get_result::<MedicalRecord>(conn)?;

    tracing::info!(record_id = %updated.id, doctor_id = %doctor_user_id, "medical record updated");
    Ok(updated)
}

/// A patient's records, newest visit first.
pub fn list_for_patient(conn: &mut PgConnection, caller: &AuthUser, patient_id: Uuid) -> AppResult<Vec<MedicalRecord>> {
    let caller = live_caller(conn, caller)?;
    if !record_policy::can_view_history(&caller, patient_id) {
        return Err(AppError::forbidden("not authorized to access these records"));
    }

    Ok(medical_records::table
        .filter(medical_records::patient_id.eq(patient_id))
        .order((medical_records::visit_date.desc(), medical_records::created_at.desc()))
        .load::<MedicalRecord>(conn)?)
}

/// History of a patient, most recently written first.
pub fn history(conn: &mut PgConnection, patient_id: Uuid) -> AppResult<Vec<MedicalRecord>> {
    Ok(medical_records::table
        .filter(medical_records::patient_id.eq(patient_id))
        .order(medical_records::created_at.desc())
        .load::<MedicalRecord>(conn)?)
}

pub fn history_by_roll_number(conn: &mut PgConnection, caller: &AuthUser, roll_number: &str) -> AppResult<Vec<MedicalRecord>> {
    let caller = live_caller(conn, caller)?;
    let patient = user_service::patient_by_roll_number(conn, roll_number)?;
    if !record_policy::can_view_history(&caller, patient.id) {
        return Err(AppError::forbidden("not authorized to access these records"));
    }
    history(conn, patient.id)
}

fn current(conn: &mut PgConnection, patient_id: Uuid) -> AppResult<Option<MedicalRecord>> {
    Ok(medical_records::table
        .filter(medical_records::patient_id.eq(patient_id))
        .order(medical_records::created_at.desc())
        .first::<MedicalRecord>(conn)
        .optional()?)
}

/// Overwrites the patient's current record, or writes the first one when the
/// patient has none. Only the current record's doctor may overwrite it.
pub fn upsert_current(
    conn: &mut PgConnection,
    caller: &AuthUser,
    roll_number: &str,
    fields: RecordFields,
) -> AppResult<MedicalRecord> {
    fields.validate()?;

    conn.transaction(|conn| {
        let caller = live_caller(conn, caller)?;
        let patient = user_service::patient_by_roll_number(conn, roll_number)?;

        match current(conn, patient.id)? {
            Some(record) => {
                record_policy::authorize(&caller, &RecordParties::from(&record), RecordOperation::Update)?;
                replace(conn, record.id, caller.id, fields)
            }
            None => {
                let parties = RecordParties { patient_id: patient.id, doctor_id: caller.id };
                record_policy::authorize(&caller, &parties, RecordOperation::Create)?;
                insert(conn, patient.id, caller.id, fields)
            }
        }
    })
}

/// Prescription image of the patient's current record.
pub fn prescription_image(conn: &mut PgConnection, caller: &AuthUser, roll_number: &str) -> AppResult<String> {
    let caller = live_caller(conn, caller)?;
    let patient = user_service::patient_by_roll_number(conn, roll_number)?;
    if !record_policy::can_view_history(&caller, patient.id) {
        return Err(AppError::forbidden("not authorized to access these records"));
    }

    current(conn, patient.id)?
        .map(|record| record.prescription_image)
        .filter(|image| !image.is_empty())
        .ok_or_else(|| AppError::new(ErrorCode::PrescriptionImageNotFound, "no prescription image found"))
}
