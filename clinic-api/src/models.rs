use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clinic_shared::errors::{AppError, AppResult, ErrorCode};
use clinic_shared::types::auth::UserRole;

use crate::formats;
use crate::schema::{appointments, doctors, medical_records, notifications, users};

// --- Users ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub is_doctor: bool,
    pub roll_number: String,
    pub medical_history: Vec<String>,
    /// Registered over a placeholder patient; login waits for an admin.
    pub claim_pending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        UserRole::from_flags(self.is_admin, self.is_doctor)
    }

    /// Auto-created patients have no credentials until they register.
    pub fn is_placeholder(&self) -> bool {
        self.password_hash.is_none()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub roll_number: String,
}

// --- Notifications ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = notifications)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub message: String,
    pub on_click_path: String,
    #[serde(skip_serializing)]
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: String,
    pub message: String,
    pub on_click_path: String,
}

// --- Doctors ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoctorStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for DoctorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoctorStatus::Pending => write!(f, "pending"),
            DoctorStatus::Approved => write!(f, "approved"),
            DoctorStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for DoctorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DoctorStatus::Pending),
            "approved" => Ok(DoctorStatus::Approved),
            "rejected" => Ok(DoctorStatus::Rejected),
            _ => Err(format!("unknown doctor status: {s}")),
        }
    }
}

/// Consultation hours, half open: `start <= t < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    #[serde(with = "formats::hhmm")]
    pub start: NaiveTime,
    #[serde(with = "formats::hhmm")]
    pub end: NaiveTime,
}

impl Timings {
    pub fn new(start: NaiveTime, end: NaiveTime) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::new(
                ErrorCode::InvalidTimings,
                "timings must start before they end",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = doctors)]
#[serde(into = "DoctorView")]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub website: Option<String>,
    pub address: String,
    pub specialization: String,
    pub experience: String,
    pub fees_per_consultation: i32,
    pub timing_start: NaiveTime,
    pub timing_end: NaiveTime,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn timings(&self) -> Timings {
        Timings { start: self.timing_start, end: self.timing_end }
    }

    pub fn is_approved(&self) -> bool {
        self.status.parse::<DoctorStatus>() == Ok(DoctorStatus::Approved)
    }
}

/// JSON shape of a doctor profile: the two timing columns travel as one
/// `timings` object.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub website: Option<String>,
    pub address: String,
    pub specialization: String,
    pub experience: String,
    pub fees_per_consultation: i32,
    pub timings: Timings,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Doctor> for DoctorView {
    fn from(d: Doctor) -> Self {
        let timings = d.timings();
        Self {
            id: d.id,
            user_id: d.user_id,
            email: d.email,
            name: d.name,
            phone: d.phone,
            website: d.website,
            address: d.address,
            specialization: d.specialization,
            experience: d.experience,
            fees_per_consultation: d.fees_per_consultation,
            timings,
            status: d.status,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = doctors)]
pub struct NewDoctor {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub website: Option<String>,
    pub address: String,
    pub specialization: String,
    pub experience: String,
    pub fees_per_consultation: i32,
    pub timing_start: NaiveTime,
    pub timing_end: NaiveTime,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = doctors)]
pub struct DoctorChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub specialization: Option<String>,
    pub experience: Option<String>,
    pub fees_per_consultation: Option<i32>,
    pub timing_start: Option<NaiveTime>,
    pub timing_end: Option<NaiveTime>,
}

// --- Appointments ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl AppointmentStatus {
    /// `pending -> approved | rejected`; approved and rejected are final.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (AppointmentStatus::Pending, AppointmentStatus::Approved)
                | (AppointmentStatus::Pending, AppointmentStatus::Rejected)
        )
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "approved" => Ok(AppointmentStatus::Approved),
            "rejected" => Ok(AppointmentStatus::Rejected),
            _ => Err(format!("unknown appointment status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = appointments)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "date", with = "formats::day")]
    pub appointment_date: NaiveDate,
    #[serde(rename = "time", with = "formats::hhmm")]
    pub appointment_time: NaiveTime,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn status(&self) -> AppResult<AppointmentStatus> {
        self.status
            .parse()
            .map_err(|e: String| AppError::internal(format!("corrupt appointment {}: {e}", self.id)))
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = appointments)]
pub struct NewAppointment {
    pub doctor_id: Uuid,
    pub user_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: String,
}

// --- Medical records ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = medical_records)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// User id of the owning doctor.
    pub doctor_id: Uuid,
    pub diagnosis: String,
    pub symptoms: Vec<String>,
    pub prescription: String,
    pub prescription_image: String,
    pub notes: String,
    #[serde(with = "formats::opt_day")]
    pub follow_up_date: Option<NaiveDate>,
    pub attachments: Vec<String>,
    pub visit_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = medical_records)]
pub struct NewMedicalRecord {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub diagnosis: String,
    pub symptoms: Vec<String>,
    pub prescription: String,
    pub prescription_image: String,
    pub notes: String,
    pub follow_up_date: Option<NaiveDate>,
    pub attachments: Vec<String>,
    pub visit_date: Option<DateTime<Utc>>,
}

/// Full replacement of the clinical fields; `None` clears the follow-up date.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = medical_records, treat_none_as_null = true)]
pub struct MedicalRecordChanges {
    pub doctor_id: Uuid,
    pub diagnosis: String,
    pub symptoms: Vec<String>,
    pub prescription: String,
    pub prescription_image: String,
    pub notes: String,
    pub follow_up_date: Option<NaiveDate>,
    pub attachments: Vec<String>,
}
