use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use clinic_shared::clients::db;
use clinic_shared::errors::{AppError, AppResult, ErrorCode};
use clinic_shared::middleware::DoctorUser;
use clinic_shared::types::auth::{AuthUser, UserRole};
use clinic_shared::types::ApiResponse;

use crate::models::{Appointment, AppointmentStatus, Doctor, MedicalRecord, Timings};
use crate::routes::users::LoginRequest;
use crate::services::doctor_service::{DoctorApplication, ProfileUpdate};
use crate::services::record_service::{PatientResolution, RecordFields};
use crate::services::user_service::Registration;
use crate::services::{
    appointment_service, auth_service, doctor_service, record_service, token_service, user_service,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/doctorregister", post(register_doctor))
        .route("/login", post(login))
        .route("/auth", get(own_profile))
        .route("/getDoctors", get(list_doctors))
        .route("/updateProfile", post(update_profile))
        .route("/getDoctorById", post(get_doctor_by_id))
        .route("/doctor-appointments", get(own_appointments))
        .route("/update-status", post(update_status))
        .route("/appointments/:doctorId", get(appointments_of))
        .route("/user-medical-history/:rollNumber", get(medical_history))
        .route("/update-medical-history/:rollNumber", put(update_medical_history))
        .route("/create-medical-history", post(create_medical_history))
        .route("/prescription-image/:rollNumber", get(prescription_image))
}

/// Profile fields shared by doctor registration and `apply-doctor`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfileRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    pub website: Option<String>,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "specialization is required"))]
    pub specialization: String,
    #[validate(length(min = 1, message = "experience is required"))]
    pub experience: String,
    #[validate(range(min = 0, message = "fees cannot be negative"))]
    pub fees_per_consultation: i32,
    pub timings: Timings,
}

impl DoctorProfileRequest {
    /// Validates the profile and fills in the contact email from the account
    /// when none was given.
    pub fn into_application(self, account_email: Option<&str>) -> AppResult<DoctorApplication> {
        self.validate()?;
        let timings = Timings::new(self.timings.start, self.timings.end)?;

        let email = self
            .email
            .or_else(|| account_email.map(str::to_string))
            .ok_or_else(|| AppError::new(ErrorCode::ValidationError, "email is required"))?;

        Ok(DoctorApplication {
            email,
            name: self.name,
            phone: self.phone,
            website: self.website.filter(|w| !w.trim().is_empty()),
            address: self.address,
            specialization: self.specialization,
            experience: self.experience,
            fees_per_consultation: self.fees_per_consultation,
            timings,
        })
    }
}

// --- POST /doctorregister ---

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRegisterRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, message = "roll number is required"))]
    pub roll_number: String,
    #[serde(flatten)]
    pub profile: DoctorProfileRequest,
}

/// Creates the login account and a pending doctor profile in one go.
pub async fn register_doctor(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DoctorRegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Doctor>>)> {
    req.validate()?;
    auth_service::validate_password(&req.password)?;

    let application = req.profile.into_application(Some(&req.email))?;
    let registration = Registration {
        name: application.name.clone(),
        email: req.email,
        password_hash: auth_service::hash_password(&req.password)?,
        roll_number: req.roll_number.trim().to_string(),
    };

    let mut conn = db::connection(&state.db)?;
    let doctor = conn.transaction(|conn| {
        let user = user_service::register(conn, registration)?;
        doctor_service::apply(conn, &user, application)
    })?;

    tracing::info!(doctor_id = %doctor.id, user_id = %doctor.user_id, "doctor registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(doctor, "doctor registered, awaiting approval")),
    ))
}

// --- POST /login ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorLoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub doctor: Doctor,
}

/// Login for doctor accounts; only an approved doctor profile gets a token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<DoctorLoginResponse>>> {
    let mut conn = db::connection(&state.db)?;

    let user = user_service::authenticate(&mut conn, &req.email, &req.password)?;
    let doctor = doctor_service::find_by_user(&mut conn, user.id)?
        .filter(Doctor::is_approved)
        .ok_or_else(|| AppError::forbidden("doctor account not found or not approved"))?;

    // An approved profile is proof enough, even for admin accounts.
    let token = token_service::create_access_token(
        user.id,
        UserRole::Doctor,
        &state.config.jwt_secret,
        state.config.jwt_ttl,
    )?;

    tracing::info!(user_id = %user.id, doctor_id = %doctor.id, "doctor logged in");

    Ok(Json(ApiResponse::ok_with_message(
        DoctorLoginResponse {
            token: token.token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            doctor,
        },
        "login successful",
    )))
}

// --- GET /auth ---

pub async fn own_profile(
    DoctorUser(user): DoctorUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Doctor>>> {
    let mut conn = db::connection(&state.db)?;
    let doctor = doctor_service::own_profile(&mut conn, user.id)?;
    Ok(Json(ApiResponse::ok(doctor)))
}

// --- GET /getDoctors ---

pub async fn list_doctors(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Doctor>>>> {
    let mut conn = db::connection(&state.db)?;
    let doctors = doctor_service::approved(&mut conn)?;
    Ok(Json(ApiResponse::ok(doctors)))
}

// --- POST /updateProfile ---

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub specialization: Option<String>,
    pub experience: Option<String>,
    #[validate(range(min = 0, message = "fees cannot be negative"))]
    pub fees_per_consultation: Option<i32>,
    pub timings: Option<Timings>,
}

pub async fn update_profile(
    DoctorUser(user): DoctorUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<Doctor>>> {
    req.validate()?;
    let timings = req
        .timings
        .map(|t| Timings::new(t.start, t.end))
        .transpose()?;

    let mut conn = db::connection(&state.db)?;
    let doctor = doctor_service::update_profile(
        &mut conn,
        user.id,
        ProfileUpdate {
            name: req.name,
            phone: req.phone,
            website: req.website,
            address: req.address,
            specialization: req.specialization,
            experience: req.experience,
            fees_per_consultation: req.fees_per_consultation,
            timings,
        },
    )?;

    Ok(Json(ApiResponse::ok_with_message(doctor, "profile updated")))
}

// --- POST /getDoctorById ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorIdRequest {
    pub doctor_id: Uuid,
}

pub async fn get_doctor_by_id(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<DoctorIdRequest>,
) -> AppResult<Json<ApiResponse<Doctor>>> {
    let mut conn = db::connection(&state.db)?;
    let doctor = doctor_service::find_by_id(&mut conn, req.doctor_id)?;
    Ok(Json(ApiResponse::ok(doctor)))
}

// --- GET /doctor-appointments ---

pub async fn own_appointments(
    DoctorUser(user): DoctorUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Appointment>>>> {
    let mut conn = db::connection(&state.db)?;
    let doctor = doctor_service::own_profile(&mut conn, user.id)?;
    let appointments = appointment_service::for_doctor(&mut conn, doctor.id)?;
    Ok(Json(ApiResponse::ok(appointments)))
}

// --- POST /update-status ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub appointment_id: Uuid,
    pub status: String,
}

pub async fn update_status(
    DoctorUser(user): DoctorUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<Appointment>>> {
    let status: AppointmentStatus = req
        .status
        .parse()
        .map_err(|e: String| AppError::new(ErrorCode::ValidationError, e))?;

    let mut conn = db::connection(&state.db)?;
    let appointment = appointment_service::update_status(&mut conn, user.id, req.appointment_id, status)?;

    Ok(Json(ApiResponse::ok_with_message(appointment, "appointment status updated")))
}

// --- GET /appointments/:doctorId ---

pub async fn appointments_of(
    _doctor: DoctorUser,
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Appointment>>>> {
    let mut conn = db::connection(&state.db)?;
    let doctor = doctor_service::find_by_id(&mut conn, doctor_id)?;
    let appointments = appointment_service::for_doctor(&mut conn, doctor.id)?;
    Ok(Json(ApiResponse::ok(appointments)))
}

// --- GET /user-medical-history/:rollNumber ---

pub async fn medical_history(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(roll_number): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<MedicalRecord>>>> {
    let mut conn = db::connection(&state.db)?;
    let records = record_service::history_by_roll_number(&mut conn, &user, &roll_number)?;
    Ok(Json(ApiResponse::ok(records)))
}

// --- PUT /update-medical-history/:rollNumber ---

pub async fn update_medical_history(
    DoctorUser(user): DoctorUser,
    State(state): State<Arc<AppState>>,
    Path(roll_number): Path<String>,
    Json(fields): Json<RecordFields>,
) -> AppResult<Json<ApiResponse<MedicalRecord>>> {
    let mut conn = db::connection(&state.db)?;
    let record = record_service::upsert_current(&mut conn, &user, &roll_number, fields)?;
    Ok(Json(ApiResponse::ok_with_message(record, "medical record updated successfully")))
}

// --- POST /create-medical-history ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    pub roll_number: String,
    #[serde(flatten)]
    pub fields: RecordFields,
}

pub async fn create_medical_history(
    DoctorUser(user): DoctorUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRecordRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<MedicalRecord>>)> {
    let mut conn = db::connection(&state.db)?;
    let record = record_service::create(
        &mut conn,
        &user,
        &req.roll_number,
        req.fields,
        PatientResolution::MustExist,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(record, "medical record created successfully")),
    ))
}

// --- GET /prescription-image/:rollNumber ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionImage {
    pub prescription_image: String,
}

pub async fn prescription_image(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(roll_number): Path<String>,
) -> AppResult<Json<ApiResponse<PrescriptionImage>>> {
    let mut conn = db::connection(&state.db)?;
    let prescription_image = record_service::prescription_image(&mut conn, &user, &roll_number)?;
    Ok(Json(ApiResponse::ok(PrescriptionImage { prescription_image })))
}
