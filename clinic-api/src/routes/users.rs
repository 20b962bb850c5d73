use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use clinic_shared::clients::db;
use clinic_shared::errors::AppResult;
use clinic_shared::types::auth::{AccessToken, AuthUser};
use clinic_shared::types::ApiResponse;

use crate::formats;
use crate::models::{Appointment, Doctor, MedicalRecord, Notification, User};
use crate::routes::doctors::DoctorProfileRequest;
use crate::services::user_service::Registration;
use crate::services::{
    appointment_service, auth_service, availability, booking_service, doctor_service,
    notification_service, record_service, token_service, user_service,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/getUserData", get(user_data).post(user_data))
        .route("/apply-doctor", post(apply_doctor))
        .route("/get-all-notification", post(mark_notifications_seen))
        .route("/delete-all-notification", post(delete_notifications))
        .route("/getAllDoctors", get(approved_doctors))
        .route("/book-appointment", post(book_appointment))
        .route("/booking-availability", post(booking_availability))
        .route("/user-appointments", get(user_appointments))
        .route("/user-medical-history/current", get(current_medical_history))
}

// --- POST /register ---

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, message = "roll number is required"))]
    pub roll_number: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    req.validate()?;
    auth_service::validate_password(&req.password)?;

    let password_hash = auth_service::hash_password(&req.password)?;
    let mut conn = db::connection(&state.db)?;

    let user = user_service::register(
        &mut conn,
        Registration {
            name: req.name.trim().to_string(),
            email: req.email,
            password_hash,
            roll_number: req.roll_number.trim().to_string(),
        },
    )?;

    tracing::info!(user_id = %user.id, claim_pending = user.claim_pending, "user registered");

    let message = if user.claim_pending {
        "registered, awaiting administrator confirmation"
    } else {
        "registered successfully"
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(user, message)),
    ))
}

// --- POST /login ---

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: AccessToken,
    pub user: User,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let mut conn = db::connection(&state.db)?;
    let user = user_service::authenticate(&mut conn, &req.email, &req.password)?;

    let token = token_service::create_access_token(
        user.id,
        user.role(),
        &state.config.jwt_secret,
        state.config.jwt_ttl,
    )?;

    tracing::info!(user_id = %user.id, role = %user.role(), "user logged in");

    Ok(Json(ApiResponse::ok_with_message(
        LoginResponse { token, user },
        "login successful",
    )))
}

// --- GET|POST /getUserData ---

/// A user with both notification lists.
#[derive(Debug, Serialize)]
pub struct UserData {
    #[serde(flatten)]
    pub user: User,
    pub notification: Vec<Notification>,
    pub seennotification: Vec<Notification>,
}

fn load_user_data(conn: &mut diesel::pg::PgConnection, user_id: Uuid) -> AppResult<UserData> {
    let user = user_service::find_by_id(conn, user_id)?;
    let notification = notification_service::unread(conn, user_id)?;
    let seennotification = notification_service::seen(conn, user_id)?;
    Ok(UserData { user, notification, seennotification })
}

pub async fn user_data(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UserData>>> {
    let mut conn = db::connection(&state.db)?;
    let data = load_user_data(&mut conn, user.id)?;
    Ok(Json(ApiResponse::ok(data)))
}

// --- POST /apply-doctor ---

pub async fn apply_doctor(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<DoctorProfileRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Doctor>>)> {
    let mut conn = db::connection(&state.db)?;
    let applicant = user_service::find_by_id(&mut conn, user.id)?;

    let application = req.into_application(applicant.email.as_deref())?;
    let doctor = doctor_service::apply(&mut conn, &applicant, application)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(doctor, "doctor account applied successfully")),
    ))
}

// --- POST /get-all-notification ---

pub async fn mark_notifications_seen(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UserData>>> {
    let mut conn = db::connection(&state.db)?;
    let moved = notification_service::mark_all_seen(&mut conn, user.id)?;
    tracing::debug!(user_id = %user.id, moved, "notifications marked as seen");

    let data = load_user_data(&mut conn, user.id)?;
    Ok(Json(ApiResponse::ok_with_message(data, "all notifications marked as read")))
}

// --- POST /delete-all-notification ---

pub async fn delete_notifications(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UserData>>> {
    let mut conn = db::connection(&state.db)?;
    notification_service::clear_all(&mut conn, user.id)?;

    let data = load_user_data(&mut conn, user.id)?;
    Ok(Json(ApiResponse::ok_with_message(data, "notifications deleted successfully")))
}

// --- GET /getAllDoctors ---

pub async fn approved_doctors(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Doctor>>>> {
    let mut conn = db::connection(&state.db)?;
    let doctors = doctor_service::approved(&mut conn)?;
    Ok(Json(ApiResponse::ok(doctors)))
}

// --- POST /book-appointment, /booking-availability ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRequest {
    pub doctor_id: Uuid,
    pub date: String,
    pub time: String,
}

pub async fn book_appointment(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SlotRequest>,
) -> AppResult<Json<ApiResponse<Appointment>>> {
    let date = formats::parse_date(&req.date)?;
    let time = formats::parse_time(&req.time)?;

    let mut conn = db::connection(&state.db)?;
    let appointment = booking_service::book_appointment(&mut conn, user.id, req.doctor_id, date, time)?;

    Ok(Json(ApiResponse::ok_with_message(appointment, "appointment booked successfully")))
}

pub async fn booking_availability(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SlotRequest>,
) -> AppResult<Json<ApiResponse<bool>>> {
    let date = formats::parse_date(&req.date)?;
    let time = formats::parse_time(&req.time)?;

    let mut conn = db::connection(&state.db)?;
    let doctor = doctor_service::find_bookable(&mut conn, req.doctor_id)?;
    let available = availability::is_available(&mut conn, &doctor, date, time)?;

    let message = if available {
        "appointment available"
    } else {
        "appointment not available at this time"
    };
    Ok(Json(ApiResponse::ok_with_message(available, message)))
}

// --- GET /user-appointments ---

pub async fn user_appointments(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Appointment>>>> {
    let mut conn = db::connection(&state.db)?;
    let appointments = appointment_service::for_patient(&mut conn, user.id)?;
    Ok(Json(ApiResponse::ok(appointments)))
}

// --- GET /user-medical-history/current ---

pub async fn current_medical_history(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<MedicalRecord>>>> {
    let mut conn = db::connection(&state.db)?;
    let records = record_service::history(&mut conn, user.id)?;
    Ok(Json(ApiResponse::ok(records)))
}
