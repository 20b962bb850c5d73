use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use clinic_shared::clients::db;
use clinic_shared::errors::{AppError, AppResult, ErrorCode};
use clinic_shared::middleware::AdminUser;
use clinic_shared::types::{ApiResponse, Paginated, PaginationParams};

use crate::models::{Doctor, DoctorStatus, User};
use crate::services::{doctor_service, user_service};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/getAllUsers", get(all_users))
        .route("/getAllDoctors", get(all_doctors))
        .route("/changeAccountStatus", post(change_account_status))
        .route("/resolvePatientClaim", post(resolve_patient_claim))
}

// --- GET /getAllUsers ---

pub async fn all_users(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<User>>>> {
    let mut conn = db::connection(&state.db)?;
    let (users, total) = user_service::list(&mut conn, params.limit() as i64, params.offset() as i64)?;
    Ok(Json(ApiResponse::ok(Paginated::new(users, total as u64, &params))))
}

// --- GET /getAllDoctors ---

pub async fn all_doctors(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Doctor>>>> {
    let mut conn = db::connection(&state.db)?;
    let (doctors, total) = doctor_service::list(&mut conn, params.limit() as i64, params.offset() as i64)?;
    Ok(Json(ApiResponse::ok(Paginated::new(doctors, total as u64, &params))))
}

// --- POST /changeAccountStatus ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub doctor_id: Uuid,
    pub status: String,
}

pub async fn change_account_status(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangeStatusRequest>,
) -> AppResult<Json<ApiResponse<Doctor>>> {
    let status: DoctorStatus = req
        .status
        .parse()
        .map_err(|e: String| AppError::new(ErrorCode::ValidationError, e))?;

    let mut conn = db::connection(&state.db)?;
    let doctor = doctor_service::change_status(&mut conn, req.doctor_id, status)?;

    tracing::info!(admin_id = %admin.id, doctor_id = %doctor.id, status = %status, "account status changed");

    Ok(Json(ApiResponse::ok_with_message(doctor, "account status updated")))
}

// --- POST /resolvePatientClaim ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveClaimRequest {
    pub user_id: Uuid,
    pub approve: bool,
}

pub async fn resolve_patient_claim(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveClaimRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let mut conn = db::connection(&state.db)?;
    let user = user_service::resolve_claim(&mut conn, req.user_id, req.approve)?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, approve = req.approve, "patient claim resolved by admin");

    let message = if req.approve { "claim confirmed" } else { "claim refused" };
    Ok(Json(ApiResponse::ok_with_message(user, message)))
}
