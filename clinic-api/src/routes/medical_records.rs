use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use uuid::Uuid;

use clinic_shared::clients::db;
use clinic_shared::errors::AppResult;
use clinic_shared::types::auth::AuthUser;
use clinic_shared::types::ApiResponse;

use crate::models::MedicalRecord;
use crate::routes::doctors::CreateRecordRequest;
use crate::services::record_service::{self, PatientResolution, RecordFields};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/:userId", get(records_of_patient))
        .route("/create", post(create_record))
        .route("/:recordId", get(get_record).put(update_record))
}

pub async fn records_of_patient(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<MedicalRecord>>>> {
    let mut conn = db::connection(&state.db)?;
    let records = record_service::list_for_patient(&mut conn, &user, patient_id)?;
    Ok(Json(ApiResponse::ok(records)))
}

/// Unknown roll numbers get a placeholder patient.
pub async fn create_record(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRecordRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<MedicalRecord>>)> {
    let mut conn = db::connection(&state.db)?;
    let record = record_service::create(
        &mut conn,
        &user,
        &req.roll_number,
        req.fields,
        PatientResolution::CreateIfMissing,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(record, "medical record created successfully")),
    ))
}

pub async fn get_record(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MedicalRecord>>> {
    let mut conn = db::connection(&state.db)?;
    let record = record_service::get(&mut conn, &user, record_id)?;
    Ok(Json(ApiResponse::ok(record)))
}

pub async fn update_record(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<Uuid>,
    Json(fields): Json<RecordFields>,
) -> AppResult<Json<ApiResponse<MedicalRecord>>> {
    let mut conn = db::connection(&state.db)?;
    let record = record_service::update(&mut conn, &user, record_id, fields)?;
    Ok(Json(ApiResponse::ok_with_message(record, "medical record updated successfully")))
}
