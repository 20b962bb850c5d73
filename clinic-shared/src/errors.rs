use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth and identity errors
/// - E2xxx: Doctor errors
/// - E3xxx: Appointment errors
/// - E4xxx: Medical record errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,

    // Auth (E1xxx)
    InvalidCredentials,
    EmailAlreadyExists,
    RollNumberTaken,
    TokenExpired,
    TokenInvalid,
    PasswordTooWeak,
    UserNotFound,

    // Doctor (E2xxx)
    DoctorNotFound,
    DoctorApplicationExists,
    InvalidTimings,
    NotADoctor,

    // Appointment (E3xxx)
    AppointmentNotFound,
    SlotTaken,
    InvalidStatusTransition,

    // Medical records (E4xxx)
    RecordNotFound,
    PatientNotFound,
    NotRecordOwner,
    PrescriptionImageNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0006",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::RollNumberTaken => "E1003",
            Self::TokenExpired => "E1004",
            Self::TokenInvalid => "E1005",
            Self::PasswordTooWeak => "E1006",
            Self::UserNotFound => "E1007",

            // Doctor
            Self::DoctorNotFound => "E2001",
            Self::DoctorApplicationExists => "E2002",
            Self::InvalidTimings => "E2003",
            Self::NotADoctor => "E2004",

            // Appointment
            Self::AppointmentNotFound => "E3001",
            Self::SlotTaken => "E3002",
            Self::InvalidStatusTransition => "E3003",

            // Medical records
            Self::RecordNotFound => "E4001",
            Self::PatientNotFound => "E4002",
            Self::NotRecordOwner => "E4003",
            Self::PrescriptionImageNotFound => "E4004",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::PasswordTooWeak
            | Self::InvalidTimings | Self::SlotTaken
            | Self::InvalidStatusTransition => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::UserNotFound | Self::DoctorNotFound
            | Self::AppointmentNotFound | Self::RecordNotFound | Self::PatientNotFound
            | Self::PrescriptionImageNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotADoctor | Self::NotRecordOwner => StatusCode::FORBIDDEN,
            Self::EmailAlreadyExists | Self::RollNumberTaken
            | Self::DoctorApplicationExists => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error code this error is reported with.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Database(_) => ErrorCode::InternalError,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Field-level messages go out as `details`.
        AppError::Known {
            code: ErrorCode::ValidationError,
            message: errors.to_string(),
            details: serde_json::to_value(&errors).ok(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                if *code == ErrorCode::InternalError {
                    tracing::error!(error = %message, "internal server error");
                    (status, ApiErrorResponse::new(code.code(), "internal server error"))
                } else {
                    let mut resp = ApiErrorResponse::new(code.code(), message);
                    if let Some(d) = details {
                        resp = resp.with_details(d.clone());
                    }
                    (status, resp)
                }
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
