use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use clinic_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Doctor, DoctorChanges, DoctorStatus, NewDoctor, Timings, User};
use crate::schema::doctors;
use crate::services::{notification_service, user_service};

/// Profile fields submitted when applying for a doctor account.
#[derive(Debug, Clone)]
pub struct DoctorApplication {
    pub email: String,
    pub name: String,
    pub phone: String,
    pub website: Option<String>,
    pub address: String,
    pub specialization: String,
    pub experience: String,
    pub fees_per_consultation: i32,
    pub timings: Timings,
}

/// Partial profile update; absent fields are left untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub specialization: Option<String>,
    pub experience: Option<String>,
    pub fees_per_consultation: Option<i32>,
    pub timings: Option<Timings>,
}

pub fn find_by_id(conn: &mut PgConnection, doctor_id: Uuid) -> AppResult<Doctor> {
    doctors::table
        .find(doctor_id)
        .first::<Doctor>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::DoctorNotFound, "doctor not found"))
}

pub fn find_by_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Option<Doctor>> {
    Ok(doctors::table
        .filter(doctors::user_id.eq(user_id))
        .first::<Doctor>(conn)
        .optional()?)
}

/// The doctor profile belonging to the calling user.
/// The caller's doctor profile. Tokens outlive approvals, so a profile
/// rejected since login is `NotADoctor`.
pub fn own_profile(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Doctor> {
    let doctor = find_by_user(conn, user_id)?
        .ok_or_else(|| AppError::new(ErrorCode::DoctorNotFound, "no doctor profile for this account"))?;
    if !doctor.is_approved() {
        return Err(AppError::new(ErrorCode::NotADoctor, "doctor account is not approved"));
    }
    Ok(doctor)
}

/// Only approved doctors are bookable.
pub fn find_bookable(conn: &mut PgConnection, doctor_id: Uuid) -> AppResult<Doctor> {
    let doctor = find_by_id(conn, doctor_id)?;
    if !doctor.is_approved() {
        return Err(AppError::new(ErrorCode::DoctorNotFound, "doctor not found"));
    }
    Ok(doctor)
}

pub fn approved(conn: &mut PgConnection) -> AppResult<Vec<Doctor>> {
    Ok(doctors::table
        .filter(doctors::status.eq(DoctorStatus::Approved.to_string()))
        .order(doctors::name.asc())
        .load::<Doctor>(conn)?)
}

pub fn list(conn: &mut PgConnection, limit: i64, offset: i64) -> AppResult<(Vec<Doctor>, i64)> {
    let total: i64 = doctors::table.count().get_result(conn)?;

    let items = doctors::table
        .order(doctors::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load::<Doctor>(conn)?;

    Ok((items, total))
}

/// Files a pending doctor profile for `applicant` and tells every admin.
pub fn apply(conn: &mut PgConnection, applicant: &User, app: DoctorApplication) -> AppResult<Doctor> {
    conn.transaction(|conn| {
        if find_by_user(conn, applicant.id)?.is_some() {
            return Err(AppError::new(
                ErrorCode::DoctorApplicationExists,
                "a doctor profile already exists for this account",
            ));
        }

        let doctor = diesel::insert_into(doctors::table)
            .values(&NewDoctor {
                user_id: applicant.id,
                email: app.email.trim().to_lowercase(),
                name: app.name.clone(),
                phone: app.phone.clone(),
                website: app.website.clone(),
                address: app.address.clone(),
                specialization: app.specialization.clone(),
                experience: app.experience.clone(),
                fees_per_consultation: app.fees_per_consultation,
                timing_start: app.timings.start,
                timing_end: app.timings.end,
            })
            .get_result::<Doctor>(conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => AppError::new(
                    ErrorCode::DoctorApplicationExists,
                    "a doctor with this email already exists",
                ),
                other => AppError::Database(other),
            })?;

        let message = format!("{} has applied for a doctor account", doctor.name);
        for admin in user_service::admins(conn)? {
            notification_service::push(
                conn,
                admin.id,
                notification_service::APPLY_DOCTOR_REQUEST,
                &message,
                "/admin/doctors",
            )?;
        }

        tracing::info!(doctor_id = %doctor.id, user_id = %applicant.id, "doctor application filed");
        Ok(doctor)
    })
}

pub fn update_profile(conn: &mut PgConnection, user_id: Uuid, update: ProfileUpdate) -> AppResult<Doctor> {
    let doctor = own_profile(conn, user_id)?;

    let changes = DoctorChanges {
        name: update.name,
        phone: update.phone,
        website: update.website,
        address: update.address,
        specialization: update.specialization,
        experience: update.experience,
        fees_per_consultation: update.fees_per_consultation,
        timing_start: update.timings.map(|t| t.start),
        timing_end: update.timings.map(|t| t.end),
    };

    let updated = diesel::update(doctors::table.find(doctor.id))
        .set((&changes, doctors::updated_at.eq(chrono::Utc::now())))
        .get_result::<Doctor>(conn)?;

    tracing::info!(doctor_id = %updated.id, "doctor profile updated");
    Ok(updated)
}

/// Admin decision on a doctor account. Approval grants the linked user the
/// doctor flag, anything else revokes it; the user is notified either way.
pub fn change_status(conn: &mut PgConnection, doctor_id: Uuid, status: DoctorStatus) -> AppResult<Doctor> {
    conn.transaction(|conn| {
        let doctor = find_by_id(conn, doctor_id)?;

        let updated = diesel::update(doctors::table.find(doctor.id))
            .set((
                doctors::status.eq(status.to_string()),
                doctors::updated_at.eq(chrono::Utc::now()),
            ))
            .get_result::<Doctor>(conn)?;

        user_service::set_doctor_flag(conn, updated.user_id, status == DoctorStatus::Approved)?;

        notification_service::push(
            conn,
            updated.user_id,
            notification_service::DOCTOR_ACCOUNT_UPDATED,
            &format!("Your doctor account request has been {status}"),
            "/notification",
        )?;

        tracing::info!(doctor_id = %updated.id, status = %status, "doctor account status changed");
        Ok(updated)
    })
}
