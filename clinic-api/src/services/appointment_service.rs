use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use clinic_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Appointment, AppointmentStatus};
use crate::schema::appointments;
use crate::services::{doctor_service, notification_service};

pub fn find(conn: &mut PgConnection, appointment_id: Uuid) -> AppResult<Appointment> {
    appointments::table
        .find(appointment_id)
        .first::<Appointment>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::AppointmentNotFound, "appointment not found"))
}

pub fn for_patient(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<Appointment>> {
    Ok(appointments::table
        .filter(appointments::user_id.eq(user_id))
        .order((appointments::appointment_date.desc(), appointments::appointment_time.desc()))
        .load::<Appointment>(conn)?)
}

pub fn for_doctor(conn: &mut PgConnection, doctor_id: Uuid) -> AppResult<Vec<Appointment>> {
    Ok(appointments::table
        .filter(appointments::doctor_id.eq(doctor_id))
        .order((appointments::appointment_date.asc(), appointments::appointment_time.asc()))
        .load::<Appointment>(conn)?)
}

/// Checks a requested status change without touching storage.
pub fn check_transition(current: AppointmentStatus, next: AppointmentStatus) -> AppResult<()> {
    if current.can_transition_to(next) {
        return Ok(());
    }
    Err(AppError::new(
        ErrorCode::InvalidStatusTransition,
        format!("cannot move an appointment from {current} to {next}"),
    ))
}

/// Moves an appointment of the calling doctor to `next` and tells the
/// patient. The write only applies if the status is still the one that was
/// read, so of two racing updates only the first wins.
pub fn update_status(
    conn: &mut PgConnection,
    doctor_user_id: Uuid,
    appointment_id: Uuid,
    next: AppointmentStatus,
) -> AppResult<Appointment> {
    conn.transaction(|conn| {
        let appointment = find(conn, appointment_id)?;
        let doctor = doctor_service::own_profile(conn, doctor_user_id)?;

        if appointment.doctor_id != doctor.id {
            return Err(AppError::forbidden("appointment belongs to another doctor"));
        }

        let current = appointment.status()?;
        check_transition(current, next)?;

        let updated = diesel::update(
            appointments::table
                .find(appointment.id)
                .filter(appointments::status.eq(current.to_string())),
        )
        .set(appointments::status.eq(next.to_string()))
        .get_result::<Appointment>(conn)
        .optional()?
        .ok_or_else(|| {
            AppError::new(
                ErrorCode::InvalidStatusTransition,
                "appointment status changed concurrently",
            )
        })?;

        notification_service::push(
            conn,
            updated.user_id,
            notification_service::STATUS_UPDATED,
            &format!("Your appointment has been updated {next}"),
            "/appointments",
        )?;

        tracing::info!(
            appointment_id = %updated.id,
            from = %current,
            to = %next,
            "appointment status updated"
        );

        Ok(updated)
    })
}
