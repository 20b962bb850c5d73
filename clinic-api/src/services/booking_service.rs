use chrono::{NaiveDate, NaiveTime};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use clinic_shared::errors::{AppError, AppResult, ErrorCode};

use crate::formats;
use crate::models::{Appointment, AppointmentStatus, Doctor, NewAppointment, User};
use crate::schema::appointments;
use crate::services::{availability, doctor_service, notification_service, user_service};

fn slot_taken() -> AppError {
    AppError::new(ErrorCode::SlotTaken, "appointment not available at this time")
}

/// Reserves `(doctor, date, time)` for `patient_id` and tells the doctor.
///
/// The reservation is a conditional insert against the unique slot index, so
/// of two concurrent bookings for the same slot exactly one succeeds and the
/// other gets `SlotTaken`.
pub fn book_appointment(
    conn: &mut PgConnection,
    patient_id: Uuid,
    doctor_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
) -> AppResult<Appointment> {
    let doctor = doctor_service::find_bookable(conn, doctor_id)?;
    let patient = user_service::find_by_id(conn, patient_id)?;
    let time = formats::to_minute(time);

    if !availability::is_available(conn, &doctor, date, time)? {
        return Err(slot_taken());
    }

    reserve(conn, &doctor, &patient, date, time)
}

/// Inserts the appointment and the doctor's notification, or fails with
/// `SlotTaken` when another booking got the slot since it was checked.
pub fn reserve(
    conn: &mut PgConnection,
    doctor: &Doctor,
    patient: &User,
    date: NaiveDate,
    time: NaiveTime,
) -> AppResult<Appointment> {
    let time = formats::to_minute(time);

    conn.transaction(|conn| {
        let appointment = diesel::insert_into(appointments::table)
            .values(&NewAppointment {
                doctor_id: doctor.id,
                user_id: patient.id,
                appointment_date: date,
                appointment_time: time,
                status: AppointmentStatus::Pending.to_string(),
            })
            .on_conflict((
                appointments::doctor_id,
                appointments::appointment_date,
                appointments::appointment_time,
            ))
            .do_nothing()
            .get_result::<Appointment>(conn)
            .optional()?
            .ok_or_else(slot_taken)?;

        notification_service::push(
            conn,
            doctor.user_id,
            notification_service::NEW_APPOINTMENT_REQUEST,
            &format!("A new appointment request from {}", patient.name),
            "/doctor/appointments",
        )?;

        tracing::info!(
            appointment_id = %appointment.id,
            doctor_id = %doctor.id,
            patient_id = %patient.id,
            %date,
            %time,
            "appointment booked"
        );

        Ok(appointment)
    })
}
