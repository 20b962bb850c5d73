use chrono::{NaiveDate, NaiveTime};
use diesel::pg::PgConnection;
use diesel::prelude::*;

use clinic_shared::errors::AppResult;

use crate::formats;
use crate::models::{Doctor, Timings};
use crate::schema::appointments;

/// A slot is free when `time` falls inside the consultation hours and no
/// existing appointment sits in the same minute. Appointments have no
/// duration; each booked minute blocks only itself.
pub fn slot_is_free(timings: &Timings, booked: &[NaiveTime], time: NaiveTime) -> bool {
    let time = formats::to_minute(time);
    timings.contains(time) && !booked.iter().any(|b| formats::to_minute(*b) == time)
}

/// Times already booked with `doctor` on `date`, whatever their status.
pub fn booked_times(conn: &mut PgConnection, doctor: &Doctor, date: NaiveDate) -> AppResult<Vec<NaiveTime>> {
    Ok(appointments::table
        .filter(appointments::doctor_id.eq(doctor.id))
        .filter(appointments::appointment_date.eq(date))
        .select(appointments::appointment_time)
        .load::<NaiveTime>(conn)?)
}

pub fn is_available(conn: &mut PgConnection, doctor: &Doctor, date: NaiveDate, time: NaiveTime) -> AppResult<bool> {
    let time = formats::to_minute(time);
    let timings = doctor.timings();
    if !timings.contains(time) {
        return Ok(false);
    }

    let booked = booked_times(conn, doctor, date)?;
    let free = slot_is_free(&timings, &booked, time);

    tracing::debug!(doctor_id = %doctor.id, %date, %time, free, "availability checked");
    Ok(free)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn office_hours() -> Timings {
        Timings::new(t(9, 0), t(17, 0)).unwrap()
    }

    #[test]
    fn free_inside_hours_with_nothing_booked() {
        assert!(slot_is_free(&office_hours(), &[], t(11, 0)));
        assert!(slot_is_free(&office_hours(), &[], t(9, 0)));
    }

    #[test]
    fn closing_time_is_outside_hours() {
        assert!(!slot_is_free(&office_hours(), &[], t(17, 0)));
        assert!(!slot_is_free(&office_hours(), &[], t(8, 30)));
        assert!(!slot_is_free(&office_hours(), &[], t(23, 0)));
    }

    #[test]
    fn exact_booked_time_is_taken() {
        let booked = [t(10, 0)];
        assert!(!slot_is_free(&office_hours(), &booked, t(10, 0)));
        assert!(slot_is_free(&office_hours(), &booked, t(11, 0)));
        // No durations: a minute later is a different bucket.
        assert!(slot_is_free(&office_hours(), &booked, t(10, 1)));
    }

    #[test]
    fn seconds_share_their_minute() {
        let half_past = NaiveTime::from_hms_opt(10, 0, 30).unwrap();
        assert!(!slot_is_free(&office_hours(), &[t(10, 0)], half_past));
        assert!(!slot_is_free(&office_hours(), &[half_past], t(10, 0)));
        assert!(slot_is_free(&office_hours(), &[half_past], t(10, 1)));
    }

    #[test]
    fn every_minute_in_hours_is_free_when_unbooked() {
        let hours = office_hours();
        for minute in 0..(24 * 60) {
            let time = t(minute / 60, minute % 60);
            let expected = time >= t(9, 0) && time < t(17, 0);
            assert_eq!(slot_is_free(&hours, &[], time), expected, "at {time}");
        }
    }
}
