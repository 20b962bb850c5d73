//! Database-backed workflow tests.
//!
//! Each test runs inside a test transaction on a fresh schema and is rolled
//! back when the connection drops. Set `CLINIC_TEST_DATABASE_URL` to run them;
//! without it they return early.

use chrono::{NaiveDate, NaiveTime};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use clinic_api::models::{AppointmentStatus, Doctor, DoctorStatus, NewAppointment, Timings, User};
use clinic_api::schema::{appointments, users};
use clinic_api::services::doctor_service::{self, DoctorApplication};
use clinic_api::services::record_service::{self, PatientResolution, RecordFields};
use clinic_api::services::user_service::{self, Registration};
use clinic_api::services::{appointment_service, auth_service, availability, booking_service, notification_service};
use clinic_shared::errors::ErrorCode;
use clinic_shared::types::auth::{AuthUser, UserRole};

const MIGRATION: &str = include_str!("../migrations/2024-06-01-000000_create_clinic/up.sql");

// Tests never log in, so any PHC-looking string works as a stored hash.
const STORED_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNo";

fn test_conn() -> Option<PgConnection> {
    let url = std::env::var("CLINIC_TEST_DATABASE_URL").ok()?;
    let mut conn = PgConnection::establish(&url).expect("connect to test database");
    conn.begin_test_transaction().expect("begin test transaction");

    let schema = format!("clinic_test_{}", Uuid::new_v4().simple());
    conn.batch_execute(&format!(
        "CREATE SCHEMA {schema}; SET LOCAL search_path TO {schema}, public;"
    ))
    .expect("create test schema");
    conn.batch_execute(MIGRATION).expect("apply migration");

    Some(conn)
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn register(conn: &mut PgConnection, name: &str, roll_number: &str) -> User {
    user_service::register(
        conn,
        Registration {
            name: name.to_string(),
            email: format!("{}@clinic.test", roll_number.to_lowercase()),
            password_hash: STORED_HASH.to_string(),
            roll_number: roll_number.to_string(),
        },
    )
    .unwrap()
}

fn application(name: &str, email: &str) -> DoctorApplication {
    DoctorApplication {
        email: email.to_string(),
        name: name.to_string(),
        phone: "555-0100".to_string(),
        website: None,
        address: "1 Main St".to_string(),
        specialization: "General".to_string(),
        experience: "10 years".to_string(),
        fees_per_consultation: 500,
        timings: Timings::new(t(9, 0), t(17, 0)).unwrap(),
    }
}

/// An approved doctor working 09:00-17:00, plus the linked account.
fn approved_doctor(conn: &mut PgConnection, name: &str, roll_number: &str) -> (User, Doctor) {
    let user = register(conn, name, roll_number);
    let doctor = doctor_service::apply(conn, &user, application(name, &format!("{roll_number}@doctors.test"))).unwrap();
    let doctor = doctor_service::change_status(conn, doctor.id, DoctorStatus::Approved).unwrap();
    let user = user_service::find_by_id(conn, user.id).unwrap();
    (user, doctor)
}

fn caller(user: &User) -> AuthUser {
    AuthUser { id: user.id, role: user.role(), token_id: Uuid::new_v4() }
}

fn fields(diagnosis: &str) -> RecordFields {
    RecordFields {
        diagnosis: diagnosis.to_string(),
        ..Default::default()
    }
}

fn user_count(conn: &mut PgConnection) -> i64 {
    users::table.count().get_result(conn).unwrap()
}

#[test]
fn booking_scenario_with_taken_and_free_slots() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (dr_user, dr_a) = approved_doctor(conn, "Dr. A", "D-A");
    let first = register(conn, "First Patient", "P-1");
    let second = register(conn, "Second Patient", "P-2");

    booking_service::book_appointment(conn, first.id, dr_a.id, june_first(), t(10, 0)).unwrap();

    let err = booking_service::book_appointment(conn, second.id, dr_a.id, june_first(), t(10, 0)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SlotTaken);
    assert!(err.to_string().contains("not available"));

    let taken: i64 = appointments::table
        .filter(appointments::doctor_id.eq(dr_a.id))
        .filter(appointments::appointment_time.eq(t(10, 0)))
        .count()
        .get_result(conn)
        .unwrap();
    assert_eq!(taken, 1);

    let booked = booking_service::book_appointment(conn, second.id, dr_a.id, june_first(), t(11, 0)).unwrap();
    assert_eq!(booked.status().unwrap(), AppointmentStatus::Pending);
    assert_eq!(booked.user_id, second.id);

    let requests: Vec<_> = notification_service::unread(conn, dr_user.id)
        .unwrap()
        .into_iter()
        .filter(|n| n.notification_type == notification_service::NEW_APPOINTMENT_REQUEST)
        .collect();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].message, "A new appointment request from Second Patient");
    assert_eq!(requests[1].on_click_path, "/doctor/appointments");
}

#[test]
fn slot_taken_between_check_and_insert_is_refused() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (dr_user, dr_a) = approved_doctor(conn, "Dr. A", "D-A");
    let first = register(conn, "First Patient", "P-1");
    let second = register(conn, "Second Patient", "P-2");

    assert!(availability::is_available(conn, &dr_a, june_first(), t(10, 0)).unwrap());

    // A concurrent booking lands after the availability check.
    diesel::insert_into(appointments::table)
        .values(&NewAppointment {
            doctor_id: dr_a.id,
            user_id: first.id,
            appointment_date: june_first(),
            appointment_time: t(10, 0),
            status: AppointmentStatus::Pending.to_string(),
        })
        .execute(conn)
        .unwrap();

    let err = booking_service::reserve(conn, &dr_a, &second, june_first(), t(10, 0)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SlotTaken);

    let rows: i64 = appointments::table
        .filter(appointments::doctor_id.eq(dr_a.id))
        .count()
        .get_result(conn)
        .unwrap();
    assert_eq!(rows, 1);
    let requests = notification_service::unread(conn, dr_user.id)
        .unwrap()
        .into_iter()
        .filter(|n| n.notification_type == notification_service::NEW_APPOINTMENT_REQUEST)
        .count();
    assert_eq!(requests, 0);
}

#[test]
fn booking_times_are_kept_to_the_minute() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (_, dr_a) = approved_doctor(conn, "Dr. A", "D-A");
    let first = register(conn, "First Patient", "P-1");
    let second = register(conn, "Second Patient", "P-2");

    booking_service::book_appointment(conn, first.id, dr_a.id, june_first(), t(10, 0)).unwrap();

    let half_past = NaiveTime::from_hms_opt(10, 0, 30).unwrap();
    let err = booking_service::book_appointment(conn, second.id, dr_a.id, june_first(), half_past).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SlotTaken);

    let late = NaiveTime::from_hms_opt(10, 1, 45).unwrap();
    let booked = booking_service::book_appointment(conn, second.id, dr_a.id, june_first(), late).unwrap();
    assert_eq!(booked.appointment_time, t(10, 1));
}

#[test]
fn bookings_outside_hours_are_refused() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (_, dr_a) = approved_doctor(conn, "Dr. A", "D-A");
    let patient = register(conn, "Pat", "P-1");

    for time in [t(17, 0), t(8, 59), t(20, 0)] {
        let err = booking_service::book_appointment(conn, patient.id, dr_a.id, june_first(), time).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SlotTaken, "at {time}");
    }
    assert!(booking_service::book_appointment(conn, patient.id, dr_a.id, june_first(), t(9, 0)).is_ok());
    assert!(booking_service::book_appointment(conn, patient.id, dr_a.id, june_first(), t(16, 59)).is_ok());
}

#[test]
fn pending_doctors_cannot_be_booked() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let applicant = register(conn, "Dr. Pending", "D-P");
    let doctor = doctor_service::apply(conn, &applicant, application("Dr. Pending", "pending@doctors.test")).unwrap();
    let patient = register(conn, "Pat", "P-1");

    let err = booking_service::book_appointment(conn, patient.id, doctor.id, june_first(), t(10, 0)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DoctorNotFound);
}

#[test]
fn approving_an_appointment_notifies_the_patient() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (dr_user, dr_a) = approved_doctor(conn, "Dr. A", "D-A");
    let (other_dr_user, _) = approved_doctor(conn, "Dr. B", "D-B");
    let patient = register(conn, "Pat", "P-1");

    let appt = booking_service::book_appointment(conn, patient.id, dr_a.id, june_first(), t(10, 0)).unwrap();
    let before = notification_service::unread(conn, patient.id).unwrap().len();

    let err = appointment_service::update_status(conn, other_dr_user.id, appt.id, AppointmentStatus::Approved).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let updated = appointment_service::update_status(conn, dr_user.id, appt.id, AppointmentStatus::Approved).unwrap();
    assert_eq!(updated.status().unwrap(), AppointmentStatus::Approved);

    let after = notification_service::unread(conn, patient.id).unwrap();
    assert_eq!(after.len(), before + 1);
    let latest = after.last().unwrap();
    assert_eq!(latest.notification_type, notification_service::STATUS_UPDATED);
    assert!(latest.message.contains("approved"));

    let err = appointment_service::update_status(conn, dr_user.id, appt.id, AppointmentStatus::Rejected).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidStatusTransition);

    let err = appointment_service::update_status(conn, dr_user.id, Uuid::new_v4(), AppointmentStatus::Approved).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AppointmentNotFound);
}

#[test]
fn record_for_unknown_roll_number_creates_one_patient() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (dr_user, _) = approved_doctor(conn, "Dr. A", "D-A");
    let doctor = caller(&dr_user);
    let before = user_count(conn);

    let record = record_service::create(conn, &doctor, "R-NEW", fields("flu"), PatientResolution::CreateIfMissing).unwrap();
    assert_eq!(user_count(conn), before + 1);

    let patient = user_service::find_by_roll_number(conn, "R-NEW").unwrap().unwrap();
    assert!(patient.is_placeholder());
    assert_eq!(record.patient_id, patient.id);
    assert_eq!(record.doctor_id, dr_user.id);

    record_service::create(conn, &doctor, "R-NEW", fields("cold"), PatientResolution::CreateIfMissing).unwrap();
    assert_eq!(user_count(conn), before + 1);
}

#[test]
fn strict_creation_requires_an_existing_patient() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (dr_user, _) = approved_doctor(conn, "Dr. A", "D-A");
    let before = user_count(conn);

    let err = record_service::create(conn, &caller(&dr_user), "R-404", fields("flu"), PatientResolution::MustExist).unwrap_err();
    assert_eq!(err.code(), ErrorCode::PatientNotFound);
    assert_eq!(user_count(conn), before);
}

#[test]
fn patients_cannot_create_records() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let patient = register(conn, "Pat", "P-1");
    let before = user_count(conn);

    let err = record_service::create(conn, &caller(&patient), "R-NEW", fields("flu"), PatientResolution::CreateIfMissing).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotADoctor);
    assert_eq!(user_count(conn), before);
}

#[test]
fn registration_claims_a_placeholder_patient() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (placeholder, created) = user_service::ensure_patient(conn, "R-9").unwrap();
    assert!(created);

    let claimed = register(conn, "Nine", "R-9");
    assert_eq!(claimed.id, placeholder.id);
    assert_eq!(claimed.email.as_deref(), Some("r-9@clinic.test"));
    assert!(!claimed.is_placeholder());
    assert!(claimed.claim_pending);

    let err = user_service::register(
        conn,
        Registration {
            name: "Imposter".into(),
            email: "other@clinic.test".into(),
            password_hash: STORED_HASH.into(),
            roll_number: "R-9".into(),
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RollNumberTaken);

    let err = user_service::register(
        conn,
        Registration {
            name: "Dup".into(),
            email: "R-9@clinic.test".into(),
            password_hash: STORED_HASH.into(),
            roll_number: "R-10".into(),
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::EmailAlreadyExists);
}

#[test]
fn placeholder_claims_wait_for_an_admin() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let admin = register(conn, "Admin", "A-1");
    diesel::update(users::table.find(admin.id))
        .set(users::is_admin.eq(true))
        .execute(conn)
        .unwrap();
    user_service::ensure_patient(conn, "R-9").unwrap();
    user_service::ensure_patient(conn, "R-10").unwrap();

    let claim = |conn: &mut PgConnection, roll_number: &str, email: &str| {
        user_service::register(
            conn,
            Registration {
                name: "Claimant".into(),
                email: email.into(),
                password_hash: auth_service::hash_password("s3cretpass").unwrap(),
                roll_number: roll_number.into(),
            },
        )
        .unwrap()
    };

    let nine = claim(conn, "R-9", "nine@clinic.test");
    let inbox = notification_service::unread(conn, admin.id).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].notification_type, notification_service::PATIENT_CLAIM_REQUEST);

    let err = user_service::authenticate(conn, "nine@clinic.test", "s3cretpass").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let confirmed = user_service::resolve_claim(conn, nine.id, true).unwrap();
    assert!(!confirmed.claim_pending);
    assert_eq!(user_service::authenticate(conn, "nine@clinic.test", "s3cretpass").unwrap().id, nine.id);

    let err = user_service::resolve_claim(conn, nine.id, true).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadRequest);

    let ten = claim(conn, "R-10", "ten@clinic.test");
    let refused = user_service::resolve_claim(conn, ten.id, false).unwrap();
    assert!(refused.is_placeholder());
    assert!(refused.email.is_none());
    assert_eq!(refused.name, "R-10");
    let err = user_service::authenticate(conn, "ten@clinic.test", "s3cretpass").unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidCredentials);
}

#[test]
fn only_the_author_updates_a_record() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (author, _) = approved_doctor(conn, "Dr. A", "D-A");
    let (other, _) = approved_doctor(conn, "Dr. B", "D-B");
    let patient = register(conn, "Pat", "P-1");

    let mut first = fields("flu");
    first.follow_up_date = Some(june_first());
    let record = record_service::create(conn, &caller(&author), "P-1", first, PatientResolution::MustExist).unwrap();

    let err = record_service::update(conn, &caller(&other), record.id, fields("cold")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotRecordOwner);
    let err = record_service::update(conn, &caller(&patient), record.id, fields("cold")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotRecordOwner);

    let updated = record_service::update(conn, &caller(&author), record.id, fields("cold")).unwrap();
    assert_eq!(updated.diagnosis, "cold");
    assert!(updated.follow_up_date.is_none());

    // Any doctor and the patient may read; a stranger may not.
    assert!(record_service::get(conn, &caller(&other), record.id).is_ok());
    assert!(record_service::get(conn, &caller(&patient), record.id).is_ok());
    let stranger = register(conn, "Stranger", "P-2");
    let err = record_service::get(conn, &caller(&stranger), record.id).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let err = record_service::get(conn, &caller(&author), Uuid::new_v4()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::RecordNotFound);
}

#[test]
fn upsert_overwrites_the_current_record() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (author, _) = approved_doctor(conn, "Dr. A", "D-A");
    let (other, _) = approved_doctor(conn, "Dr. B", "D-B");
    let patient = register(conn, "Pat", "P-1");

    let created = record_service::upsert_current(conn, &caller(&author), "P-1", fields("flu")).unwrap();
    let replaced = record_service::upsert_current(conn, &caller(&author), "P-1", fields("cold")).unwrap();
    assert_eq!(created.id, replaced.id);
    assert_eq!(replaced.diagnosis, "cold");

    let err = record_service::upsert_current(conn, &caller(&other), "P-1", fields("fever")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotRecordOwner);

    let history = record_service::history(conn, patient.id).unwrap();
    assert_eq!(history.len(), 1);

    let err = record_service::upsert_current(conn, &caller(&author), "P-404", fields("flu")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::PatientNotFound);
}

#[test]
fn prescription_image_comes_from_the_newest_record() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (author, _) = approved_doctor(conn, "Dr. A", "D-A");
    let patient = register(conn, "Pat", "P-1");
    let doctor = caller(&author);

    record_service::create(conn, &doctor, "P-1", fields("flu"), PatientResolution::MustExist).unwrap();
    let err = record_service::prescription_image(conn, &caller(&patient), "P-1").unwrap_err();
    assert_eq!(err.code(), ErrorCode::PrescriptionImageNotFound);

    let mut with_image = fields("cold");
    with_image.prescription_image = "https://img.clinic.test/rx.png".into();
    record_service::create(conn, &doctor, "P-1", with_image, PatientResolution::MustExist).unwrap();

    let image = record_service::prescription_image(conn, &caller(&patient), "P-1").unwrap();
    assert_eq!(image, "https://img.clinic.test/rx.png");

    let history = record_service::history(conn, patient.id).unwrap();
    assert_eq!(history[0].diagnosis, "cold");
}

#[test]
fn doctor_applications_and_admin_decisions() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let admin = register(conn, "Admin", "A-1");
    diesel::update(users::table.find(admin.id))
        .set(users::is_admin.eq(true))
        .execute(conn)
        .unwrap();

    let applicant = register(conn, "Dr. C", "D-C");
    let doctor = doctor_service::apply(conn, &applicant, application("Dr. C", "c@doctors.test")).unwrap();
    assert!(!doctor.is_approved());

    let admin_inbox = notification_service::unread(conn, admin.id).unwrap();
    assert_eq!(admin_inbox.len(), 1);
    assert_eq!(admin_inbox[0].notification_type, notification_service::APPLY_DOCTOR_REQUEST);

    let err = doctor_service::apply(conn, &applicant, application("Dr. C", "c2@doctors.test")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DoctorApplicationExists);

    doctor_service::change_status(conn, doctor.id, DoctorStatus::Approved).unwrap();
    let promoted = user_service::find_by_id(conn, applicant.id).unwrap();
    assert_eq!(promoted.role(), UserRole::Doctor);

    let inbox = notification_service::unread(conn, applicant.id).unwrap();
    assert_eq!(inbox.last().unwrap().notification_type, notification_service::DOCTOR_ACCOUNT_UPDATED);

    doctor_service::change_status(conn, doctor.id, DoctorStatus::Rejected).unwrap();
    let demoted = user_service::find_by_id(conn, applicant.id).unwrap();
    assert_eq!(demoted.role(), UserRole::Patient);
    assert!(doctor_service::approved(conn).unwrap().is_empty());
}

#[test]
fn rejected_doctor_loses_doctor_access_before_token_expiry() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (author, _) = approved_doctor(conn, "Dr. A", "D-A");
    let (revoked_user, revoked) = approved_doctor(conn, "Dr. B", "D-B");
    let patient = register(conn, "Pat", "P-1");

    let record = record_service::create(conn, &caller(&author), "P-1", fields("flu"), PatientResolution::MustExist).unwrap();
    let appt = booking_service::book_appointment(conn, patient.id, revoked.id, june_first(), t(10, 0)).unwrap();

    // Still carries the doctor role it logged in with.
    let stale = caller(&revoked_user);
    assert_eq!(stale.role, UserRole::Doctor);
    doctor_service::change_status(conn, revoked.id, DoctorStatus::Rejected).unwrap();

    let err = record_service::get(conn, &stale, record.id).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
    let err = record_service::history_by_roll_number(conn, &stale, "P-1").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let before = user_count(conn);
    let err = record_service::create(conn, &stale, "R-NEW", fields("flu"), PatientResolution::CreateIfMissing).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotADoctor);
    assert_eq!(user_count(conn), before);

    let err = appointment_service::update_status(conn, revoked_user.id, appt.id, AppointmentStatus::Approved).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotADoctor);
}

#[test]
fn admin_who_is_a_doctor_keeps_doctor_record_access() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let (author, _) = approved_doctor(conn, "Dr. A", "D-A");
    let (dual, _) = approved_doctor(conn, "Dr. Admin", "D-X");
    register(conn, "Pat", "P-1");
    diesel::update(users::table.find(dual.id))
        .set(users::is_admin.eq(true))
        .execute(conn)
        .unwrap();
    let dual = user_service::find_by_id(conn, dual.id).unwrap();
    assert_eq!(dual.role(), UserRole::Admin);

    let record = record_service::create(conn, &caller(&author), "P-1", fields("flu"), PatientResolution::MustExist).unwrap();

    assert!(record_service::get(conn, &caller(&dual), record.id).is_ok());
    assert!(record_service::create(conn, &caller(&dual), "P-1", fields("cold"), PatientResolution::MustExist).is_ok());
}

#[test]
fn notifications_move_to_seen_then_clear() {
    let Some(mut conn) = test_conn() else { return };
    let conn = &mut conn;

    let user = register(conn, "Pat", "P-1");
    notification_service::push(conn, user.id, notification_service::STATUS_UPDATED, "one", "/appointments").unwrap();
    notification_service::push(conn, user.id, notification_service::STATUS_UPDATED, "two", "/appointments").unwrap();

    assert_eq!(notification_service::mark_all_seen(conn, user.id).unwrap(), 2);
    assert!(notification_service::unread(conn, user.id).unwrap().is_empty());
    assert_eq!(notification_service::seen(conn, user.id).unwrap().len(), 2);

    notification_service::clear_all(conn, user.id).unwrap();
    assert!(notification_service::seen(conn, user.id).unwrap().is_empty());
}
