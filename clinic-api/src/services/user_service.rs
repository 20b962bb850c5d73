use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use clinic_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{NewUser, User};
use crate::schema::users;
use crate::services::{auth_service, notification_service};

/// Registration input after validation; the password is already hashed.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub roll_number: String,
}

pub fn find_by_id(conn: &mut PgConnection, user_id: Uuid) -> AppResult<User> {
    users::table
        .find(user_id)
        .first::<User>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))
}

pub fn find_by_roll_number(conn: &mut PgConnection, roll_number: &str) -> AppResult<Option<User>> {
    Ok(users::table
        .filter(users::roll_number.eq(roll_number))
        .first::<User>(conn)
        .optional()?)
}

/// Like [`find_by_roll_number`] but a missing patient is an error.
pub fn patient_by_roll_number(conn: &mut PgConnection, roll_number: &str) -> AppResult<User> {
    find_by_roll_number(conn, roll_number)?
        .ok_or_else(|| AppError::new(ErrorCode::PatientNotFound, "patient not found"))
}

/// Creates an account. A roll number held by an auto-created placeholder
/// patient is claimed instead of rejected; the claim stays pending, and the
/// account cannot log in, until an admin confirms it with [`resolve_claim`].
pub fn register(conn: &mut PgConnection, reg: Registration) -> AppResult<User> {
    let email = reg.email.trim().to_lowercase();

    conn.transaction(|conn| {
        let email_taken: bool = users::table
            .filter(users::email.eq(&email))
            .count()
            .get_result::<i64>(conn)
            .map(|c| c > 0)?;

        if email_taken {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "user already exists"));
        }

        let user = match find_by_roll_number(conn, &reg.roll_number)? {
            Some(existing) if existing.is_placeholder() => {
                let claimed = diesel::update(users::table.find(existing.id))
                    .set((
                        users::name.eq(&reg.name),
                        users::email.eq(Some(email.clone())),
                        users::password_hash.eq(Some(reg.password_hash.clone())),
                        users::claim_pending.eq(true),
                        users::updated_at.eq(chrono::Utc::now()),
                    ))
                    .get_result::<User>(conn)
                    .map_err(unique_violation)?;

                let message = format!("{} claims the patient record of roll number {}", claimed.name, claimed.roll_number);
                for admin in admins(conn)? {
                    notification_service::push(
                        conn,
                        admin.id,
                        notification_service::PATIENT_CLAIM_REQUEST,
                        &message,
                        "/admin/users",
                    )?;
                }

                tracing::info!(user_id = %claimed.id, "placeholder patient claimed at registration");
                claimed
            }
            Some(_) => {
                return Err(AppError::new(ErrorCode::RollNumberTaken, "roll number already registered"));
            }
            None => diesel::insert_into(users::table)
                .values(&NewUser {
                    name: reg.name.clone(),
                    email: Some(email.clone()),
                    password_hash: Some(reg.password_hash.clone()),
                    roll_number: reg.roll_number.clone(),
                })
                .get_result::<User>(conn)
                .map_err(unique_violation)?,
        };

        Ok(user)
    })
}

/// Checks an email/password pair. Placeholder patients cannot log in.
pub fn authenticate(conn: &mut PgConnection, email: &str, password: &str) -> AppResult<User> {
    let invalid = || AppError::new(ErrorCode::InvalidCredentials, "invalid email or password");

    let user = users::table
        .filter(users::email.eq(email.trim().to_lowercase()))
        .first::<User>(conn)
        .optional()?
        .ok_or_else(invalid)?;

    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !auth_service::verify_password(password, hash)? {
        return Err(invalid());
    }

    if user.claim_pending {
        return Err(AppError::forbidden("account awaiting administrator confirmation"));
    }

    Ok(user)
}

/// Returns the patient holding `roll_number`, creating a minimal placeholder
/// user when none exists. The flag reports whether a user was created.
pub fn ensure_patient(conn: &mut PgConnection, roll_number: &str) -> AppResult<(User, bool)> {
    let roll_number = roll_number.trim();
    if roll_number.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "roll number is required"));
    }

    if let Some(existing) = find_by_roll_number(conn, roll_number)? {
        return Ok((existing, false));
    }

    let inserted = diesel::insert_into(users::table)
        .values(&NewUser {
            name: roll_number.to_string(),
            email: None,
            password_hash: None,
            roll_number: roll_number.to_string(),
        })
        .on_conflict(users::roll_number)
        .do_nothing()
        .get_result::<User>(conn)
        .optional()?;

    match inserted {
        Some(user) => {
            tracing::info!(user_id = %user.id, roll_number = %roll_number, "placeholder patient created");
            Ok((user, true))
        }
        // Lost a race with a concurrent insert of the same roll number.
        None => Ok((patient_by_roll_number(conn, roll_number)?, false)),
    }
}

/// Confirms or refuses a pending placeholder claim. A refused claim turns the
/// account back into a placeholder.
pub fn resolve_claim(conn: &mut PgConnection, user_id: Uuid, approve: bool) -> AppResult<User> {
    conn.transaction(|conn| {
        let user = find_by_id(conn, user_id)?;
        if !user.claim_pending {
            return Err(AppError::new(ErrorCode::BadRequest, "no pending claim for this account"));
        }

        let resolved = if approve {
            diesel::update(users::table.find(user.id))
                .set((
                    users::claim_pending.eq(false),
                    users::updated_at.eq(chrono::Utc::now()),
                ))
                .get_result::<User>(conn)?
        } else {
            diesel::update(users::table.find(user.id))
                .set((
                    users::name.eq(&user.roll_number),
                    users::email.eq(None::<String>),
                    users::password_hash.eq(None::<String>),
                    users::claim_pending.eq(false),
                    users::updated_at.eq(chrono::Utc::now()),
                ))
                .get_result::<User>(conn)?
        };

        if approve {
            notification_service::push(
                conn,
                resolved.id,
                notification_service::PATIENT_CLAIM_UPDATED,
                "Your account has been confirmed",
                "/notification",
            )?;
        }

        tracing::info!(user_id = %resolved.id, approve, "patient claim resolved");
        Ok(resolved)
    })
}

pub fn admins(conn: &mut PgConnection) -> AppResult<Vec<User>> {
    Ok(users::table
        .filter(users::is_admin.eq(true))
        .load::<User>(conn)?)
}

pub fn list(conn: &mut PgConnection, limit: i64, offset: i64) -> AppResult<(Vec<User>, i64)> {
    let total: i64 = users::table.count().get_result(conn)?;

    let items = users::table
        .order(users::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load::<User>(conn)?;

    Ok((items, total))
}

pub fn set_doctor_flag(conn: &mut PgConnection, user_id: Uuid, is_doctor: bool) -> AppResult<User> {
    Ok(diesel::update(users::table.find(user_id))
        .set((
            users::is_doctor.eq(is_doctor),
            users::updated_at.eq(chrono::Utc::now()),
        ))
        .get_result::<User>(conn)?)
}

fn unique_violation(err: DieselError) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            match info.constraint_name() {
                Some(c) if c.contains("roll_number") => {
                    AppError::new(ErrorCode::RollNumberTaken, "roll number already registered")
                }
                _ => AppError::new(ErrorCode::EmailAlreadyExists, "user already exists"),
            }
        }
        other => AppError::Database(other),
    }
}
