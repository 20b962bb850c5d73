use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use clinic_shared::errors::AppResult;

use crate::models::{NewNotification, Notification};
use crate::schema::notifications;

pub const NEW_APPOINTMENT_REQUEST: &str = "new-appointment-request";
pub const STATUS_UPDATED: &str = "status-updated";
pub const APPLY_DOCTOR_REQUEST: &str = "apply-doctor-request";
pub const DOCTOR_ACCOUNT_UPDATED: &str = "doctor-account-request-updated";
pub const PATIENT_CLAIM_REQUEST: &str = "patient-claim-request";
pub const PATIENT_CLAIM_UPDATED: &str = "patient-claim-updated";

/// Append an unread notification to a user's list.
pub fn push(
    conn: &mut PgConnection,
    user_id: Uuid,
    notification_type: &str,
    message: &str,
    on_click_path: &str,
) -> AppResult<Notification> {
    let new_notification = NewNotification {
        user_id,
        notification_type: notification_type.to_string(),
        message: message.to_string(),
        on_click_path: on_click_path.to_string(),
    };

    let notification = diesel::insert_into(notifications::table)
        .values(&new_notification)
        .get_result::<Notification>(conn)?;

    tracing::debug!(
        notification_id = %notification.id,
        user_id = %user_id,
        notification_type = %notification_type,
        "notification pushed"
    );

    Ok(notification)
}

/// Unread list, oldest first.
pub fn unread(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<Notification>> {
    Ok(notifications::table
        .filter(notifications::user_id.eq(user_id))
        .filter(notifications::seen.eq(false))
        .order(notifications::created_at.asc())
        .load::<Notification>(conn)?)
}

/// Seen list, oldest first.
pub fn seen(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<Notification>> {
    Ok(notifications::table
        .filter(notifications::user_id.eq(user_id))
        .filter(notifications::seen.eq(true))
        .order(notifications::created_at.asc())
        .load::<Notification>(conn)?)
}

/// Move every unread notification to the seen list.
pub fn mark_all_seen(conn: &mut PgConnection, user_id: Uuid) -> AppResult<usize> {
    let updated = diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::seen.eq(false)),
    )
    .set(notifications::seen.eq(true))
    .execute(conn)?;

    Ok(updated)
}

/// Empty both lists.
pub fn clear_all(conn: &mut PgConnection, user_id: Uuid) -> AppResult<usize> {
    let deleted = diesel::delete(notifications::table.filter(notifications::user_id.eq(user_id)))
        .execute(conn)?;

    Ok(deleted)
}
