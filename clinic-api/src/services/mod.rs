pub mod appointment_service;
pub mod auth_service;
pub mod availability;
pub mod booking_service;
pub mod doctor_service;
pub mod notification_service;
pub mod record_policy;
pub mod record_service;
pub mod token_service;
pub mod user_service;
