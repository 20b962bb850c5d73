pub mod admin;
pub mod doctors;
pub mod health;
pub mod medical_records;
pub mod users;
