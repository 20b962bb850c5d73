use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use clinic_shared::errors::AppError;
use clinic_shared::types::auth::{AccessToken, Claims, UserRole};

pub fn create_access_token(
    user_id: Uuid,
    role: UserRole,
    secret: &str,
    ttl_secs: i64,
) -> Result<AccessToken, AppError> {
    let claims = Claims::new(user_id, role, ttl_secs);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))?;

    Ok(AccessToken::new(token, ttl_secs))
}
