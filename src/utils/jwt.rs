use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};

/// Caller identity handed to every service call.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn for_user(user: &user::Model, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn is(&self, role: UserRole) -> bool {
        self.role == role
    }
}

/// Sign an HS256 session token for `user`, valid for `expiration_hours`.
pub fn create_token(user: &user::Model, secret: &str, expiration_hours: i64) -> AppResult<String> {
    if expiration_hours < 1 {
        return Err(AppError::Internal(
            "Token lifetime must be at least one hour".to_string(),
        ));
    }

    let claims = Claims::for_user(user, Duration::hours(expiration_hours));
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign session token: {}", e)))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid session token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(role: UserRole) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: "driver@example.com".to_string(),
            password_hash: String::new(),
            name: "Driver".to_string(),
            phone_number: None,
            role,
            created_at: Utc::now().fixed_offset(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_token_round_trip_keeps_role() {
        let user = account(UserRole::Driver);
        let token = create_token(&user, "secret", 1).unwrap();

        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, user.id);
        assert!(claims.is(UserRole::Driver));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = create_token(&account(UserRole::Passenger), "a", 1).unwrap();

        let err = verify_token(&token, "b").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let claims = Claims::for_user(&account(UserRole::Passenger), Duration::hours(-1));
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(matches!(
            verify_token(&token, "secret"),
            Err(AppError::Unauthorized(_))
        ));
    }
}
