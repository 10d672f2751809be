pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{self, roles::Role};
use crate::database::models::User;

pub use password::{PasswordError, PasswordService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, role: Role) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email,
            role,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

/// Identity of the caller, as established by the JWT middleware
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Elevated users bypass ownership checks
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    /// True if the caller is `owner` or holds elevated privilege
    pub fn can_access(&self, owner: Uuid) -> bool {
        self.user_id == owner || self.is_elevated()
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_preserves_identity() {
        let id = Uuid::new_v4();
        let token = generate_jwt(&Claims::new(id, "a@b.co".into(), Role::SalesManager)).unwrap();
        let claims = validate_jwt(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::SalesManager);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = generate_jwt(&Claims::new(Uuid::new_v4(), "a@b.co".into(), Role::User)).unwrap();
        let tampered = format!("{}x", token);
        assert!(matches!(validate_jwt(&tampered), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn admins_can_access_anything() {
        let admin = AuthUser { user_id: Uuid::new_v4(), email: "root@x.io".into(), role: Role::Admin };
        assert!(admin.can_access(Uuid::new_v4()));
        let user = AuthUser { user_id: Uuid::new_v4(), email: "u@x.io".into(), role: Role::User };
        assert!(!user.can_access(Uuid::new_v4()));
        assert!(user.can_access(user.user_id));
    }
}
