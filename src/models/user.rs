//! User model, JWT claims and the request principal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::Role;
use crate::error::AppError;

/// Application user (staff account)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Name shown for audit fields whose account no longer exists
pub const UNKNOWN_USER_NAME: &str = "Unknown User";

/// Public identity of the account behind an audit field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl UserSummary {
    /// Placeholder for an account that was removed
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            name: UNKNOWN_USER_NAME.to_string(),
            email: String::new(),
        }
    }
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Register request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"), length(max = 255, message = "Email is too long"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Validated user ready to be stored
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            role: self.role,
        }
    }
}

/// The authenticated actor performing a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Access denied. Insufficient permissions.".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role, exp_offset: i64) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "admin@library.com".to_string(),
            user_id: Uuid::new_v4(),
            role,
            exp: now + exp_offset,
            iat: now,
        }
    }

    #[test]
    fn test_token_round_trip_keeps_principal() {
        let original = claims(Role::Admin, 3600);
        let token = original.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.principal(), original.principal());
    }

    #[test]
    fn test_token_rejected_with_wrong_secret_or_expired() {
        let token = claims(Role::User, 3600).create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());

        let expired = claims(Role::User, -3600).create_token("secret").unwrap();
        assert!(UserClaims::from_token(&expired, "secret").is_err());
    }

    #[test]
    fn test_require_admin() {
        assert!(claims(Role::Admin, 60).principal().require_admin().is_ok());
        let err = claims(Role::User, 60).principal().require_admin().unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Admin".to_string(),
            email: "admin@library.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");

        let summary = serde_json::to_value(UserSummary::from(&user)).unwrap();
        assert_eq!(summary, serde_json::json!({ "id": user.id, "name": "Admin", "email": "admin@library.com" }));
    }

    #[test]
    fn test_unknown_user_summary() {
        let id = Uuid::new_v4();
        let summary = UserSummary::unknown(id);
        assert_eq!(summary.id, id);
        assert_eq!(summary.name, UNKNOWN_USER_NAME);
        assert!(summary.email.is_empty());
    }
}
