//! Authentication and user account service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        member::normalize_email,
        user::{LoginRequest, NewUser, RegisterRequest, User, UserClaims},
        Role,
    },
    repository::Repository,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new account; self-registered accounts never get the admin role
    pub async fn register(&self, request: RegisterRequest) -> AppResult<(String, User)> {
        let request = RegisterRequest {
            email: normalize_email(&request.email),
            ..request
        };
        request.validate()?;

        if self.repository.users.get_by_email(&request.email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let user = self
            .repository
            .users
            .create(NewUser {
                name: request.name.trim().to_string(),
                email: request.email,
                password_hash: self.hash_password(&request.password)?,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");

        let token = self.create_token(&user)?;
        Ok((token, user))
    }

    /// Authenticate by email and password and return a JWT token
    pub async fn login(&self, request: LoginRequest) -> AppResult<(String, User)> {
        request.validate()?;

        let user = self
            .repository
            .users
            .get_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

        if !self.verify_password(&user, &request.password)? {
            tracing::debug!(user_id = %user.id, "Rejected login with wrong password");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.create_token(&user)?;
        Ok((token, user))
    }

    pub async fn get_user(&self, id: uuid::Uuid) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Create the admin account, or reset its password and role if it exists
    pub async fn ensure_admin(&self, email: &str, name: &str, password: &str) -> AppResult<User> {
        let email = normalize_email(email);
        let password_hash = self.hash_password(password)?;

        match self.repository.users.get_by_email(&email).await? {
            Some(user) => {
                let user = self
                    .repository
                    .users
                    .update_credentials(user.id, &user.name, &password_hash, Role::Admin)
                    .await?;
                tracing::info!(user_id = %user.id, "Admin account refreshed");
                Ok(user)
            }
            None => {
                let user = self
                    .repository
                    .users
                    .create(NewUser {
                        name: name.to_string(),
                        email,
                        password_hash,
                        role: Role::Admin,
                    })
                    .await?;
                tracing::info!(user_id = %user.id, "Admin account created");
                Ok(user)
            }
        }
    }

    fn create_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
