//! User Model

use serde::{Deserialize, Serialize};

/// Account status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Suspended => "SUSPENDED",
        }
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    /// 'buyer' | 'seller' | 'admin'
    pub role: String,
    /// 'ACTIVE' | 'SUSPENDED'
    pub status: String,
    pub mfa_secret: Option<String>,
    pub mfa_enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Verify password using argon2
    pub fn verify_password(&self, password: &str) -> Result<bool, argon2::password_hash::Error> {
        Self::verify_hash(&self.password_hash, password)
    }

    /// Verify an arbitrary argon2 hash (recovery codes share the scheme)
    pub fn verify_hash(hash: &str, candidate: &str) -> Result<bool, argon2::password_hash::Error> {
        use argon2::{
            Argon2,
            password_hash::{PasswordHash, PasswordVerifier},
        };

        let parsed_hash = PasswordHash::new(hash)?;
        Ok(Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash password using argon2
    pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
        use argon2::{
            Argon2,
            password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    pub fn is_suspended(&self) -> bool {
        self.status == UserStatus::Suspended.as_str()
    }
}

/// Public view of a user (never exposes hashes or MFA secrets)
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub id: String,
    pub username: String,
    pub role: String,
    pub status: String,
    pub mfa_enabled: bool,
    pub created_at: i64,
}

impl From<User> for UserPublic {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            role: u.role,
            status: u.status,
            mfa_enabled: u.mfa_enabled,
            created_at: u.created_at,
        }
    }
}

/// Create user payload (repository level; password already hashed)
#[derive(Debug, Clone)]
pub struct UserCreate {
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

/// Unused MFA recovery code row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecoveryCode {
    pub id: i64,
    pub user_id: String,
    pub code_hash: String,
    pub used: bool,
}
