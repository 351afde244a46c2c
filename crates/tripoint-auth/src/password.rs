//! Admin password verification using Argon2
//!
//! The admin password is configured as an Argon2id PHC hash; verification is
//! constant-time by construction.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use tracing::{debug, error};
use tripoint_core::error::AppError;

/// Password hashing and verification service
#[derive(Debug, Clone, Default)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    /// Create a new password service with default Argon2 parameters
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Hash a password into PHC string format
    ///
    /// Used by deployment tooling to produce the configured admin hash.
    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Password hashing failed: {}", e);
                AppError::PasswordHash(e.to_string())
            })
    }

    /// Verify a password against a PHC hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!("Invalid password hash format: {}", e);
            AppError::PasswordHash(format!("Invalid hash format: {}", e))
        })?;

        match self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
        {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => {
                debug!("Password verification failed");
                Ok(false)
            }
            Err(e) => {
                error!("Password verification error: {}", e);
                Err(AppError::PasswordHash(e.to_string()))
            }
        }
    }
}
